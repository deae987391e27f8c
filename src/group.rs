// Author: Lukas Bower
// Purpose: User and group database behind the synthetic /adm/group file.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use log::info;

use crate::command;
use crate::FsError;

/// One user record; every user also names the group it leads.
#[derive(Debug, Clone)]
pub(crate) struct User {
    pub name: String,
    pub leader: String,
    pub members: HashSet<String>,
}

impl User {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            leader: name.to_owned(),
            members: HashSet::new(),
        }
    }

    fn dump_line(&self) -> String {
        let members = self
            .members
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        format!("{0}:{0}:{1}:{2}", self.name, self.leader, members)
    }
}

/// Mutable user/group registry, also readable as the `/adm/group` file.
///
/// Reads serialise the registry under the shared lock, one user per line as
/// `name:name:leader:member1,member2`. Writes accept the `uname` command
/// forms documented on [`Group::write_at`].
#[derive(Debug)]
pub(crate) struct Group {
    users: RwLock<HashMap<String, User>>,
}

impl Group {
    /// Seed the registry with `adm`, `none` and the host owner.
    pub fn new(owner: &str) -> Self {
        let mut users = HashMap::new();
        let mut adm = User::new("adm");
        adm.members.insert(owner.to_owned());
        users.insert("adm".to_owned(), adm);
        users.insert("none".to_owned(), User::new("none"));
        // Last insert wins, so an adm host owner ends with empty members.
        users.insert(owner.to_owned(), User::new(owner));
        Self {
            users: RwLock::new(users),
        }
    }

    pub fn get(&self, uid: &str) -> Result<User, FsError> {
        self.read()
            .get(uid)
            .cloned()
            .ok_or_else(|| FsError::UserNotFound(uid.to_owned()))
    }

    pub fn add_user(&self, uid: &str) -> Result<(), FsError> {
        let mut users = self.write();
        if users.contains_key(uid) {
            return Err(FsError::UserExists(uid.to_owned()));
        }
        users.insert(uid.to_owned(), User::new(uid));
        info!(target: "nine-vault", "group: added user {uid}");
        Ok(())
    }

    /// Add `uid` to group `gid`; joining one's own group is a no-op.
    pub fn add_member(&self, uid: &str, gid: &str) -> Result<(), FsError> {
        let mut users = self.write();
        if !users.contains_key(uid) {
            return Err(FsError::UserNotFound(uid.to_owned()));
        }
        if !users.contains_key(gid) {
            return Err(FsError::GroupNotFound(gid.to_owned()));
        }
        if gid != uid {
            if let Some(group) = users.get_mut(gid) {
                group.members.insert(uid.to_owned());
            }
            info!(target: "nine-vault", "group: added {uid} to {gid}");
        }
        Ok(())
    }

    /// Serialise every user, one line each with a trailing newline.
    pub fn dump(&self) -> Vec<u8> {
        let users = self.read();
        let mut data = String::new();
        for user in users.values() {
            data.push_str(&user.dump_line());
            data.push('\n');
        }
        data.into_bytes()
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        let data = self.dump();
        if offset > data.len() as u64 {
            return Err(FsError::EndOfFile);
        }
        let rest = &data[offset as usize..];
        let n = buf.len().min(rest.len());
        buf[..n].copy_from_slice(&rest[..n]);
        Ok(n)
    }

    /// Apply one `uname` command:
    ///
    /// - `uname X +G` adds existing user X to existing group G;
    /// - `uname X X` creates user X;
    /// - `uname X :G` creates user X (the `:G` suffix is accepted and
    ///   otherwise ignored).
    pub fn write_at(&self, p: &[u8]) -> Result<usize, FsError> {
        let cmd = command::parse(p)?;
        if cmd.name != "uname" {
            return Err(FsError::UnknownCommand(cmd.name));
        }
        if cmd.args.len() != 2 {
            return Err(FsError::RequiresTwoArgs("uname"));
        }
        let (target, spec) = (&cmd.args[0], &cmd.args[1]);
        if spec.len() > 1 && spec.starts_with('+') {
            self.add_member(target, &spec[1..])?;
        } else if target == spec {
            self.add_user(target)?;
        } else if spec.len() > 1 && spec.starts_with(':') {
            self.add_user(target)?;
        } else {
            return Err(FsError::InvalidCommand);
        }
        Ok(p.len())
    }

    pub fn len(&self) -> u64 {
        0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, User>> {
        self.users.read().expect("poisoned group lock")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, User>> {
        self.users.write().expect("poisoned group lock")
    }
}
