// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Tree entries of the in-memory filesystem and their permission model.
// Author: Lukas Bower

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use log::trace;
use ninevault_wire::{Qid, Stat, DMAPPEND, DMDIR, DMEXCL, DMTMP, DMWRITE, ORCLOSE, QTDIR};

use crate::ctl::CtlFile;
use crate::file::BlockFile;
use crate::fsys::FsCtx;
use crate::group::Group;
use crate::{FsError, BLOCK_SIZE};

pub(crate) type NodeRef = Arc<Node>;

/// Data behind a leaf node: block storage or one of the synthetic files.
#[derive(Debug)]
pub(crate) enum Backing {
    Blocks(BlockFile),
    Group(Arc<Group>),
    Ctl(CtlFile),
}

impl Backing {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        match self {
            Backing::Blocks(file) => file.read_at(buf, offset),
            Backing::Group(group) => group.read_at(buf, offset),
            Backing::Ctl(ctl) => ctl.read_at(buf, offset),
        }
    }

    fn write_at(&mut self, p: &[u8], offset: u64) -> Result<usize, FsError> {
        match self {
            Backing::Blocks(file) => file.write_at(p, offset),
            Backing::Group(group) => group.write_at(p),
            Backing::Ctl(ctl) => ctl.write_at(p),
        }
    }

    fn len(&self) -> u64 {
        match self {
            Backing::Blocks(file) => file.len(),
            Backing::Group(group) => group.len(),
            Backing::Ctl(ctl) => ctl.len(),
        }
    }

    fn close(&mut self) {
        if let Backing::Blocks(file) = self {
            file.close();
        }
    }
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Directory { children: HashMap<String, NodeRef> },
    File { backing: Backing },
}

impl NodeKind {
    pub fn directory() -> Self {
        NodeKind::Directory {
            children: HashMap::new(),
        }
    }

    pub fn file(backing: Backing) -> Self {
        NodeKind::File { backing }
    }
}

/// A directory or regular file in the served tree.
///
/// Every node carries its own readers-writer lock; cross-node operations
/// (remove, rename) take the parent's lock before the child's.
#[derive(Debug)]
pub(crate) struct Node {
    ctx: Arc<FsCtx>,
    inner: RwLock<NodeInner>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

#[derive(Debug)]
struct NodeInner {
    dir: Stat,
    parent: Weak<Node>,
    kind: NodeKind,
    in_use: bool,
    remove_on_close: bool,
}

impl Node {
    pub fn new(
        ctx: Arc<FsCtx>,
        name: &str,
        uid: &str,
        gid: &str,
        mode: u32,
        path: u64,
        kind: NodeKind,
    ) -> NodeRef {
        let now = now_secs();
        Arc::new(Node {
            ctx,
            inner: RwLock::new(NodeInner {
                dir: Stat {
                    typ: 0,
                    dev: 0,
                    qid: Qid {
                        ty: (mode >> 24) as u8,
                        vers: 0,
                        path,
                    },
                    mode,
                    atime: now,
                    mtime: now,
                    length: 0,
                    name: name.to_owned(),
                    uid: uid.to_owned(),
                    gid: gid.to_owned(),
                    muid: uid.to_owned(),
                },
                parent: Weak::new(),
                kind,
                in_use: false,
                remove_on_close: false,
            }),
        })
    }

    /// Snapshot of the directory metadata record.
    pub fn stat(&self) -> Stat {
        self.read().dir.clone()
    }

    pub fn qid(&self) -> Qid {
        self.read().dir.qid
    }

    pub fn is_dir(&self) -> bool {
        self.read().dir.mode & DMDIR != 0
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.read().parent.upgrade()
    }

    pub fn set_parent(&self, parent: &NodeRef) {
        self.write().parent = Arc::downgrade(parent);
    }

    pub fn remove_on_close(&self) -> bool {
        self.read().remove_on_close
    }

    /// Create `name` under this directory, or open the existing entry.
    ///
    /// Directory permissions keep the low 0777 of the parent; files keep the
    /// low 0666. The new node inherits the parent's group.
    pub fn create(
        self: &Arc<Self>,
        uid: &str,
        name: &str,
        mode: u8,
        perm: u32,
    ) -> Result<NodeRef, FsError> {
        if name == "." || name == ".." {
            return Err(FsError::IllegalName);
        }

        let mut guard = self.write();
        if guard.dir.mode & DMDIR == 0 {
            return Err(FsError::NotDirectory);
        }
        if guard.dir.mode & DMEXCL != 0 && guard.in_use {
            return Err(FsError::Exclusive);
        }
        let perm = if perm & DMDIR != 0 {
            (perm & !0o777) | (guard.dir.mode & 0o777)
        } else {
            (perm & !0o666) | (guard.dir.mode & 0o666)
        };

        let existing = match &guard.kind {
            NodeKind::Directory { children } => children.get(name).cloned(),
            NodeKind::File { .. } => return Err(FsError::NotDirectory),
        };
        if let Some(existing) = existing {
            drop(guard);
            existing.open(mode)?;
            return Ok(existing);
        }

        let path = self.ctx.alloc_path()?;
        let gid = guard.dir.gid.clone();
        let kind = if perm & DMDIR != 0 {
            NodeKind::directory()
        } else {
            NodeKind::file(Backing::Blocks(BlockFile::new(BLOCK_SIZE)))
        };
        let child = Node::new(self.ctx.clone(), name, uid, &gid, perm, path, kind);
        child.set_parent(self);
        if let NodeKind::Directory { children } = &mut guard.kind {
            children.insert(name.to_owned(), child.clone());
        }
        trace!(target: "nine-vault", "create {name} mode {perm:#o} path {path}");
        Ok(child)
    }

    /// Latch exclusive use and record remove-on-close.
    pub fn open(&self, mode: u8) -> Result<(), FsError> {
        let mut guard = self.write();
        if guard.dir.mode & DMEXCL != 0 {
            if guard.in_use {
                return Err(FsError::Exclusive);
            }
            guard.in_use = true;
        }
        if mode & ORCLOSE != 0 {
            guard.remove_on_close = true;
        }
        Ok(())
    }

    /// Release the exclusive latch, close the backing and honour
    /// remove-on-close.
    pub fn close(self: &Arc<Self>) -> Result<(), FsError> {
        let orclose = {
            let mut guard = self.write();
            if guard.dir.mode & DMEXCL != 0 && guard.in_use {
                guard.in_use = false;
            }
            if let NodeKind::File { backing } = &mut guard.kind {
                backing.close();
            }
            guard.remove_on_close
        };
        if orclose {
            self.remove()
        } else {
            Ok(())
        }
    }

    /// Detach this node from its parent and recycle its path id.
    pub fn remove(self: &Arc<Self>) -> Result<(), FsError> {
        let Some(parent) = self.parent() else {
            return Err(FsError::NotExist);
        };
        // The root is its own parent and is not an entry in any directory.
        if Arc::ptr_eq(&parent, self) {
            return Err(FsError::NotExist);
        }

        let mut parent_guard = parent.write();
        let (name, path) = {
            let guard = self.read();
            if let NodeKind::Directory { children } = &guard.kind {
                if !children.is_empty() {
                    return Err(FsError::DirectoryNotEmpty);
                }
            }
            (guard.dir.name.clone(), guard.dir.qid.path)
        };
        let NodeKind::Directory { children } = &mut parent_guard.kind else {
            return Err(FsError::NotExist);
        };
        if children.remove(&name).is_none() {
            return Err(FsError::NotExist);
        }
        drop(parent_guard);
        self.ctx.free_path(path);
        trace!(target: "nine-vault", "remove {name} path {path}");
        Ok(())
    }

    pub fn write_at(&self, p: &[u8], offset: u64) -> Result<usize, FsError> {
        let mut guard = self.write();
        if guard.dir.mode & DMDIR != 0 {
            return Err(FsError::IsDirectory);
        }
        let append = guard.dir.mode & DMAPPEND != 0;
        let temporary = guard.dir.mode & DMTMP != 0;
        let (n, length) = {
            let NodeKind::File { backing } = &mut guard.kind else {
                return Err(FsError::IsDirectory);
            };
            let offset = if append { backing.len() } else { offset };
            let n = backing.write_at(p, offset)?;
            (n, backing.len())
        };
        let now = now_secs();
        guard.dir.atime = now;
        guard.dir.mtime = now;
        guard.dir.length = length;
        if !temporary {
            guard.dir.qid.vers = guard.dir.qid.vers.wrapping_add(1);
        }
        Ok(n)
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        let mut guard = self.write();
        if guard.dir.mode & DMDIR != 0 {
            return Err(FsError::IsDirectory);
        }
        let n = {
            let NodeKind::File { backing } = &guard.kind else {
                return Err(FsError::IsDirectory);
            };
            backing.read_at(buf, offset)?
        };
        guard.dir.atime = now_secs();
        Ok(n)
    }

    /// Concatenated stat records of every child, in unspecified order.
    pub fn readdir(&self) -> Result<Vec<u8>, FsError> {
        let guard = self.read();
        let NodeKind::Directory { children } = &guard.kind else {
            return Err(FsError::NotDirectory);
        };
        let mut data = Vec::new();
        for child in children.values() {
            data.extend_from_slice(&child.stat().to_bytes());
        }
        Ok(data)
    }

    /// Apply a batched metadata change, all-or-nothing.
    ///
    /// A mode of `!0` and empty string fields mean "leave unchanged".
    pub fn wstat(self: &Arc<Self>, uname: &str, request: &Stat) -> Result<(), FsError> {
        let Some(parent) = self.parent() else {
            return Err(FsError::NotExist);
        };
        let is_root = Arc::ptr_eq(&parent, self);

        // Lock order: parent before child. The root is its own parent and
        // takes a single guard.
        let mut parent_guard = if is_root { None } else { Some(parent.write()) };
        let mut guard = self.write();

        let mode_change = request.mode != !0 && request.mode != guard.dir.mode;
        let rename = !request.name.is_empty() && request.name != guard.dir.name;
        let gid_change = !request.gid.is_empty() && request.gid != guard.dir.gid;

        // Mode changes take the owner or the group leader; a group without a
        // leader record is led by the user of the same name.
        if mode_change && uname != guard.dir.uid && uname != guard.dir.gid {
            return Err(FsError::NotOwner);
        }
        if rename {
            let Some(parent_inner) = parent_guard.as_deref() else {
                return Err(FsError::Permission);
            };
            if !has_perm_inner(parent_inner, &self.ctx.group, uname, DMWRITE) {
                return Err(FsError::Permission);
            }
            if let NodeKind::Directory { children } = &parent_inner.kind {
                if children.contains_key(&request.name) {
                    return Err(FsError::FileExists);
                }
            }
        }
        if gid_change {
            if uname != guard.dir.uid {
                return Err(FsError::NotOwner);
            }
            match self.ctx.group.get(&request.gid) {
                Ok(group) if group.members.contains(uname) => {}
                _ => return Err(FsError::NotOwner),
            }
        }

        // All preconditions hold; commit the batch.
        if mode_change {
            let masked = if request.mode & DMDIR != 0 {
                (request.mode & !0o777) | (guard.dir.mode & 0o777)
            } else {
                (request.mode & !0o666) | (guard.dir.mode & 0o666)
            };
            guard.dir.mode = (masked & !DMDIR) | (guard.dir.mode & DMDIR);
        }
        if rename {
            if let Some(parent_inner) = parent_guard.as_deref_mut() {
                if let NodeKind::Directory { children } = &mut parent_inner.kind {
                    if let Some(node) = children.remove(&guard.dir.name) {
                        children.insert(request.name.clone(), node);
                    }
                }
            }
            guard.dir.name = request.name.clone();
        }
        if gid_change {
            guard.dir.gid = request.gid.clone();
        }
        Ok(())
    }

    /// Whether `uname` holds all the low permission bits in `wanted`.
    pub fn has_perm(&self, uname: &str, wanted: u32) -> bool {
        has_perm_inner(&self.read(), &self.ctx.group, uname, wanted)
    }

    fn read(&self) -> RwLockReadGuard<'_, NodeInner> {
        self.inner.read().expect("poisoned node lock")
    }

    fn write(&self) -> RwLockWriteGuard<'_, NodeInner> {
        self.inner.write().expect("poisoned node lock")
    }
}

/// Insert `child` into `parent` under the child's current name.
pub(crate) fn adopt(parent: &NodeRef, child: NodeRef) {
    child.set_parent(parent);
    let name = child.read().dir.name.clone();
    match &mut parent.write().kind {
        NodeKind::Directory { children } => {
            children.insert(name, child);
        }
        NodeKind::File { .. } => panic!("cannot adopt a child into a file node"),
    }
}

/// Accumulate the effective permission bits for `uname` on a node.
///
/// Evaluation starts from the other-bits. The anonymous user `none` gets
/// nothing else; unknown users are denied outright; the owner and members of
/// the node's group each OR in their bit triple.
fn has_perm_inner(inner: &NodeInner, group: &Group, uname: &str, wanted: u32) -> bool {
    let wanted = wanted & 7;
    let mut held = inner.dir.mode & 7;
    if uname == "none" {
        return held & wanted == wanted;
    }
    if group.get(uname).is_err() {
        return false;
    }
    if inner.dir.uid == uname {
        held |= (inner.dir.mode >> 6) & 7;
    }
    let file_group = group
        .get(&inner.dir.gid)
        .expect("node group missing from group database");
    if file_group.members.contains(uname) {
        held |= (inner.dir.mode >> 3) & 7;
    }
    held & wanted == wanted
}

/// Advance from `root` along `path`, invoking `visit` after every step with
/// the node reached and the names still to walk.
///
/// `..` steps to the parent. Stepping into a directory whose other-execute
/// bit is set is denied, matching the long-standing served behaviour.
pub(crate) fn walk<F>(root: &NodeRef, path: &[String], visit: &mut F) -> Result<(), FsError>
where
    F: FnMut(&NodeRef, &[String]) -> Result<(), FsError>,
{
    let mut node = root.clone();
    let mut rest = path;
    while let Some((name, tail)) = rest.split_first() {
        let next = if name.as_str() == ".." {
            node.parent().unwrap_or_else(|| node.clone())
        } else {
            let guard = node.read();
            match &guard.kind {
                NodeKind::Directory { children } => match children.get(name.as_str()) {
                    Some(child) => child.clone(),
                    None => return Err(FsError::NotExist),
                },
                NodeKind::File { .. } => return Err(FsError::NotExist),
            }
        };
        let stat = next.stat();
        if stat.qid.ty & QTDIR != 0 && stat.mode & ninevault_wire::DMEXEC != 0 {
            return Err(FsError::Permission);
        }
        visit(&next, tail)?;
        node = next;
        rest = tail;
    }
    Ok(())
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ninevault_wire::{ORDWR, OWRITE};

    fn ctx() -> Arc<FsCtx> {
        Arc::new(FsCtx::new(Arc::new(Group::new("adm")), "adm"))
    }

    fn root(ctx: &Arc<FsCtx>) -> NodeRef {
        let root = Node::new(
            ctx.clone(),
            "/",
            "adm",
            "adm",
            0o770 | DMDIR,
            0,
            NodeKind::directory(),
        );
        root.set_parent(&root);
        root
    }

    fn write_read(file: &NodeRef) {
        assert_eq!(file.write_at(b"hello world", 0), Ok(11));
        assert_eq!(file.write_at(b"planet go", 6), Ok(9));
        let mut buf = [0u8; 15];
        let n = file.read_at(&mut buf, 0).expect("read");
        assert_eq!(&buf[..n], b"hello planet go");
    }

    #[test]
    fn create_open_close() {
        let ctx = ctx();
        let root = root(&ctx);
        let dir = root
            .create("adm", "dir", ORDWR, 0o770 | DMDIR)
            .expect("create dir");
        dir.open(ORDWR).expect("open dir");

        let file = dir.create("adm", "file", ORDWR, 0o664).expect("create file");
        file.open(ORDWR).expect("open file");
        write_read(&file);

        file.close().expect("close file");
        dir.close().expect("close dir");
    }

    #[test]
    fn create_rejects_dot_names() {
        let ctx = ctx();
        let root = root(&ctx);
        assert_eq!(
            root.create("adm", ".", ORDWR, 0o664),
            Err(FsError::IllegalName)
        );
        assert_eq!(
            root.create("adm", "..", ORDWR, 0o664),
            Err(FsError::IllegalName)
        );
    }

    #[test]
    fn create_existing_opens_instead() {
        let ctx = ctx();
        let root = root(&ctx);
        let first = root.create("adm", "file", ORDWR, 0o664).expect("create");
        let second = root.create("adm", "file", ORDWR, 0o664).expect("reopen");
        assert_eq!(first.qid().path, second.qid().path);
    }

    #[test]
    fn create_masks_permissions_against_parent() {
        let ctx = ctx();
        let root = root(&ctx);
        let dir = root
            .create("adm", "dir", OWRITE, 0o777 | DMDIR)
            .expect("create dir");
        assert_eq!(dir.stat().mode, DMDIR | 0o770);
        let file = root.create("adm", "file", OWRITE, 0o666).expect("create");
        assert_eq!(file.stat().mode, 0o660);
    }

    #[test]
    fn remove_node() {
        let ctx = ctx();
        let root = root(&ctx);
        let dir = root
            .create("adm", "dir", ORDWR, 0o770 | DMDIR)
            .expect("create dir");
        let file = dir.create("adm", "file", ORDWR, 0o664).expect("create file");

        assert_eq!(dir.remove(), Err(FsError::DirectoryNotEmpty));
        file.remove().expect("remove file");
        assert_eq!(file.remove(), Err(FsError::NotExist));
        dir.remove().expect("remove dir");
        assert_eq!(root.remove(), Err(FsError::NotExist));
    }

    #[test]
    fn exclusive_use_latches() {
        let ctx = ctx();
        let file = Node::new(
            ctx.clone(),
            "file",
            "adm",
            "adm",
            0o664 | DMEXCL,
            7,
            NodeKind::file(Backing::Blocks(BlockFile::new(BLOCK_SIZE))),
        );
        file.open(OWRITE).expect("first open");
        assert_eq!(file.open(OWRITE), Err(FsError::Exclusive));
        assert_eq!(file.open(OWRITE), Err(FsError::Exclusive));
        write_read(&file);
        // remove would fail: the node has no parent, so skip orclose paths.
        {
            let mut guard = file.inner.write().expect("lock");
            assert!(guard.in_use);
            guard.in_use = false;
        }
        file.open(OWRITE).expect("reopen after release");
    }

    #[test]
    fn version_bumps_on_write_only() {
        let ctx = ctx();
        let root = root(&ctx);
        let file = root.create("adm", "file", ORDWR, 0o664).expect("create");
        let before = file.qid().vers;
        file.write_at(b"x", 0).expect("write");
        assert_eq!(file.qid().vers, before + 1);
        let mut buf = [0u8; 1];
        file.read_at(&mut buf, 0).expect("read");
        assert_eq!(file.qid().vers, before + 1);
        assert_eq!(file.stat().length, 1);
    }

    #[test]
    fn append_only_ignores_offset() {
        let ctx = ctx();
        let root = root(&ctx);
        let file = root
            .create("adm", "log", ORDWR, 0o664 | DMAPPEND)
            .expect("create");
        file.write_at(b"aaa", 0).expect("write");
        file.write_at(b"bbb", 0).expect("write");
        let mut buf = [0u8; 6];
        let n = file.read_at(&mut buf, 0).expect("read");
        assert_eq!(&buf[..n], b"aaabbb");
    }

    #[test]
    fn directories_reject_byte_io() {
        let ctx = ctx();
        let root = root(&ctx);
        let mut buf = [0u8; 4];
        assert_eq!(root.write_at(b"x", 0), Err(FsError::IsDirectory));
        assert_eq!(root.read_at(&mut buf, 0), Err(FsError::IsDirectory));
    }

    #[test]
    fn readdir_lists_children() {
        let ctx = ctx();
        let root = root(&ctx);
        root.create("adm", "a", ORDWR, 0o664).expect("create a");
        root.create("adm", "b", ORDWR, 0o664).expect("create b");
        let data = root.readdir().expect("readdir");
        let entries = Stat::parse_list(&data).expect("parse listing");
        let mut names: Vec<String> = entries.into_iter().map(|s| s.name).collect();
        names.sort();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn wstat_renames_and_masks_mode() {
        let ctx = ctx();
        let root = root(&ctx);
        let file = root.create("adm", "file1", ORDWR, 0o664).expect("create");
        assert_eq!(file.stat().mode, 0o660);

        let mut request = Stat::unchanged();
        request.name = "nfile".to_owned();
        request.mode = 0o640;
        file.wstat("adm", &request).expect("wstat");

        let stat = file.stat();
        assert_eq!(stat.name, "nfile");
        // Low 0666 bits are kept from the current mode.
        assert_eq!(stat.mode, 0o660);

        let listing = Stat::parse_list(&root.readdir().expect("readdir")).expect("parse");
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "nfile");
    }

    #[test]
    fn wstat_rejects_existing_name_and_foreign_owner() {
        let ctx = ctx();
        let root = root(&ctx);
        root.create("adm", "other", ORDWR, 0o664).expect("create");
        let file = root.create("adm", "file1", ORDWR, 0o664).expect("create");

        let mut rename = Stat::unchanged();
        rename.name = "other".to_owned();
        assert_eq!(file.wstat("adm", &rename), Err(FsError::FileExists));

        let mut chmod = Stat::unchanged();
        chmod.mode = 0o600;
        assert_eq!(file.wstat("glenda", &chmod), Err(FsError::NotOwner));
        // A failed batch leaves everything untouched.
        assert_eq!(file.stat().name, "file1");
    }

    #[test]
    fn permissions_accumulate() {
        let ctx = Arc::new(FsCtx::new(Arc::new(Group::new("bootes")), "bootes"));
        ctx.group.add_user("glenda").expect("add glenda");
        ctx.group.add_member("glenda", "adm").expect("join adm");

        let file = Node::new(
            ctx.clone(),
            "file",
            "adm",
            "adm",
            0o640,
            9,
            NodeKind::file(Backing::Blocks(BlockFile::new(BLOCK_SIZE))),
        );
        assert!(file.has_perm("adm", DMWRITE));
        assert!(file.has_perm("glenda", ninevault_wire::DMREAD));
        assert!(!file.has_perm("glenda", DMWRITE));
        assert!(!file.has_perm("none", ninevault_wire::DMREAD));
        assert!(!file.has_perm("unknown", ninevault_wire::DMREAD));
    }

    #[test]
    fn walk_follows_names_and_dotdot() {
        let ctx = ctx();
        let root = root(&ctx);
        let a = root
            .create("adm", "a", ORDWR, 0o770 | DMDIR)
            .expect("create a");
        let b = a.create("adm", "b", ORDWR, 0o770 | DMDIR).expect("create b");
        b.create("adm", "fa", ORDWR, 0o664).expect("create fa");

        let to_names = |names: &[&str]| -> Vec<String> {
            names.iter().map(|s| (*s).to_owned()).collect()
        };
        let mut last = None;
        walk(&root, &to_names(&["a", "b", "fa"]), &mut |node, rest| {
            if rest.is_empty() {
                last = Some(node.clone());
            }
            Ok(())
        })
        .expect("walk");
        assert_eq!(last.map(|n| n.stat().name), Some("fa".to_owned()));

        assert_eq!(
            walk(&root, &to_names(&["a", "x"]), &mut |_, _| Ok(())),
            Err(FsError::NotExist)
        );
        walk(&root, &to_names(&["a", "..", "a", "b", "..", "b"]), &mut |_, _| Ok(()))
            .expect("dotdot walk");
    }

    #[test]
    fn walk_denies_other_exec_directories() {
        let ctx = ctx();
        let root = root(&ctx);
        let open_dir = Node::new(
            ctx.clone(),
            "pub",
            "adm",
            "adm",
            0o755 | DMDIR,
            11,
            NodeKind::directory(),
        );
        adopt(&root, open_dir);
        assert_eq!(
            walk(&root, &["pub".to_owned()], &mut |_, _| Ok(())),
            Err(FsError::Permission)
        );
    }
}
