// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Filesystem root: bootstrap tree, id allocators and the listen loop.
// Author: Lukas Bower

use std::collections::HashSet;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex, Weak};
use std::thread;

use log::{debug, info, warn};
use ninevault_wire::DMDIR;

use crate::conn;
use crate::ctl::CtlFile;
use crate::fid::Fid;
use crate::group::Group;
use crate::node::{self, Backing, Node, NodeKind, NodeRef};
use crate::server::Server;
use crate::FsError;

/// Path ids 0 through 4 are reserved for the bootstrap nodes.
const RESERVED_PATHS: u64 = 5;

const MAX_PATH: u64 = !0;

/// Shared context threaded through every node: the path allocator, the
/// group database and the host owner.
#[derive(Debug)]
pub(crate) struct FsCtx {
    paths: Mutex<PathPool>,
    pub(crate) group: Arc<Group>,
    pub(crate) hostowner: String,
}

impl FsCtx {
    pub fn new(group: Arc<Group>, hostowner: &str) -> Self {
        Self {
            paths: Mutex::new(PathPool::new(RESERVED_PATHS)),
            group,
            hostowner: hostowner.to_owned(),
        }
    }

    pub fn alloc_path(&self) -> Result<u64, FsError> {
        self.paths.lock().expect("poisoned path pool lock").alloc()
    }

    pub fn free_path(&self, path: u64) {
        self.paths.lock().expect("poisoned path pool lock").free(path);
    }
}

/// Monotonic 64-bit allocator that hands out recycled ids first.
#[derive(Debug)]
struct PathPool {
    next: u64,
    free: HashSet<u64>,
}

impl PathPool {
    fn new(start: u64) -> Self {
        Self {
            next: start,
            free: HashSet::new(),
        }
    }

    fn alloc(&mut self) -> Result<u64, FsError> {
        if let Some(&path) = self.free.iter().next() {
            self.free.remove(&path);
            return Ok(path);
        }
        if self.next == MAX_PATH {
            return Err(FsError::OutOfPaths);
        }
        let path = self.next;
        self.next += 1;
        Ok(path)
    }

    fn free(&mut self, path: u64) {
        self.free.insert(path);
    }
}

/// Everything a running server shares: the tree, the allocators, the group
/// database.
#[derive(Debug)]
pub(crate) struct FsCore {
    ctx: Arc<FsCtx>,
    root: NodeRef,
}

impl FsCore {
    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    /// Identify the user and hand out the tree node named by `aname`.
    ///
    /// Unknown users are served as the anonymous user `none`.
    pub fn attach(&self, uname: &str, aname: &str) -> Result<(NodeRef, String), FsError> {
        let user = match self.ctx.group.get(uname) {
            Ok(user) => user,
            Err(_) => self.ctx.group.get("none")?,
        };
        let node = self.walk_path(aname)?;
        Ok((node, user.name))
    }

    /// Walk a `/`-separated path from the root to its terminal node.
    pub fn walk_path(&self, name: &str) -> Result<NodeRef, FsError> {
        let path = split(name);
        if path.is_empty() {
            return Ok(self.root());
        }
        let mut found = None;
        node::walk(&self.root, &path, &mut |node, rest| {
            if rest.is_empty() {
                found = Some(node.clone());
            }
            Ok(())
        })?;
        found.ok_or(FsError::NotExist)
    }
}

/// A 9P2000 file server keeping all files in memory.
///
/// The handle is cheap to clone; every clone serves the same tree.
#[derive(Debug, Clone)]
pub struct Fsys {
    core: Arc<FsCore>,
}

impl Fsys {
    /// Build the filesystem for `hostowner` (empty means `adm`).
    ///
    /// The root is owned by the host owner with mode `0755|DMDIR`; the
    /// server seeds `/adm` (`0770|DMDIR`), the synthetic `/adm/group`
    /// (`0660`) and `/adm/ctl` (`0220`), and `/<hostowner>` (`0750|DMDIR`)
    /// when the host owner is not `adm`.
    #[must_use]
    pub fn new(hostowner: &str) -> Self {
        let owner = if hostowner.is_empty() { "adm" } else { hostowner };
        let core = Arc::new_cyclic(|weak: &Weak<FsCore>| {
            let group = Arc::new(Group::new(owner));
            let ctx = Arc::new(FsCtx::new(group.clone(), owner));
            let root = Node::new(
                ctx.clone(),
                "/",
                owner,
                "adm",
                0o755 | DMDIR,
                0,
                NodeKind::directory(),
            );
            root.set_parent(&root);
            let adm = Node::new(
                ctx.clone(),
                "adm",
                "adm",
                "adm",
                0o770 | DMDIR,
                1,
                NodeKind::directory(),
            );
            let group_file = Node::new(
                ctx.clone(),
                "group",
                "adm",
                "adm",
                0o660,
                2,
                NodeKind::file(Backing::Group(group)),
            );
            let ctl = Node::new(
                ctx.clone(),
                "ctl",
                "adm",
                "adm",
                0o220,
                3,
                NodeKind::file(Backing::Ctl(CtlFile::new(weak.clone()))),
            );
            node::adopt(&root, adm.clone());
            node::adopt(&adm, group_file);
            node::adopt(&adm, ctl);
            if owner != "adm" {
                let home = Node::new(
                    ctx.clone(),
                    owner,
                    owner,
                    owner,
                    0o750 | DMDIR,
                    4,
                    NodeKind::directory(),
                );
                node::adopt(&root, home);
            }
            FsCore { ctx, root }
        });
        info!(target: "nine-vault", "filesystem initialised for hostowner {owner}");
        Fsys { core }
    }

    pub(crate) fn from_core(core: Arc<FsCore>) -> Self {
        Fsys { core }
    }

    /// Close the filesystem, rendering it unusable for I/O.
    pub fn halt(&self) -> Result<(), FsError> {
        Ok(())
    }

    /// Attach as `uname` to the subtree named by `aname`, yielding a fid on
    /// its root.
    pub fn attach(&self, uname: &str, aname: &str) -> Result<Arc<Fid>, FsError> {
        let (node, uid) = self.core.attach(uname, aname)?;
        Ok(Fid::new(0, &uid, node))
    }

    /// Create `name` as the host owner and return a fid opened on it.
    pub fn create(&self, name: &str, mode: u8, perm: u32) -> Result<Arc<Fid>, FsError> {
        let uid = self.core.ctx.hostowner.clone();
        let (dname, base) = match name.rfind('/') {
            Some(i) => (&name[..i], &name[i + 1..]),
            None => ("", name),
        };
        let dir = self.core.walk_path(dname)?;
        let child = dir.create(&uid, base, mode, perm)?;
        Ok(Fid::opened(0, &uid, child))
    }

    /// Open `name` as the host owner.
    pub fn open(&self, name: &str, mode: u8) -> Result<Arc<Fid>, FsError> {
        let uid = self.core.ctx.hostowner.clone();
        let node = self.core.walk_path(name)?;
        let fid = Fid::new(0, &uid, node);
        fid.open(mode)?;
        Ok(fid)
    }

    /// Remove `name` as the host owner.
    pub fn remove(&self, name: &str) -> Result<(), FsError> {
        let uid = self.core.ctx.hostowner.clone();
        let node = self.core.walk_path(name)?;
        let fid = Fid::opened(0, &uid, node);
        fid.remove()
    }

    /// Bind a listener on `network`/`addr` without serving yet.
    ///
    /// Only the stream networks `tcp`, `tcp4` and `tcp6` are supported.
    pub fn bind(&self, network: &str, addr: &str) -> Result<FsListener, FsError> {
        match network {
            "tcp" | "tcp4" | "tcp6" => {}
            other => return Err(FsError::UnknownNetwork(other.to_owned())),
        }
        let listener =
            TcpListener::bind(addr).map_err(|err| FsError::Transport(err.to_string()))?;
        let local = listener
            .local_addr()
            .map_err(|err| FsError::Transport(err.to_string()))?;
        info!(target: "nine-vault", "listening on {network} {local}");
        Ok(FsListener {
            listener,
            local,
            core: self.core.clone(),
        })
    }

    /// Listen on `network`/`addr` and serve incoming connections forever.
    pub fn listen(&self, network: &str, addr: &str) -> Result<(), FsError> {
        self.bind(network, addr)?.serve();
        Ok(())
    }
}

/// A bound listener; [`FsListener::serve`] runs the accept loop.
#[derive(Debug)]
pub struct FsListener {
    listener: TcpListener,
    local: SocketAddr,
    core: Arc<FsCore>,
}

impl FsListener {
    /// The address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Accept connections and run a pipeline per stream, forever.
    pub fn serve(self) {
        let (server, work) = Server::start(self.core.clone());
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(target: "nine-vault", "accept: {err}");
                    continue;
                }
            };
            let id = match server.new_conn() {
                Ok(id) => id,
                Err(err) => {
                    warn!(target: "nine-vault", "refusing connection from {peer}: {err}");
                    continue;
                }
            };
            debug!(target: "nine-vault", "connection {id} accepted from {peer}");
            let server = server.clone();
            let work = work.clone();
            let fs = self.core.clone();
            thread::spawn(move || {
                conn::serve(stream, fs, work);
                server.del_conn(id);
                debug!(target: "nine-vault", "connection {id} done");
            });
        }
    }
}

fn split(path: &str) -> Vec<String> {
    if path.is_empty() || path == "/" || path == "." {
        return Vec::new();
    }
    let path = path.strip_prefix('/').unwrap_or(path);
    path.split('/').map(str::to_owned).collect()
}
