// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Per-connection file handles carrying open state and refcounts.
// Author: Lukas Bower

use std::sync::{Arc, Mutex, MutexGuard};

use ninevault_wire::{
    Stat, DMEXEC, DMREAD, DMWRITE, MAXWELEM, OREAD, ORDWR, OTRUNC, OWRITE,
};

use crate::node::{self, NodeRef};
use crate::FsError;

/// A fid identifies a file on the server on behalf of one client.
///
/// Fids are created when a client attaches or walks; the connection layer
/// reference-counts them so a fid clunked by one request cannot be freed
/// while a concurrent request still holds it.
pub struct Fid {
    num: u32,
    state: Mutex<FidState>,
}

struct FidState {
    uid: String,
    node: NodeRef,
    opened: bool,
    /// Residue of the most recent directory listing.
    buf: Vec<u8>,
    refs: u16,
}

impl Fid {
    pub(crate) fn new(num: u32, uid: &str, node: NodeRef) -> Arc<Fid> {
        Arc::new(Fid {
            num,
            state: Mutex::new(FidState {
                uid: uid.to_owned(),
                node,
                opened: false,
                buf: Vec::new(),
                refs: 0,
            }),
        })
    }

    /// A fid born already open, used by the in-process convenience API.
    pub(crate) fn opened(num: u32, uid: &str, node: NodeRef) -> Arc<Fid> {
        let fid = Fid::new(num, uid, node);
        fid.state().opened = true;
        fid
    }

    pub(crate) fn num(&self) -> u32 {
        self.num
    }

    pub(crate) fn uid(&self) -> String {
        self.state().uid.clone()
    }

    pub(crate) fn node(&self) -> NodeRef {
        self.state().node.clone()
    }

    pub(crate) fn set_node(&self, node: NodeRef) {
        self.state().node = node;
    }

    pub(crate) fn set_attach(&self, node: NodeRef, uid: String) {
        let mut state = self.state();
        state.node = node;
        state.uid = uid;
    }

    pub(crate) fn inc_ref(&self) {
        let mut state = self.state();
        state.refs = state.refs.saturating_add(1);
    }

    pub(crate) fn dec_ref(&self) -> u16 {
        let mut state = self.state();
        state.refs = state.refs.saturating_sub(1);
        state.refs
    }

    pub(crate) fn ref_count(&self) -> u16 {
        self.state().refs
    }

    fn is_open(&self) -> bool {
        self.state().opened
    }

    /// Check permissions and prepare the fid for I/O.
    ///
    /// Truncation is accepted on append-only files but does not truncate;
    /// remove-on-close records a flag on the node, honoured at close time.
    pub fn open(&self, mode: u8) -> Result<(), FsError> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        let node = self.node();
        let mut wanted = match mode & 3 {
            OREAD => DMREAD,
            OWRITE => DMWRITE,
            ORDWR => DMREAD | DMWRITE,
            _ => DMEXEC,
        };
        if mode & OTRUNC != 0 {
            wanted |= DMWRITE;
        }
        if !node.has_perm(&self.uid(), wanted) {
            return Err(FsError::Permission);
        }
        node.open(mode)?;
        self.state().opened = true;
        Ok(())
    }

    /// Create `name` in the directory this fid refers to and move the fid
    /// onto the new file, opened according to `mode`.
    pub fn create(&self, name: &str, mode: u8, perm: u32) -> Result<(), FsError> {
        let uid = self.uid();
        let parent = self.node();
        if !parent.has_perm(&uid, perm) {
            return Err(FsError::Permission);
        }
        let child = parent.create(&uid, name, mode, perm)?;
        let mut state = self.state();
        state.node = child;
        state.opened = true;
        Ok(())
    }

    /// Declare the fid no longer needed; honours remove-on-close.
    pub fn close(&self) -> Result<(), FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        let node = self.node();
        if node.remove_on_close() {
            let uid = self.uid();
            if !node.has_perm(&uid, DMWRITE) {
                return Err(FsError::Permission);
            }
            if let Some(parent) = node.parent() {
                if !parent.has_perm(&uid, DMWRITE) {
                    return Err(FsError::Permission);
                }
            }
        }
        self.state().opened = false;
        node.close()
    }

    /// Remove the file this fid refers to; requires write permission on the
    /// file and its directory.
    pub fn remove(&self) -> Result<(), FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        let node = self.node();
        let uid = self.uid();
        if !node.has_perm(&uid, DMWRITE) {
            return Err(FsError::Permission);
        }
        if let Some(parent) = node.parent() {
            if !parent.has_perm(&uid, DMWRITE) {
                return Err(FsError::Permission);
            }
        }
        node.remove()
    }

    /// Read from the opened fid.
    ///
    /// On directories, offset zero refreshes the listing; subsequent reads
    /// drain the residue regardless of offset.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        let node = self.node();
        if node.is_dir() {
            let listing = if offset == 0 {
                Some(node.readdir()?)
            } else {
                None
            };
            let mut state = self.state();
            if let Some(listing) = listing {
                state.buf = listing;
            }
            let n = buf.len().min(state.buf.len());
            buf[..n].copy_from_slice(&state.buf[..n]);
            state.buf.drain(..n);
            return Ok(n);
        }
        node.read_at(buf, offset)
    }

    /// Write to the opened fid; append-only files ignore the offset.
    pub fn write_at(&self, p: &[u8], offset: u64) -> Result<usize, FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        let node = self.node();
        if node.is_dir() {
            return Err(FsError::IsDirectory);
        }
        node.write_at(p, offset)
    }

    /// Marshalled directory entry for the file this fid refers to.
    pub fn stat(&self) -> Result<Vec<u8>, FsError> {
        Ok(self.node().stat().to_bytes())
    }

    /// Apply a marshalled wstat request, all-or-nothing.
    pub fn wstat(&self, data: &[u8]) -> Result<(), FsError> {
        let request = Stat::from_bytes(data).map_err(|_| FsError::MalformedStat)?;
        self.node().wstat(&self.uid(), &request)
    }

    /// Walk `names` from this fid, updating `target` after every step and
    /// invoking `visit` with the node reached and the names remaining.
    pub(crate) fn walk<F>(
        &self,
        target: &Arc<Fid>,
        names: &[String],
        mut visit: F,
    ) -> Result<(), FsError>
    where
        F: FnMut(&NodeRef, &[String]) -> Result<(), FsError>,
    {
        if names.len() > MAXWELEM {
            return Err(FsError::WalkLimit);
        }
        target.set_node(self.node());
        node::walk(&self.node(), names, &mut |node, rest| {
            target.set_node(node.clone());
            visit(node, rest)
        })
    }

    fn state(&self) -> MutexGuard<'_, FidState> {
        self.state.lock().expect("poisoned fid lock")
    }
}
