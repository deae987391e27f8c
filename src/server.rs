// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Dispatch parsed 9P2000 requests onto filesystem operations.
// Author: Lukas Bower

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;
use ninevault_wire::{RequestBody, ResponseBody, IOHDRSZ, IOUNIT, MSIZE, NOFID, STATMAX, VERSION};

use crate::fid::Fid;
use crate::fsys::FsCore;
use crate::FsError;

/// Dispatcher threads shared by every connection of one listener.
const DISPATCH_WORKERS: usize = 8;

const MAX_CONN: u32 = !0;

/// One request in flight: the parsed body, its resolved fids and a private
/// reply channel.
pub(crate) struct Transaction {
    pub body: RequestBody,
    pub fid: Option<Arc<Fid>>,
    pub newfid: Option<Arc<Fid>>,
    pub reply: Sender<Result<ResponseBody, FsError>>,
}

/// Protocol handler: maps each request type onto the node tree.
pub(crate) struct Server {
    fs: Arc<FsCore>,
    conns: Mutex<ConnPool>,
}

impl Server {
    /// Spawn the dispatcher pool and hand back the work queue feeding it.
    pub fn start(fs: Arc<FsCore>) -> (Arc<Server>, Sender<Transaction>) {
        let (work_tx, work_rx) = unbounded::<Transaction>();
        let server = Arc::new(Server {
            fs,
            conns: Mutex::new(ConnPool::new()),
        });
        for _ in 0..DISPATCH_WORKERS {
            let server = server.clone();
            let work_rx = work_rx.clone();
            thread::spawn(move || server.run(work_rx));
        }
        (server, work_tx)
    }

    fn run(&self, work: Receiver<Transaction>) {
        for txn in work.iter() {
            let result = self.process(&txn);
            if let Err(err) = &result {
                trace!(target: "nine-vault", "request failed: {err}");
            }
            let _ = txn.reply.send(result);
        }
    }

    fn process(&self, txn: &Transaction) -> Result<ResponseBody, FsError> {
        match &txn.body {
            RequestBody::Version { msize, .. } => version(*msize),
            RequestBody::Auth { .. } => Err(FsError::AuthNotRequired),
            RequestBody::Flush { .. } => Ok(ResponseBody::Flush),
            RequestBody::Attach {
                afid, uname, aname, ..
            } => self.attach(fid(txn)?, *afid, uname, aname),
            RequestBody::Walk { wnames, .. } => walk(fid(txn)?, newfid(txn)?, wnames),
            RequestBody::Open { mode, .. } => {
                let fid = fid(txn)?;
                fid.open(*mode)?;
                Ok(ResponseBody::Open {
                    qid: fid.node().qid(),
                    iounit: IOUNIT,
                })
            }
            RequestBody::Create {
                name, perm, mode, ..
            } => {
                let fid = fid(txn)?;
                fid.create(name, *mode, *perm)?;
                Ok(ResponseBody::Create {
                    qid: fid.node().qid(),
                    iounit: IOUNIT,
                })
            }
            RequestBody::Read { offset, count, .. } => read(fid(txn)?, *offset, *count),
            RequestBody::Write { offset, data, .. } => {
                let n = fid(txn)?.write_at(data, *offset)?;
                Ok(ResponseBody::Write { count: n as u32 })
            }
            RequestBody::Clunk { .. } => {
                let _ = fid(txn)?.close();
                Ok(ResponseBody::Clunk)
            }
            RequestBody::Remove { .. } => {
                // Remove clunks the fid even when the removal fails.
                let fid = fid(txn)?;
                let _ = fid.remove();
                let _ = fid.close();
                Ok(ResponseBody::Remove)
            }
            RequestBody::Stat { .. } => Ok(ResponseBody::Stat {
                stat: fid(txn)?.stat()?,
            }),
            RequestBody::Wstat { stat, .. } => {
                fid(txn)?.wstat(stat)?;
                Ok(ResponseBody::Wstat)
            }
            RequestBody::Openfd { .. } => Err(FsError::BadFcall),
        }
    }

    fn attach(
        &self,
        fid: &Arc<Fid>,
        afid: u32,
        uname: &str,
        aname: &str,
    ) -> Result<ResponseBody, FsError> {
        if afid != NOFID {
            return Err(FsError::AuthNotRequired);
        }
        let (node, uid) = self.fs.attach(uname, aname)?;
        let qid = node.qid();
        fid.set_attach(node, uid);
        Ok(ResponseBody::Attach { qid })
    }

    /// Reserve a connection id, recycling released ids first.
    pub fn new_conn(&self) -> Result<u32, FsError> {
        self.conns
            .lock()
            .expect("poisoned connection pool lock")
            .alloc()
    }

    /// Return a connection id to the pool.
    pub fn del_conn(&self, id: u32) {
        self.conns
            .lock()
            .expect("poisoned connection pool lock")
            .free(id);
    }
}

fn version(msize: u32) -> Result<ResponseBody, FsError> {
    if msize < IOHDRSZ {
        return Err(FsError::MsizeTooSmall);
    }
    Ok(ResponseBody::Version {
        msize: msize.min(MSIZE),
        version: VERSION.to_owned(),
    })
}

fn walk(fid: &Arc<Fid>, newfid: &Arc<Fid>, wnames: &[String]) -> Result<ResponseBody, FsError> {
    let mut wqids = Vec::with_capacity(wnames.len());
    fid.walk(newfid, wnames, |node, _| {
        wqids.push(node.qid());
        Ok(())
    })?;
    Ok(ResponseBody::Walk { wqids })
}

fn read(fid: &Arc<Fid>, offset: u64, count: u32) -> Result<ResponseBody, FsError> {
    // Replies must fit the negotiated message size; directories are further
    // capped at the largest stat record run a client can parse.
    let mut count = count.min(IOUNIT);
    if fid.node().is_dir() {
        count = count.min(STATMAX);
    }
    let mut data = vec![0u8; count as usize];
    let n = fid.read_at(&mut data, offset)?;
    data.truncate(n);
    Ok(ResponseBody::Read { data })
}

fn fid(txn: &Transaction) -> Result<&Arc<Fid>, FsError> {
    txn.fid.as_ref().ok_or(FsError::BadFcall)
}

fn newfid(txn: &Transaction) -> Result<&Arc<Fid>, FsError> {
    txn.newfid.as_ref().ok_or(FsError::BadFcall)
}

/// Recycling connection-id allocator, bounded at `u32::MAX`.
struct ConnPool {
    next: u32,
    free: HashSet<u32>,
}

impl ConnPool {
    fn new() -> Self {
        Self {
            next: 0,
            free: HashSet::new(),
        }
    }

    fn alloc(&mut self) -> Result<u32, FsError> {
        if let Some(&id) = self.free.iter().next() {
            self.free.remove(&id);
            return Ok(id);
        }
        if self.next == MAX_CONN {
            return Err(FsError::MaxConnReached);
        }
        let id = self.next;
        self.next += 1;
        Ok(id)
    }

    fn free(&mut self, id: u32) {
        self.free.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_negotiates_msize() {
        assert!(matches!(
            version(MSIZE + 4096),
            Ok(ResponseBody::Version { msize, .. }) if msize == MSIZE
        ));
        assert!(matches!(
            version(8192),
            Ok(ResponseBody::Version { msize, .. }) if msize == 8192
        ));
        assert_eq!(version(IOHDRSZ - 1), Err(FsError::MsizeTooSmall));
    }

    #[test]
    fn connection_ids_recycle() {
        let mut pool = ConnPool::new();
        assert_eq!(pool.alloc(), Ok(0));
        assert_eq!(pool.alloc(), Ok(1));
        pool.free(0);
        assert_eq!(pool.alloc(), Ok(0));
        assert_eq!(pool.alloc(), Ok(2));
    }
}
