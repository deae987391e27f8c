// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Per-connection pipeline: frame reader, worker pool and writer.
// Author: Lukas Bower

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Sender};
use log::{debug, warn};
use ninevault_wire::{self as wire, Request, RequestBody, Response, ResponseBody, WireError};

use crate::fid::Fid;
use crate::fsys::FsCore;
use crate::server::Transaction;
use crate::FsError;

/// Depth of the per-connection request queue between reader and workers.
const REQUEST_QUEUE: usize = 64;

/// Workers processing requests of one connection in parallel; replies are
/// written in whatever order they complete.
const CONN_WORKERS: usize = 4;

/// State shared by the reader, workers and writer of one connection.
struct Conn {
    fs: Arc<FsCore>,
    fids: Mutex<HashMap<u32, Arc<Fid>>>,
    uid: Mutex<String>,
    err: Mutex<Option<WireError>>,
}

impl Conn {
    fn new(fs: Arc<FsCore>) -> Arc<Conn> {
        Arc::new(Conn {
            fs,
            fids: Mutex::new(HashMap::new()),
            uid: Mutex::new("none".to_owned()),
            err: Mutex::new(None),
        })
    }

    fn get_fid(&self, num: u32) -> Arc<Fid> {
        let mut fids = self.fids.lock().expect("poisoned fid map lock");
        if let Some(fid) = fids.get(&num) {
            return fid.clone();
        }
        let uid = self.uid.lock().expect("poisoned uid lock").clone();
        let fid = Fid::new(num, &uid, self.fs.root());
        fids.insert(num, fid.clone());
        fid
    }

    /// Drop the map entry once no in-flight request holds the fid.
    fn del_fid(&self, num: u32) {
        let mut fids = self.fids.lock().expect("poisoned fid map lock");
        if let Some(fid) = fids.get(&num) {
            if fid.ref_count() == 0 {
                fids.remove(&num);
            }
        }
    }

    fn clear_fids(&self) {
        self.fids.lock().expect("poisoned fid map lock").clear();
    }

    fn set_uid(&self, uid: String) {
        *self.uid.lock().expect("poisoned uid lock") = uid;
    }

    /// Latch the first error; later ones are dropped.
    fn latch(&self, err: WireError) {
        let mut guard = self.err.lock().expect("poisoned error latch");
        if guard.is_none() {
            *guard = Some(err);
        }
    }

    fn failed(&self) -> bool {
        self.err.lock().expect("poisoned error latch").is_some()
    }

    fn take_err(&self) -> Option<WireError> {
        self.err.lock().expect("poisoned error latch").take()
    }

    /// Run one request through pre-bookkeeping, the dispatcher and
    /// post-bookkeeping, producing the reply to write.
    fn handle(&self, req: Request, work: &Sender<Transaction>) -> Response {
        let tag = req.tag;
        let mut fid = None;
        let mut newfid = None;
        match &req.body {
            // A version request resets the protocol: every fid is dropped.
            RequestBody::Version { .. } => self.clear_fids(),
            RequestBody::Auth { .. } | RequestBody::Flush { .. } => {}
            body => {
                if let Some(num) = body.fid() {
                    let f = self.get_fid(num);
                    f.inc_ref();
                    if let RequestBody::Walk { newfid: nf, .. } = body {
                        newfid = Some(self.get_fid(*nf));
                    }
                    fid = Some(f);
                }
            }
        }

        let (reply_tx, reply_rx) = bounded(1);
        let txn = Transaction {
            body: req.body,
            fid: fid.clone(),
            newfid,
            reply: reply_tx,
        };
        let result = if work.send(txn).is_ok() {
            reply_rx.recv().unwrap_or(Err(FsError::Shutdown))
        } else {
            Err(FsError::Shutdown)
        };

        if let Some(f) = &fid {
            match &result {
                Ok(ResponseBody::Attach { .. }) => {
                    self.set_uid(f.uid());
                    f.dec_ref();
                    self.del_fid(f.num());
                }
                Ok(ResponseBody::Walk { .. }) | Ok(ResponseBody::Clunk) => {
                    f.dec_ref();
                    self.del_fid(f.num());
                }
                _ => {
                    f.dec_ref();
                }
            }
        }

        let body = result.unwrap_or_else(|err| ResponseBody::Error {
            ename: err.to_string(),
        });
        Response { tag, body }
    }
}

/// Serve one established stream until it fails or the client goes away.
pub(crate) fn serve(stream: TcpStream, fs: Arc<FsCore>, work: Sender<Transaction>) {
    let conn = Conn::new(fs);
    let mut reader = match stream.try_clone() {
        Ok(clone) => clone,
        Err(err) => {
            warn!(target: "nine-vault", "cannot clone connection stream: {err}");
            return;
        }
    };

    let (req_tx, req_rx) = bounded::<Request>(REQUEST_QUEUE);
    let (resp_tx, resp_rx) = bounded::<Response>(REQUEST_QUEUE);

    let reader_conn = conn.clone();
    let reader_handle = thread::spawn(move || loop {
        match wire::read_request(&mut reader) {
            Ok(req) => {
                debug!(target: "nine-vault", "-> {req}");
                if req_tx.send(req).is_err() {
                    break;
                }
            }
            Err(err) => {
                reader_conn.latch(err);
                break;
            }
        }
    });

    let mut workers = Vec::with_capacity(CONN_WORKERS);
    for _ in 0..CONN_WORKERS {
        let conn = conn.clone();
        let req_rx = req_rx.clone();
        let resp_tx = resp_tx.clone();
        let work = work.clone();
        workers.push(thread::spawn(move || {
            for req in req_rx.iter() {
                if conn.failed() {
                    continue;
                }
                let resp = conn.handle(req, &work);
                if conn.failed() {
                    continue;
                }
                if resp_tx.send(resp).is_err() {
                    break;
                }
            }
        }));
    }
    drop(resp_tx);
    drop(req_rx);

    let mut writer = stream;
    for resp in resp_rx.iter() {
        if conn.failed() {
            continue;
        }
        debug!(target: "nine-vault", "<- {resp}");
        if let Err(err) = wire::write_response(&mut writer, &resp) {
            conn.latch(err);
        }
    }

    let _ = reader_handle.join();
    for worker in workers {
        let _ = worker.join();
    }

    if let Some(err) = conn.take_err() {
        debug!(target: "nine-vault", "connection closed: {err}");
    }
}
