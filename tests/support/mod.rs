// Author: Lukas Bower
// Purpose: Minimal 9P2000 client used by the end-to-end server tests.
#![allow(dead_code)]

use std::net::{SocketAddr, TcpStream};
use std::thread;

use nine_vault::Fsys;
use ninevault_wire::{
    self as wire, Qid, Request, RequestBody, Response, ResponseBody, Stat, MSIZE, NOFID,
};

/// Start a fresh server on an ephemeral port and return its address.
pub fn start_server(hostowner: &str) -> SocketAddr {
    let fs = Fsys::new(hostowner);
    let listener = fs.bind("tcp", "127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr();
    thread::spawn(move || listener.serve());
    addr
}

/// Synchronous protocol client over one TCP connection.
pub struct TestClient {
    stream: TcpStream,
    next_tag: u16,
}

impl TestClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to test server");
        Self {
            stream,
            next_tag: 1,
        }
    }

    /// Fire a request without waiting for its reply; returns the tag.
    pub fn send(&mut self, body: RequestBody) -> u16 {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1);
        wire::write_request(&mut self.stream, &Request { tag, body }).expect("write request");
        tag
    }

    /// Collect the next reply, in whatever order the server finished.
    pub fn recv(&mut self) -> Response {
        wire::read_response(&mut self.stream).expect("read response")
    }

    fn transact(&mut self, body: RequestBody) -> Result<ResponseBody, String> {
        let tag = self.send(body);
        let response = self.recv();
        assert_eq!(response.tag, tag, "mismatched response tag");
        match response.body {
            ResponseBody::Error { ename } => Err(ename),
            other => Ok(other),
        }
    }

    pub fn version(&mut self, msize: u32) -> Result<u32, String> {
        let response = self.transact(RequestBody::Version {
            msize,
            version: wire::VERSION.to_owned(),
        })?;
        let ResponseBody::Version { msize, .. } = response else {
            panic!("unexpected version response: {response:?}");
        };
        Ok(msize)
    }

    pub fn auth(&mut self, uname: &str) -> Result<Qid, String> {
        let response = self.transact(RequestBody::Auth {
            afid: 1,
            uname: uname.to_owned(),
            aname: String::new(),
        })?;
        let ResponseBody::Auth { aqid } = response else {
            panic!("unexpected auth response: {response:?}");
        };
        Ok(aqid)
    }

    pub fn attach(&mut self, fid: u32, uname: &str, aname: &str) -> Result<Qid, String> {
        self.attach_with_afid(fid, NOFID, uname, aname)
    }

    pub fn attach_with_afid(
        &mut self,
        fid: u32,
        afid: u32,
        uname: &str,
        aname: &str,
    ) -> Result<Qid, String> {
        let response = self.transact(RequestBody::Attach {
            fid,
            afid,
            uname: uname.to_owned(),
            aname: aname.to_owned(),
        })?;
        let ResponseBody::Attach { qid } = response else {
            panic!("unexpected attach response: {response:?}");
        };
        Ok(qid)
    }

    pub fn walk(&mut self, fid: u32, newfid: u32, names: &[&str]) -> Result<Vec<Qid>, String> {
        let response = self.transact(RequestBody::Walk {
            fid,
            newfid,
            wnames: names.iter().map(|s| (*s).to_owned()).collect(),
        })?;
        let ResponseBody::Walk { wqids } = response else {
            panic!("unexpected walk response: {response:?}");
        };
        Ok(wqids)
    }

    pub fn open(&mut self, fid: u32, mode: u8) -> Result<(Qid, u32), String> {
        let response = self.transact(RequestBody::Open { fid, mode })?;
        let ResponseBody::Open { qid, iounit } = response else {
            panic!("unexpected open response: {response:?}");
        };
        Ok((qid, iounit))
    }

    pub fn create(
        &mut self,
        fid: u32,
        name: &str,
        perm: u32,
        mode: u8,
    ) -> Result<(Qid, u32), String> {
        let response = self.transact(RequestBody::Create {
            fid,
            name: name.to_owned(),
            perm,
            mode,
        })?;
        let ResponseBody::Create { qid, iounit } = response else {
            panic!("unexpected create response: {response:?}");
        };
        Ok((qid, iounit))
    }

    pub fn read(&mut self, fid: u32, offset: u64, count: u32) -> Result<Vec<u8>, String> {
        let response = self.transact(RequestBody::Read { fid, offset, count })?;
        let ResponseBody::Read { data } = response else {
            panic!("unexpected read response: {response:?}");
        };
        Ok(data)
    }

    pub fn write(&mut self, fid: u32, offset: u64, data: &[u8]) -> Result<u32, String> {
        let response = self.transact(RequestBody::Write {
            fid,
            offset,
            data: data.to_vec(),
        })?;
        let ResponseBody::Write { count } = response else {
            panic!("unexpected write response: {response:?}");
        };
        Ok(count)
    }

    pub fn clunk(&mut self, fid: u32) -> Result<(), String> {
        self.transact(RequestBody::Clunk { fid }).map(|_| ())
    }

    pub fn remove(&mut self, fid: u32) -> Result<(), String> {
        self.transact(RequestBody::Remove { fid }).map(|_| ())
    }

    pub fn stat(&mut self, fid: u32) -> Result<Stat, String> {
        let response = self.transact(RequestBody::Stat { fid })?;
        let ResponseBody::Stat { stat } = response else {
            panic!("unexpected stat response: {response:?}");
        };
        Ok(Stat::from_bytes(&stat).expect("parse stat record"))
    }

    pub fn wstat(&mut self, fid: u32, stat: &Stat) -> Result<(), String> {
        self.transact(RequestBody::Wstat {
            fid,
            stat: stat.to_bytes(),
        })
        .map(|_| ())
    }

    pub fn flush(&mut self, oldtag: u16) -> Result<(), String> {
        self.transact(RequestBody::Flush { oldtag }).map(|_| ())
    }
}

/// Connect, negotiate the protocol and attach as `uname` at the root.
pub fn attach_client(addr: SocketAddr, uname: &str) -> TestClient {
    let mut client = TestClient::connect(addr);
    client.version(MSIZE).expect("version handshake");
    client.attach(1, uname, "/").expect("attach");
    client
}
