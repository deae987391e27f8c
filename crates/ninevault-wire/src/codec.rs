// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Encode and decode 9P2000 wire frames over byte streams.
// Author: Lukas Bower

//! Little-endian framing for 9P2000 messages.
//!
//! Every frame is `size[4] type[1] tag[2] payload...` with `size` counting
//! the whole frame. Encoders return complete frames; decoders expect them.

use std::io::{Read, Write};
use std::str;

use crate::types::*;

/// 9P2000 message type codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageType {
    Topenfd = 98,
    Ropenfd = 99,
    Tversion = 100,
    Rversion = 101,
    Tauth = 102,
    Rauth = 103,
    Tattach = 104,
    Rattach = 105,
    Rerror = 107,
    Tflush = 108,
    Rflush = 109,
    Twalk = 110,
    Rwalk = 111,
    Topen = 112,
    Ropen = 113,
    Tcreate = 114,
    Rcreate = 115,
    Tread = 116,
    Rread = 117,
    Twrite = 118,
    Rwrite = 119,
    Tclunk = 120,
    Rclunk = 121,
    Tremove = 122,
    Rremove = 123,
    Tstat = 124,
    Rstat = 125,
    Twstat = 126,
    Rwstat = 127,
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, WireError> {
        use MessageType::*;
        Ok(match value {
            98 => Topenfd,
            99 => Ropenfd,
            100 => Tversion,
            101 => Rversion,
            102 => Tauth,
            103 => Rauth,
            104 => Tattach,
            105 => Rattach,
            107 => Rerror,
            108 => Tflush,
            109 => Rflush,
            110 => Twalk,
            111 => Rwalk,
            112 => Topen,
            113 => Ropen,
            114 => Tcreate,
            115 => Rcreate,
            116 => Tread,
            117 => Rread,
            118 => Twrite,
            119 => Rwrite,
            120 => Tclunk,
            121 => Rclunk,
            122 => Tremove,
            123 => Rremove,
            124 => Tstat,
            125 => Rstat,
            126 => Twstat,
            127 => Rwstat,
            other => return Err(WireError::Unsupported(other)),
        })
    }
}

/// Encode a request into a complete wire frame.
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&request.tag.to_le_bytes());
    match &request.body {
        RequestBody::Version { msize, version } => {
            payload.extend_from_slice(&msize.to_le_bytes());
            put_string(&mut payload, version);
            finish(MessageType::Tversion, payload)
        }
        RequestBody::Auth { afid, uname, aname } => {
            payload.extend_from_slice(&afid.to_le_bytes());
            put_string(&mut payload, uname);
            put_string(&mut payload, aname);
            finish(MessageType::Tauth, payload)
        }
        RequestBody::Attach {
            fid,
            afid,
            uname,
            aname,
        } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&afid.to_le_bytes());
            put_string(&mut payload, uname);
            put_string(&mut payload, aname);
            finish(MessageType::Tattach, payload)
        }
        RequestBody::Flush { oldtag } => {
            payload.extend_from_slice(&oldtag.to_le_bytes());
            finish(MessageType::Tflush, payload)
        }
        RequestBody::Walk {
            fid,
            newfid,
            wnames,
        } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&newfid.to_le_bytes());
            payload.extend_from_slice(&(wnames.len() as u16).to_le_bytes());
            for name in wnames {
                put_string(&mut payload, name);
            }
            finish(MessageType::Twalk, payload)
        }
        RequestBody::Open { fid, mode } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.push(*mode);
            finish(MessageType::Topen, payload)
        }
        RequestBody::Openfd { fid, mode } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.push(*mode);
            finish(MessageType::Topenfd, payload)
        }
        RequestBody::Create {
            fid,
            name,
            perm,
            mode,
        } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            put_string(&mut payload, name);
            payload.extend_from_slice(&perm.to_le_bytes());
            payload.push(*mode);
            finish(MessageType::Tcreate, payload)
        }
        RequestBody::Read { fid, offset, count } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&offset.to_le_bytes());
            payload.extend_from_slice(&count.to_le_bytes());
            finish(MessageType::Tread, payload)
        }
        RequestBody::Write { fid, offset, data } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&offset.to_le_bytes());
            payload.extend_from_slice(&(data.len() as u32).to_le_bytes());
            payload.extend_from_slice(data);
            finish(MessageType::Twrite, payload)
        }
        RequestBody::Clunk { fid } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            finish(MessageType::Tclunk, payload)
        }
        RequestBody::Remove { fid } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            finish(MessageType::Tremove, payload)
        }
        RequestBody::Stat { fid } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            finish(MessageType::Tstat, payload)
        }
        RequestBody::Wstat { fid, stat } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&(stat.len() as u16).to_le_bytes());
            payload.extend_from_slice(stat);
            finish(MessageType::Twstat, payload)
        }
    }
}

/// Encode a response into a complete wire frame.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&response.tag.to_le_bytes());
    match &response.body {
        ResponseBody::Version { msize, version } => {
            payload.extend_from_slice(&msize.to_le_bytes());
            put_string(&mut payload, version);
            finish(MessageType::Rversion, payload)
        }
        ResponseBody::Auth { aqid } => {
            put_qid(&mut payload, aqid);
            finish(MessageType::Rauth, payload)
        }
        ResponseBody::Error { ename } => {
            put_string(&mut payload, ename);
            finish(MessageType::Rerror, payload)
        }
        ResponseBody::Attach { qid } => {
            put_qid(&mut payload, qid);
            finish(MessageType::Rattach, payload)
        }
        ResponseBody::Flush => finish(MessageType::Rflush, payload),
        ResponseBody::Walk { wqids } => {
            payload.extend_from_slice(&(wqids.len() as u16).to_le_bytes());
            for qid in wqids {
                put_qid(&mut payload, qid);
            }
            finish(MessageType::Rwalk, payload)
        }
        ResponseBody::Open { qid, iounit } => {
            put_qid(&mut payload, qid);
            payload.extend_from_slice(&iounit.to_le_bytes());
            finish(MessageType::Ropen, payload)
        }
        ResponseBody::Openfd {
            qid,
            iounit,
            unixfd,
        } => {
            put_qid(&mut payload, qid);
            payload.extend_from_slice(&iounit.to_le_bytes());
            payload.extend_from_slice(&unixfd.to_le_bytes());
            finish(MessageType::Ropenfd, payload)
        }
        ResponseBody::Create { qid, iounit } => {
            put_qid(&mut payload, qid);
            payload.extend_from_slice(&iounit.to_le_bytes());
            finish(MessageType::Rcreate, payload)
        }
        ResponseBody::Read { data } => {
            payload.extend_from_slice(&(data.len() as u32).to_le_bytes());
            payload.extend_from_slice(data);
            finish(MessageType::Rread, payload)
        }
        ResponseBody::Write { count } => {
            payload.extend_from_slice(&count.to_le_bytes());
            finish(MessageType::Rwrite, payload)
        }
        ResponseBody::Clunk => finish(MessageType::Rclunk, payload),
        ResponseBody::Remove => finish(MessageType::Rremove, payload),
        ResponseBody::Stat { stat } => {
            payload.extend_from_slice(&(stat.len() as u16).to_le_bytes());
            payload.extend_from_slice(stat);
            finish(MessageType::Rstat, payload)
        }
        ResponseBody::Wstat => finish(MessageType::Rwstat, payload),
    }
}

/// Decode a request from a complete wire frame.
pub fn decode_request(bytes: &[u8]) -> Result<Request, WireError> {
    let (ty, payload) = decode_message(bytes)?;
    let mut cursor = Cursor::new(payload);
    let tag = read_u16(&mut cursor)?;
    let body = match ty {
        MessageType::Tversion => {
            let msize = read_u32(&mut cursor)?;
            let version = read_string(&mut cursor)?;
            RequestBody::Version { msize, version }
        }
        MessageType::Tauth => {
            let afid = read_u32(&mut cursor)?;
            let uname = read_string(&mut cursor)?;
            let aname = read_string(&mut cursor)?;
            RequestBody::Auth { afid, uname, aname }
        }
        MessageType::Tattach => {
            let fid = read_u32(&mut cursor)?;
            let afid = read_u32(&mut cursor)?;
            let uname = read_string(&mut cursor)?;
            let aname = read_string(&mut cursor)?;
            RequestBody::Attach {
                fid,
                afid,
                uname,
                aname,
            }
        }
        MessageType::Tflush => {
            let oldtag = read_u16(&mut cursor)?;
            RequestBody::Flush { oldtag }
        }
        MessageType::Twalk => {
            let fid = read_u32(&mut cursor)?;
            let newfid = read_u32(&mut cursor)?;
            let nwname = read_u16(&mut cursor)? as usize;
            let mut wnames = Vec::with_capacity(nwname.min(MAXWELEM));
            for _ in 0..nwname {
                wnames.push(read_string(&mut cursor)?);
            }
            RequestBody::Walk {
                fid,
                newfid,
                wnames,
            }
        }
        MessageType::Topen => {
            let fid = read_u32(&mut cursor)?;
            let mode = read_u8(&mut cursor)?;
            RequestBody::Open { fid, mode }
        }
        MessageType::Topenfd => {
            let fid = read_u32(&mut cursor)?;
            let mode = read_u8(&mut cursor)?;
            RequestBody::Openfd { fid, mode }
        }
        MessageType::Tcreate => {
            let fid = read_u32(&mut cursor)?;
            let name = read_string(&mut cursor)?;
            let perm = read_u32(&mut cursor)?;
            let mode = read_u8(&mut cursor)?;
            RequestBody::Create {
                fid,
                name,
                perm,
                mode,
            }
        }
        MessageType::Tread => {
            let fid = read_u32(&mut cursor)?;
            let offset = read_u64(&mut cursor)?;
            let count = read_u32(&mut cursor)?;
            RequestBody::Read { fid, offset, count }
        }
        MessageType::Twrite => {
            let fid = read_u32(&mut cursor)?;
            let offset = read_u64(&mut cursor)?;
            let count = read_u32(&mut cursor)? as usize;
            let data = read_bytes(&mut cursor, count)?;
            RequestBody::Write { fid, offset, data }
        }
        MessageType::Tclunk => {
            let fid = read_u32(&mut cursor)?;
            RequestBody::Clunk { fid }
        }
        MessageType::Tremove => {
            let fid = read_u32(&mut cursor)?;
            RequestBody::Remove { fid }
        }
        MessageType::Tstat => {
            let fid = read_u32(&mut cursor)?;
            RequestBody::Stat { fid }
        }
        MessageType::Twstat => {
            let fid = read_u32(&mut cursor)?;
            let nstat = read_u16(&mut cursor)? as usize;
            let stat = read_bytes(&mut cursor, nstat)?;
            RequestBody::Wstat { fid, stat }
        }
        other => return Err(WireError::Unsupported(other as u8)),
    };
    Ok(Request { tag, body })
}

/// Decode a response from a complete wire frame.
pub fn decode_response(bytes: &[u8]) -> Result<Response, WireError> {
    let (ty, payload) = decode_message(bytes)?;
    let mut cursor = Cursor::new(payload);
    let tag = read_u16(&mut cursor)?;
    let body = match ty {
        MessageType::Rversion => {
            let msize = read_u32(&mut cursor)?;
            let version = read_string(&mut cursor)?;
            ResponseBody::Version { msize, version }
        }
        MessageType::Rauth => {
            let aqid = read_qid(&mut cursor)?;
            ResponseBody::Auth { aqid }
        }
        MessageType::Rerror => {
            let ename = read_string(&mut cursor)?;
            ResponseBody::Error { ename }
        }
        MessageType::Rattach => {
            let qid = read_qid(&mut cursor)?;
            ResponseBody::Attach { qid }
        }
        MessageType::Rflush => ResponseBody::Flush,
        MessageType::Rwalk => {
            let nwqid = read_u16(&mut cursor)? as usize;
            let mut wqids = Vec::with_capacity(nwqid.min(MAXWELEM));
            for _ in 0..nwqid {
                wqids.push(read_qid(&mut cursor)?);
            }
            ResponseBody::Walk { wqids }
        }
        MessageType::Ropen => {
            let qid = read_qid(&mut cursor)?;
            let iounit = read_u32(&mut cursor)?;
            ResponseBody::Open { qid, iounit }
        }
        MessageType::Ropenfd => {
            let qid = read_qid(&mut cursor)?;
            let iounit = read_u32(&mut cursor)?;
            let unixfd = read_u32(&mut cursor)?;
            ResponseBody::Openfd {
                qid,
                iounit,
                unixfd,
            }
        }
        MessageType::Rcreate => {
            let qid = read_qid(&mut cursor)?;
            let iounit = read_u32(&mut cursor)?;
            ResponseBody::Create { qid, iounit }
        }
        MessageType::Rread => {
            let count = read_u32(&mut cursor)? as usize;
            let data = read_bytes(&mut cursor, count)?;
            ResponseBody::Read { data }
        }
        MessageType::Rwrite => {
            let count = read_u32(&mut cursor)?;
            ResponseBody::Write { count }
        }
        MessageType::Rclunk => ResponseBody::Clunk,
        MessageType::Rremove => ResponseBody::Remove,
        MessageType::Rstat => {
            let nstat = read_u16(&mut cursor)? as usize;
            let stat = read_bytes(&mut cursor, nstat)?;
            ResponseBody::Stat { stat }
        }
        MessageType::Rwstat => ResponseBody::Wstat,
        other => return Err(WireError::Unsupported(other as u8)),
    };
    Ok(Response { tag, body })
}

/// Read one request frame off a byte stream.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request, WireError> {
    let frame = read_frame(reader)?;
    decode_request(&frame)
}

/// Read one response frame off a byte stream.
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response, WireError> {
    let frame = read_frame(reader)?;
    decode_response(&frame)
}

/// Write one request frame to a byte stream.
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<(), WireError> {
    writer.write_all(&encode_request(request))?;
    writer.flush()?;
    Ok(())
}

/// Write one response frame to a byte stream.
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<(), WireError> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

impl Stat {
    /// Marshal into the wire form, including the leading record size.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(49 + self.name.len() + self.uid.len());
        body.extend_from_slice(&self.typ.to_le_bytes());
        body.extend_from_slice(&self.dev.to_le_bytes());
        put_qid(&mut body, &self.qid);
        body.extend_from_slice(&self.mode.to_le_bytes());
        body.extend_from_slice(&self.atime.to_le_bytes());
        body.extend_from_slice(&self.mtime.to_le_bytes());
        body.extend_from_slice(&self.length.to_le_bytes());
        put_string(&mut body, &self.name);
        put_string(&mut body, &self.uid);
        put_string(&mut body, &self.gid);
        put_string(&mut body, &self.muid);
        let mut record = Vec::with_capacity(body.len() + 2);
        record.extend_from_slice(&(body.len() as u16).to_le_bytes());
        record.extend_from_slice(&body);
        record
    }

    /// Unmarshal one size-prefixed record from the front of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let mut cursor = Cursor::new(bytes);
        Self::read_from(&mut cursor)
    }

    /// Unmarshal a concatenation of records, as produced by directory reads.
    pub fn parse_list(bytes: &[u8]) -> Result<Vec<Self>, WireError> {
        let mut cursor = Cursor::new(bytes);
        let mut stats = Vec::new();
        while !cursor.is_empty() {
            stats.push(Self::read_from(&mut cursor)?);
        }
        Ok(stats)
    }

    fn read_from(cursor: &mut Cursor<'_>) -> Result<Self, WireError> {
        let _size = read_u16(cursor)?;
        let typ = read_u16(cursor)?;
        let dev = read_u32(cursor)?;
        let qid = read_qid(cursor)?;
        let mode = read_u32(cursor)?;
        let atime = read_u32(cursor)?;
        let mtime = read_u32(cursor)?;
        let length = read_u64(cursor)?;
        let name = read_string(cursor)?;
        let uid = read_string(cursor)?;
        let gid = read_string(cursor)?;
        let muid = read_string(cursor)?;
        Ok(Self {
            typ,
            dev,
            qid,
            mode,
            atime,
            mtime,
            length,
            name,
            uid,
            gid,
            muid,
        })
    }
}

fn finish(ty: MessageType, payload: Vec<u8>) -> Vec<u8> {
    let size = payload.len() + 5;
    let mut frame = Vec::with_capacity(size);
    frame.extend_from_slice(&(size as u32).to_le_bytes());
    frame.push(ty as u8);
    frame.extend_from_slice(&payload);
    frame
}

fn decode_message(bytes: &[u8]) -> Result<(MessageType, &[u8]), WireError> {
    if bytes.len() < 5 {
        return Err(WireError::Truncated);
    }
    let declared = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if declared as usize != bytes.len() {
        return Err(WireError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let ty = MessageType::try_from(bytes[4])?;
    Ok((ty, &bytes[5..]))
}

fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, WireError> {
    let mut size_bytes = [0u8; 4];
    reader.read_exact(&mut size_bytes)?;
    let size = u32::from_le_bytes(size_bytes);
    if size < 7 {
        return Err(WireError::Truncated);
    }
    if size > MSIZE {
        return Err(WireError::FrameTooLarge);
    }
    let mut frame = vec![0u8; size as usize];
    frame[..4].copy_from_slice(&size_bytes);
    reader.read_exact(&mut frame[4..])?;
    Ok(frame)
}

fn read_u8(cursor: &mut Cursor<'_>) -> Result<u8, WireError> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16(cursor: &mut Cursor<'_>) -> Result<u16, WireError> {
    let mut buf = [0u8; 2];
    cursor.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(cursor: &mut Cursor<'_>) -> Result<u32, WireError> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(cursor: &mut Cursor<'_>) -> Result<u64, WireError> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_bytes(cursor: &mut Cursor<'_>, count: usize) -> Result<Vec<u8>, WireError> {
    let mut buf = vec![0u8; count];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string(cursor: &mut Cursor<'_>) -> Result<String, WireError> {
    let len = read_u16(cursor)? as usize;
    let buf = read_bytes(cursor, len)?;
    let text = str::from_utf8(&buf).map_err(|_| WireError::InvalidUtf8)?;
    Ok(text.to_owned())
}

fn read_qid(cursor: &mut Cursor<'_>) -> Result<Qid, WireError> {
    let ty = read_u8(cursor)?;
    let vers = read_u32(cursor)?;
    let path = read_u64(cursor)?;
    Ok(Qid { ty, vers, path })
}

fn put_qid(buffer: &mut Vec<u8>, qid: &Qid) {
    buffer.push(qid.ty);
    buffer.extend_from_slice(&qid.vers.to_le_bytes());
    buffer.extend_from_slice(&qid.path.to_le_bytes());
}

fn put_string(buffer: &mut Vec<u8>, value: &str) {
    buffer.extend_from_slice(&(value.len() as u16).to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), WireError> {
        let end = self.pos.saturating_add(out.len());
        if end > self.buf.len() {
            return Err(WireError::Truncated);
        }
        out.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_round_trip(body: RequestBody) {
        let request = Request { tag: 42, body };
        let frame = encode_request(&request);
        let decoded = decode_request(&frame).expect("decode request");
        assert_eq!(decoded, request);
    }

    fn response_round_trip(body: ResponseBody) {
        let response = Response { tag: 7, body };
        let frame = encode_response(&response);
        let decoded = decode_response(&frame).expect("decode response");
        assert_eq!(decoded, response);
    }

    #[test]
    fn request_frames_round_trip() {
        request_round_trip(RequestBody::Version {
            msize: MSIZE,
            version: VERSION.to_owned(),
        });
        request_round_trip(RequestBody::Auth {
            afid: 1,
            uname: "adm".to_owned(),
            aname: String::new(),
        });
        request_round_trip(RequestBody::Attach {
            fid: 1,
            afid: NOFID,
            uname: "glenda".to_owned(),
            aname: "/".to_owned(),
        });
        request_round_trip(RequestBody::Flush { oldtag: 3 });
        request_round_trip(RequestBody::Walk {
            fid: 1,
            newfid: 2,
            wnames: vec!["adm".to_owned(), "group".to_owned()],
        });
        request_round_trip(RequestBody::Open { fid: 2, mode: ORDWR });
        request_round_trip(RequestBody::Openfd { fid: 2, mode: OREAD });
        request_round_trip(RequestBody::Create {
            fid: 2,
            name: "file1".to_owned(),
            perm: 0o664,
            mode: OWRITE,
        });
        request_round_trip(RequestBody::Read {
            fid: 2,
            offset: 128,
            count: 4096,
        });
        request_round_trip(RequestBody::Write {
            fid: 2,
            offset: 0,
            data: b"hello planet go".to_vec(),
        });
        request_round_trip(RequestBody::Clunk { fid: 2 });
        request_round_trip(RequestBody::Remove { fid: 2 });
        request_round_trip(RequestBody::Stat { fid: 2 });
        request_round_trip(RequestBody::Wstat {
            fid: 2,
            stat: Stat::unchanged().to_bytes(),
        });
    }

    #[test]
    fn response_frames_round_trip() {
        let qid = Qid {
            ty: QTFILE,
            vers: 3,
            path: 17,
        };
        response_round_trip(ResponseBody::Version {
            msize: MSIZE,
            version: VERSION.to_owned(),
        });
        response_round_trip(ResponseBody::Auth { aqid: qid });
        response_round_trip(ResponseBody::Error {
            ename: "permission denied".to_owned(),
        });
        response_round_trip(ResponseBody::Attach { qid });
        response_round_trip(ResponseBody::Flush);
        response_round_trip(ResponseBody::Walk {
            wqids: vec![qid, qid],
        });
        response_round_trip(ResponseBody::Open { qid, iounit: IOUNIT });
        response_round_trip(ResponseBody::Openfd {
            qid,
            iounit: IOUNIT,
            unixfd: 5,
        });
        response_round_trip(ResponseBody::Create { qid, iounit: IOUNIT });
        response_round_trip(ResponseBody::Read {
            data: b"sxxxghjk".to_vec(),
        });
        response_round_trip(ResponseBody::Write { count: 21 });
        response_round_trip(ResponseBody::Clunk);
        response_round_trip(ResponseBody::Remove);
        response_round_trip(ResponseBody::Stat {
            stat: Stat::unchanged().to_bytes(),
        });
        response_round_trip(ResponseBody::Wstat);
    }

    #[test]
    fn stat_records_round_trip() {
        let stat = Stat {
            typ: 0,
            dev: 0,
            qid: Qid {
                ty: QTDIR,
                vers: 0,
                path: 1,
            },
            mode: DMDIR | 0o770,
            atime: 1_700_000_000,
            mtime: 1_700_000_001,
            length: 0,
            name: "adm".to_owned(),
            uid: "adm".to_owned(),
            gid: "adm".to_owned(),
            muid: "adm".to_owned(),
        };
        let bytes = stat.to_bytes();
        assert_eq!(Stat::from_bytes(&bytes).expect("decode stat"), stat);

        let mut listing = bytes.clone();
        listing.extend_from_slice(&bytes);
        let entries = Stat::parse_list(&listing).expect("decode listing");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], stat);
    }

    #[test]
    fn detect_truncated_frames() {
        let mut frame = encode_request(&Request {
            tag: 1,
            body: RequestBody::Clunk { fid: 9 },
        });
        frame.truncate(3);
        assert!(matches!(
            decode_request(&frame),
            Err(WireError::Truncated)
        ));
    }

    #[test]
    fn detect_length_mismatch() {
        let mut frame = encode_request(&Request {
            tag: 1,
            body: RequestBody::Clunk { fid: 9 },
        });
        frame.push(0);
        assert!(matches!(
            decode_request(&frame),
            Err(WireError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn reject_unknown_message_type() {
        let mut frame = encode_request(&Request {
            tag: 1,
            body: RequestBody::Clunk { fid: 9 },
        });
        frame[4] = 96;
        assert!(matches!(
            decode_request(&frame),
            Err(WireError::Unsupported(96))
        ));
    }

    #[test]
    fn reject_invalid_utf8_strings() {
        let mut frame = encode_request(&Request {
            tag: 1,
            body: RequestBody::Attach {
                fid: 1,
                afid: NOFID,
                uname: "ab".to_owned(),
                aname: String::new(),
            },
        });
        let len = frame.len();
        // The uname bytes sit just before the empty aname field.
        frame[len - 4] = 0xfe;
        frame[len - 3] = 0xff;
        assert!(matches!(
            decode_request(&frame),
            Err(WireError::InvalidUtf8)
        ));
    }

    #[test]
    fn stream_helpers_round_trip() {
        let request = Request {
            tag: 5,
            body: RequestBody::Read {
                fid: 1,
                offset: 0,
                count: 64,
            },
        };
        let mut buf = Vec::new();
        write_request(&mut buf, &request).expect("write request");
        let mut reader = buf.as_slice();
        assert_eq!(read_request(&mut reader).expect("read request"), request);

        let response = Response {
            tag: 5,
            body: ResponseBody::Read {
                data: b"abc".to_vec(),
            },
        };
        let mut buf = Vec::new();
        write_response(&mut buf, &response).expect("write response");
        let mut reader = buf.as_slice();
        assert_eq!(read_response(&mut reader).expect("read response"), response);
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MSIZE + 1).to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        let mut reader = buf.as_slice();
        assert!(matches!(
            read_request(&mut reader),
            Err(WireError::FrameTooLarge)
        ));
    }
}
