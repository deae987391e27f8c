// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define 9P2000 wire types, mode bits and protocol constants.
// Author: Lukas Bower

//! 9P2000 data model shared by the codec and the file server.

use std::fmt;
use std::io;

use thiserror::Error;

/// Protocol version string carried by `Tversion`/`Rversion`.
pub const VERSION: &str = "9P2000";

/// Size in bytes of the fixed 9P I/O header, used when negotiating `msize`.
pub const IOHDRSZ: u32 = 24;

/// Maximum message size offered by the server.
pub const MSIZE: u32 = 128 * 1024 + IOHDRSZ;

/// Largest I/O payload the server guarantees to transfer atomically.
pub const IOUNIT: u32 = 128 * 1024;

/// Sentinel fid value meaning "no fid supplied".
pub const NOFID: u32 = !0;

/// Sentinel tag value meaning "no tag".
pub const NOTAG: u16 = !0;

/// Maximum number of path elements in a single walk request.
pub const MAXWELEM: usize = 16;

/// Maximum size of a marshalled stat record.
pub const STATMAX: u32 = 65535;

/// Qid type bit flagging a directory.
pub const QTDIR: u8 = 0x80;
/// Qid type bit flagging an append-only file.
pub const QTAPPEND: u8 = 0x40;
/// Qid type bit flagging an exclusive-use file.
pub const QTEXCL: u8 = 0x20;
/// Qid type bit flagging an authentication file.
pub const QTAUTH: u8 = 0x08;
/// Qid type bit flagging a non-backed-up (temporary) file.
pub const QTTMP: u8 = 0x04;
/// Qid type of a plain file.
pub const QTFILE: u8 = 0x00;

/// Mode bit flagging a directory.
pub const DMDIR: u32 = 0x8000_0000;
/// Mode bit flagging an append-only file.
pub const DMAPPEND: u32 = 0x4000_0000;
/// Mode bit flagging an exclusive-use file.
pub const DMEXCL: u32 = 0x2000_0000;
/// Mode bit flagging an authentication file.
pub const DMAUTH: u32 = 0x0800_0000;
/// Mode bit flagging a non-backed-up (temporary) file.
pub const DMTMP: u32 = 0x0400_0000;
/// Permission bit for read access.
pub const DMREAD: u32 = 0x4;
/// Permission bit for write access.
pub const DMWRITE: u32 = 0x2;
/// Permission bit for execute access.
pub const DMEXEC: u32 = 0x1;

/// Open for reading.
pub const OREAD: u8 = 0;
/// Open for writing.
pub const OWRITE: u8 = 1;
/// Open for reading and writing.
pub const ORDWR: u8 = 2;
/// Open for execution; read access checked against the execute bit.
pub const OEXEC: u8 = 3;
/// Truncate the file before I/O; requires write permission.
pub const OTRUNC: u8 = 0x10;
/// Remove the file when the fid is clunked.
pub const ORCLOSE: u8 = 0x40;

/// Errors produced while framing or parsing 9P2000 messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying stream failure.
    #[error("{0}")]
    Io(#[from] io::Error),
    /// Frame or field shorter than its declared length.
    #[error("truncated frame")]
    Truncated,
    /// Declared frame size does not match the bytes available.
    #[error("length mismatch: declared {declared} actual {actual}")]
    LengthMismatch {
        /// Size declared in the frame header.
        declared: u32,
        /// Bytes actually present.
        actual: usize,
    },
    /// Unknown message type code.
    #[error("unsupported message type {0}")]
    Unsupported(u8),
    /// String field held invalid UTF-8.
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
    /// Declared frame size exceeds the protocol maximum.
    #[error("frame exceeds maximum message size")]
    FrameTooLarge,
}

/// Server-unique file identity: `(type, version, path)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qid {
    /// `QT*` type bits, derived from the high byte of the mode word.
    pub ty: u8,
    /// Version number, bumped on every write to a non-temporary file.
    pub vers: u32,
    /// Stable 64-bit path id, unique within the server.
    pub path: u64,
}

/// Machine-independent directory entry as carried by `Rstat`, `Twstat` and
/// directory reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Server type; unused by this implementation.
    pub typ: u16,
    /// Server subtype; unused by this implementation.
    pub dev: u32,
    /// File identity.
    pub qid: Qid,
    /// Permission and mode bits.
    pub mode: u32,
    /// Last access time, seconds since the epoch.
    pub atime: u32,
    /// Last modification time, seconds since the epoch.
    pub mtime: u32,
    /// File length in bytes.
    pub length: u64,
    /// Last element of the path.
    pub name: String,
    /// Owner name.
    pub uid: String,
    /// Group name.
    pub gid: String,
    /// Name of the user who last modified the file.
    pub muid: String,
}

impl Stat {
    /// A wstat request template with every field set to its "leave
    /// unchanged" sentinel.
    #[must_use]
    pub fn unchanged() -> Self {
        Self {
            typ: !0,
            dev: !0,
            qid: Qid {
                ty: !0,
                vers: !0,
                path: !0,
            },
            mode: !0,
            atime: !0,
            mtime: !0,
            length: !0,
            name: String::new(),
            uid: String::new(),
            gid: String::new(),
            muid: String::new(),
        }
    }
}

/// Request envelope: client-chosen tag plus the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Transaction identifier, echoed back by the response.
    pub tag: u16,
    /// The concrete T-message.
    pub body: RequestBody,
}

/// The T-messages of 9P2000.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `Tversion` negotiates the maximum message size and protocol version.
    Version {
        /// Client's proposed maximum message size.
        msize: u32,
        /// Client's proposed protocol version.
        version: String,
    },
    /// `Tauth` requests an authentication file; this server declines it.
    Auth {
        /// Fid to associate with the authentication exchange.
        afid: u32,
        /// User seeking to authenticate.
        uname: String,
        /// File tree to access.
        aname: String,
    },
    /// `Tattach` binds a fid to the root of a file tree.
    Attach {
        /// Fid chosen by the client for the root.
        fid: u32,
        /// Authentication fid; must be [`NOFID`] here.
        afid: u32,
        /// User on whose behalf the attach runs.
        uname: String,
        /// Name of the file tree to attach to.
        aname: String,
    },
    /// `Tflush` asks to abort an outstanding request.
    Flush {
        /// Tag of the request to abort.
        oldtag: u16,
    },
    /// `Twalk` traverses path elements from `fid` into `newfid`.
    Walk {
        /// Fid to walk from.
        fid: u32,
        /// Fid that will refer to the walk result.
        newfid: u32,
        /// Path elements to traverse, at most [`MAXWELEM`].
        wnames: Vec<String>,
    },
    /// `Topen` prepares a fid for I/O.
    Open {
        /// Fid to open.
        fid: u32,
        /// `O*` open mode bits.
        mode: u8,
    },
    /// `Topenfd`, a Plan 9 extension this server answers with "bad fcall".
    Openfd {
        /// Fid to open.
        fid: u32,
        /// `O*` open mode bits.
        mode: u8,
    },
    /// `Tcreate` creates a file in the directory the fid refers to.
    Create {
        /// Fid referring to the parent directory; moves to the new file.
        fid: u32,
        /// Name of the new file.
        name: String,
        /// Requested permissions, adjusted against the parent.
        perm: u32,
        /// `O*` open mode bits for the implicit open.
        mode: u8,
    },
    /// `Tread` reads bytes from an opened fid.
    Read {
        /// Fid to read from.
        fid: u32,
        /// Byte offset into the file.
        offset: u64,
        /// Number of bytes requested.
        count: u32,
    },
    /// `Twrite` writes bytes to an opened fid.
    Write {
        /// Fid to write to.
        fid: u32,
        /// Byte offset into the file.
        offset: u64,
        /// Payload to record.
        data: Vec<u8>,
    },
    /// `Tclunk` releases a fid.
    Clunk {
        /// Fid to release.
        fid: u32,
    },
    /// `Tremove` removes the file and clunks the fid.
    Remove {
        /// Fid referring to the file to remove.
        fid: u32,
    },
    /// `Tstat` requests the directory entry for a fid.
    Stat {
        /// Fid to inspect.
        fid: u32,
    },
    /// `Twstat` applies a batched metadata change.
    Wstat {
        /// Fid to modify.
        fid: u32,
        /// Marshalled [`Stat`] record with sentinel fields left unchanged.
        stat: Vec<u8>,
    },
}

impl RequestBody {
    /// The fid this message operates on, if it carries one.
    #[must_use]
    pub fn fid(&self) -> Option<u32> {
        match self {
            RequestBody::Version { .. } | RequestBody::Auth { .. } | RequestBody::Flush { .. } => {
                None
            }
            RequestBody::Attach { fid, .. }
            | RequestBody::Walk { fid, .. }
            | RequestBody::Open { fid, .. }
            | RequestBody::Openfd { fid, .. }
            | RequestBody::Create { fid, .. }
            | RequestBody::Read { fid, .. }
            | RequestBody::Write { fid, .. }
            | RequestBody::Clunk { fid }
            | RequestBody::Remove { fid }
            | RequestBody::Stat { fid }
            | RequestBody::Wstat { fid, .. } => Some(*fid),
        }
    }
}

/// Response envelope: the request's tag plus the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Tag of the request being answered.
    pub tag: u16,
    /// The concrete R-message.
    pub body: ResponseBody,
}

/// The R-messages of 9P2000.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Reply to `Tversion`.
    Version {
        /// Negotiated maximum message size.
        msize: u32,
        /// Negotiated protocol version.
        version: String,
    },
    /// Reply to `Tauth`.
    Auth {
        /// Qid of the authentication file.
        aqid: Qid,
    },
    /// Error reply for any failed request.
    Error {
        /// Short diagnostic string.
        ename: String,
    },
    /// Reply to `Tattach`.
    Attach {
        /// Qid of the attached root.
        qid: Qid,
    },
    /// Reply to `Tflush`.
    Flush,
    /// Reply to `Twalk`.
    Walk {
        /// Qid of each element successfully walked.
        wqids: Vec<Qid>,
    },
    /// Reply to `Topen`.
    Open {
        /// Qid of the opened file.
        qid: Qid,
        /// Suggested atomic I/O unit.
        iounit: u32,
    },
    /// Reply to `Topenfd`.
    Openfd {
        /// Qid of the opened file.
        qid: Qid,
        /// Suggested atomic I/O unit.
        iounit: u32,
        /// File descriptor passed out of band.
        unixfd: u32,
    },
    /// Reply to `Tcreate`.
    Create {
        /// Qid of the created file.
        qid: Qid,
        /// Suggested atomic I/O unit.
        iounit: u32,
    },
    /// Reply to `Tread`.
    Read {
        /// Bytes read.
        data: Vec<u8>,
    },
    /// Reply to `Twrite`.
    Write {
        /// Number of bytes recorded.
        count: u32,
    },
    /// Reply to `Tclunk`.
    Clunk,
    /// Reply to `Tremove`.
    Remove,
    /// Reply to `Tstat`.
    Stat {
        /// Marshalled [`Stat`] record.
        stat: Vec<u8>,
    },
    /// Reply to `Twstat`.
    Wstat,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag;
        match &self.body {
            RequestBody::Version { msize, version } => {
                write!(f, "Tversion tag={tag} msize={msize} version={version:?}")
            }
            RequestBody::Auth { afid, uname, aname } => {
                write!(f, "Tauth tag={tag} afid={afid} uname={uname:?} aname={aname:?}")
            }
            RequestBody::Attach {
                fid,
                afid,
                uname,
                aname,
            } => write!(
                f,
                "Tattach tag={tag} fid={fid} afid={afid} uname={uname:?} aname={aname:?}"
            ),
            RequestBody::Flush { oldtag } => write!(f, "Tflush tag={tag} oldtag={oldtag}"),
            RequestBody::Walk {
                fid,
                newfid,
                wnames,
            } => write!(
                f,
                "Twalk tag={tag} fid={fid} newfid={newfid} wnames={wnames:?}"
            ),
            RequestBody::Open { fid, mode } => {
                write!(f, "Topen tag={tag} fid={fid} mode={mode:#x}")
            }
            RequestBody::Openfd { fid, mode } => {
                write!(f, "Topenfd tag={tag} fid={fid} mode={mode:#x}")
            }
            RequestBody::Create {
                fid,
                name,
                perm,
                mode,
            } => write!(
                f,
                "Tcreate tag={tag} fid={fid} name={name:?} perm={perm:#o} mode={mode:#x}"
            ),
            RequestBody::Read { fid, offset, count } => {
                write!(f, "Tread tag={tag} fid={fid} offset={offset} count={count}")
            }
            RequestBody::Write { fid, offset, data } => write!(
                f,
                "Twrite tag={tag} fid={fid} offset={offset} count={}",
                data.len()
            ),
            RequestBody::Clunk { fid } => write!(f, "Tclunk tag={tag} fid={fid}"),
            RequestBody::Remove { fid } => write!(f, "Tremove tag={tag} fid={fid}"),
            RequestBody::Stat { fid } => write!(f, "Tstat tag={tag} fid={fid}"),
            RequestBody::Wstat { fid, stat } => {
                write!(f, "Twstat tag={tag} fid={fid} nstat={}", stat.len())
            }
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag;
        match &self.body {
            ResponseBody::Version { msize, version } => {
                write!(f, "Rversion tag={tag} msize={msize} version={version:?}")
            }
            ResponseBody::Auth { aqid } => write!(f, "Rauth tag={tag} aqid={aqid:?}"),
            ResponseBody::Error { ename } => write!(f, "Rerror tag={tag} ename={ename:?}"),
            ResponseBody::Attach { qid } => write!(f, "Rattach tag={tag} qid={qid:?}"),
            ResponseBody::Flush => write!(f, "Rflush tag={tag}"),
            ResponseBody::Walk { wqids } => {
                write!(f, "Rwalk tag={tag} nwqid={}", wqids.len())
            }
            ResponseBody::Open { qid, iounit } => {
                write!(f, "Ropen tag={tag} qid={qid:?} iounit={iounit}")
            }
            ResponseBody::Openfd {
                qid,
                iounit,
                unixfd,
            } => write!(
                f,
                "Ropenfd tag={tag} qid={qid:?} iounit={iounit} unixfd={unixfd}"
            ),
            ResponseBody::Create { qid, iounit } => {
                write!(f, "Rcreate tag={tag} qid={qid:?} iounit={iounit}")
            }
            ResponseBody::Read { data } => write!(f, "Rread tag={tag} count={}", data.len()),
            ResponseBody::Write { count } => write!(f, "Rwrite tag={tag} count={count}"),
            ResponseBody::Clunk => write!(f, "Rclunk tag={tag}"),
            ResponseBody::Remove => write!(f, "Rremove tag={tag}"),
            ResponseBody::Stat { stat } => write!(f, "Rstat tag={tag} nstat={}", stat.len()),
            ResponseBody::Wstat => write!(f, "Rwstat tag={tag}"),
        }
    }
}
