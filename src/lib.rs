// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Public surface of the nine-vault in-memory 9P2000 file server.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! nine-vault implements a 9P2000 file server keeping all files in memory.
//!
//! A 9P2000 server is an agent that provides one or more hierarchical file
//! systems, called file trees, that may be accessed by processes. A server
//! responds to requests by clients to navigate the hierarchy, and to create,
//! remove, read, and write files.
//!
//! The filesystem is entirely maintained in memory, no external storage is
//! used. File data is allocated in 2 MiB blocks. The root of the filesystem
//! is owned by the host owner and carries mode 0755; the server seeds
//! `/adm/ctl`, `/adm/group` and `/<hostowner>` at start-up.
//!
//! [`Fsys::new`] builds the tree, [`Fsys::listen`] serves it over a stream
//! network, and the synthetic `/adm` files administer users and listeners
//! at run time.

use thiserror::Error;

mod command;
mod conn;
mod ctl;
mod fid;
mod file;
mod fsys;
mod group;
mod node;
mod server;

pub use fid::Fid;
pub use fsys::{FsListener, Fsys};

pub use ninevault_wire::{
    DMAPPEND, DMAUTH, DMDIR, DMEXCL, DMEXEC, DMREAD, DMTMP, DMWRITE, IOUNIT, MSIZE, OEXEC,
    ORCLOSE, ORDWR, OREAD, OTRUNC, OWRITE, QTAPPEND, QTAUTH, QTDIR, QTEXCL, QTFILE, QTTMP,
};

/// Size in bytes of a file-buffer block.
pub const BLOCK_SIZE: u64 = 2 * 1024 * 1024;

/// Errors surfaced by filesystem operations.
///
/// The rendered message is exactly the diagnostic string carried to clients
/// in `Rerror` replies; failures never tear down a connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    /// Read past the end of a file.
    #[error("EOF")]
    EndOfFile,
    /// The named file is not present in its directory.
    #[error("file does not exist")]
    NotExist,
    /// The named user is not in the group database.
    #[error("user {0} not found")]
    UserNotFound(String),
    /// The named group is not in the group database.
    #[error("group {0} not found")]
    GroupNotFound(String),
    /// An entry with that name already exists.
    #[error("file exists")]
    FileExists,
    /// The user is already in the group database.
    #[error("user {0} exists")]
    UserExists(String),
    /// Byte I/O was attempted on a directory.
    #[error("is a directory")]
    IsDirectory,
    /// A directory operation was attempted on a plain file.
    #[error("not a directory")]
    NotDirectory,
    /// The caller lacks permission for the operation.
    #[error("permission denied")]
    Permission,
    /// The operation is reserved to the owner or group leader.
    #[error("not owner")]
    NotOwner,
    /// A directory must be empty before it can be removed.
    #[error("directory not empty")]
    DirectoryNotEmpty,
    /// `.` and `..` cannot be created.
    #[error("illegal name")]
    IllegalName,
    /// An exclusive-use file is already open elsewhere.
    #[error("exclusive use file already open")]
    Exclusive,
    /// A walk request carried more than the permitted number of names.
    #[error("too many names in walk")]
    WalkLimit,
    /// A command argument exceeded 64 bytes.
    #[error("argument too long")]
    ArgumentTooLong,
    /// A command carried more than 64 arguments.
    #[error("too many arguments")]
    TooManyArguments,
    /// The message type is not part of the protocol surface served here.
    #[error("bad fcall")]
    BadFcall,
    /// The proposed msize cannot hold the I/O header.
    #[error("msize too small")]
    MsizeTooSmall,
    /// A command write carried no command name.
    #[error("command name missing")]
    CommandNameMissing,
    /// The named command is not understood.
    #[error("invalid command {0}")]
    UnknownCommand(String),
    /// The command arguments do not form a recognised request.
    #[error("invalid command")]
    InvalidCommand,
    /// The named command takes exactly two arguments.
    #[error("{0} requires 2 arguments")]
    RequiresTwoArgs(&'static str),
    /// The fid is already open for I/O.
    #[error("file already open for I/O")]
    AlreadyOpen,
    /// The fid has not been opened for I/O.
    #[error("file not open for I/O")]
    NotOpen,
    /// This server declines the authentication protocol.
    #[error("authentication not required")]
    AuthNotRequired,
    /// The path-id allocator is exhausted.
    #[error("out of paths")]
    OutOfPaths,
    /// The connection-id allocator is exhausted.
    #[error("max connection reached")]
    MaxConnReached,
    /// Only stream networks are served.
    #[error("unknown network {0}")]
    UnknownNetwork(String),
    /// The control file cannot be read.
    #[error("reading ctl file")]
    CtlRead,
    /// A wstat request carried an unparseable stat record.
    #[error("malformed stat")]
    MalformedStat,
    /// The server work queue is gone; the process is shutting down.
    #[error("server shutdown")]
    Shutdown,
    /// Listener or socket failure, reported with the OS diagnostic.
    #[error("{0}")]
    Transport(String),
}
