// Author: Lukas Bower
// Purpose: Public surface of the nine-vault 9P2000 wire codec.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Frame codec for the 9P2000 protocol.
//!
//! The crate owns the protocol data model (messages, qids, stat records,
//! limits) and the little-endian framing used on a byte stream. Servers read
//! [`Request`] frames and write [`Response`] frames; clients use the duals.
//! Nothing in here knows about the file tree being served.

mod codec;
mod types;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response,
};
pub use types::*;
