#![forbid(unsafe_code)]
//! Zero-copy 9P2000 protocol codec with the 9P2000.e extension.
//!
//! This crate frames, parses and builds messages of the Plan 9 file
//! protocol. It speaks the base 9P2000 message set plus the Erlang
//! extension (session re-establishment and single-request short
//! read/write), and it does no I/O of its own: decoding operates on a
//! borrowed byte buffer and encoding writes into a caller-provided one.
//! Transports, tag-based request/response correlation and filesystem
//! semantics live above this crate.
//!
//! # Overview
//!
//! A connection owns one [`Parser`] holding the negotiated protocol version
//! and maximum message size. Incoming bytes pass through
//! [`Parser::parse_header`], which validates the seven-byte frame header
//! against the negotiated limits, and then through
//! [`Parser::parse_request`] or [`Parser::parse_response`], which decode
//! the payload into a typed [`Request`] or [`Response`] variant.
//! [`Parser::next_frame`] carves complete frames out of a concatenated
//! stream first, for callers that buffer more than one message at a time.
//!
//! Outgoing messages are built with [`write_request`] and
//! [`write_response`], or field by field with [`writer::MessageWriter`];
//! either way a provisional header is written first and its size field is
//! back-patched when the message is finished. Directory read payloads are
//! produced by [`writer::DirListingWriter`], which windows a sequence of
//! [`Stat`] records by the client's `(offset, count)`.
//!
//! # Zero-copy decoding
//!
//! Decoded messages borrow every string and data field from the input
//! buffer. The buffer must outlive the message, and must not be mutated or
//! reused while the message is in use; the borrow checker enforces both.
//! Parsing a payload allocates nothing for its variable-length fields.
//!
//! # Example
//!
//! ```
//! use p92000e::{Decoder, Encoder, Parser, Request, NOTAG};
//!
//! // A client proposes a version and maximum message size...
//! let mut buf = [0u8; 128];
//! let mut enc = Encoder::new(&mut buf);
//! let request = Request::Version {
//!     msize: 8192,
//!     version: "9P2000.e",
//! };
//! p92000e::write_request(&mut enc, NOTAG, &request)?;
//!
//! // ...and the server parses the frame without copying the payload.
//! let parser = Parser::default();
//! let mut dec = Decoder::new(enc.written());
//! let header = parser.parse_header(&mut dec)?;
//! assert_eq!(parser.parse_request(header, &mut dec)?, request);
//! # Ok::<(), p92000e::Error>(())
//! ```
//!
//! # Errors
//!
//! All decode entry points return the closed [`Error`] taxonomy; a framing
//! error is terminal for the current frame and recovery is the transport's
//! concern. Writers report an undersized output buffer as
//! [`Error::BufferTooSmall`] and never synthesize protocol errors.

pub mod error;
pub mod fcall;
#[macro_use]
pub mod serialize;
pub mod parser;
pub mod writer;

pub use crate::error::{Error, Result};
pub use crate::fcall::*;
pub use crate::parser::Parser;
pub use crate::serialize::{Decodable, Decoder, Encodable, Encoder};
pub use crate::writer::{write_request, write_response, DirListingWriter, MessageWriter};
