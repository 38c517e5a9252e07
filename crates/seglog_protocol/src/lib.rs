//! # seglog protocol
//!
//! Wire messages for the seglog access layer.
//!
//! This crate provides:
//! - [`Record`] and the unary request/response pairs
//! - [`Request`] / [`Response`] frames, including stream control
//! - [`Status`] / [`StatusCode`] for client-distinguishable failures
//! - CBOR encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations. Transports carry
//! each encoded message in one length-delimited frame.
//!
//! ## Conversation
//!
//! ```text
//! client                                server
//!   │── Hello{token} ─────────────────────▶│
//!   │◀──────────────────── HelloOk{subject}│
//!   │── Produce{record} ──────────────────▶│
//!   │◀───────────────────── Produced{offset}│
//!   │── ConsumeStream{offset} ────────────▶│
//!   │◀──────────────────── Consumed{record}│  (repeats)
//!   │── Cancel ───────────────────────────▶│
//!   │◀─────────────────────────── StreamEnd│
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod messages;
mod status;

pub use codec::{decode, encode};
pub use error::{CodecError, CodecResult};
pub use messages::{
    ConsumeRequest, ConsumeResponse, ProduceRequest, ProduceResponse, Record, Request, Response,
};
pub use status::{Status, StatusCode};

/// Protocol version carried in `Hello`.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default upper bound on one encoded frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;
