//! # seglog storage
//!
//! File primitives for the seglog commit log.
//!
//! This crate provides the two files every segment is made of:
//!
//! - [`Store`] - an append-only file of length-prefixed payloads
//! - [`Index`] - a fixed-width table mapping relative offsets to store positions
//!
//! Neither type knows about offsets across segments, rotation, or the
//! network. Those live in `seglog_core` and `seglog_server`.
//!
//! ## Store Format
//!
//! ```text
//! | length (8, big-endian) | payload (length) | length (8) | payload | ...
//! ```
//!
//! ## Index Format
//!
//! ```text
//! | relative_offset (4, big-endian) | position (8, big-endian) | padding | ...
//! ```
//!
//! ## Example
//!
//! ```rust
//! use seglog_storage::Store;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = Store::open(&dir.path().join("0.store")).unwrap();
//! let position = store.append(b"hello world").unwrap();
//! assert_eq!(store.read(position).unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod store;

pub use error::{StorageError, StorageResult};
pub use index::{Index, IndexEntry, ENTRY_WIDTH, OFFSET_WIDTH, POSITION_WIDTH};
pub use store::{Store, LEN_WIDTH};
