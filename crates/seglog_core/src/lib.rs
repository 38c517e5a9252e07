//! # seglog core
//!
//! The commit log engine.
//!
//! This crate provides:
//! - [`Config`] - rotation thresholds, initial offset, index entry width
//! - [`Segment`] - one store plus one index sharing a base offset
//! - [`Log`] - the ordered set of segments, offset routing, and rotation
//!
//! ## Directory Layout
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ 0.store           # Segment with base offset 0
//! ├─ 0.index
//! ├─ 1024.store        # Segment with base offset 1024
//! └─ 1024.index
//! ```
//!
//! ## Example
//!
//! ```rust
//! use seglog_core::{Config, Log};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let log = Log::open(dir.path(), Config::default()).unwrap();
//!
//! let offset = log.append(b"hello").unwrap();
//! assert_eq!(log.read(offset).unwrap().value, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod log;
mod record;
mod segment;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use log::Log;
pub use record::Record;
pub use segment::{Segment, SegmentInfo};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
