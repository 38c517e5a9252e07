//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store and index operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The index has no capacity for even a single entry.
    #[error("index not initialized")]
    NotInitialized,

    /// Attempted to read an index entry that was never written.
    #[error("index entry {entry} out of range ({entries} entries written)")]
    IndexOutOfRange {
        /// The requested entry number.
        entry: u64,
        /// Number of entries currently in the index.
        entries: u64,
    },

    /// Attempted to write past the pre-sized index capacity.
    #[error("index full: capacity {capacity} bytes")]
    IndexFull {
        /// The index capacity in bytes.
        capacity: u64,
    },

    /// The file contents do not match the expected format.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The file has been closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Returns true if an index position was out of range: a read past the
    /// last entry, or a write past the capacity.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfRange { .. } | Self::IndexFull { .. }
        )
    }
}
