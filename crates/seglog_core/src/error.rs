//! Error types for the commit log.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in commit log operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store or index error.
    #[error("storage error: {0}")]
    Storage(#[from] seglog_storage::StorageError),

    /// I/O error outside a store or index.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No segment covers the requested offset.
    #[error("offset {offset} out of range [{lowest}, {next})")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
        /// Lowest offset still held by the log.
        lowest: u64,
        /// The offset the next append will receive.
        next: u64,
    },

    /// The configuration is unusable.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The log directory holds something unexpected.
    #[error("invalid log format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the log directory.
    #[error("log locked: another process has exclusive access")]
    LogLocked,
}

impl CoreError {
    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if no segment covered the requested offset.
    ///
    /// Only the log-level condition counts; a segment-level index miss
    /// surfaces as a storage error.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OffsetOutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_storage::StorageError;

    #[test]
    fn out_of_range_classification() {
        let log_level = CoreError::OffsetOutOfRange {
            offset: 9,
            lowest: 0,
            next: 2,
        };
        assert!(log_level.is_out_of_range());

        let index_level = CoreError::from(StorageError::IndexOutOfRange {
            entry: 9,
            entries: 2,
        });
        assert!(!index_level.is_out_of_range());
    }

    #[test]
    fn error_display() {
        let err = CoreError::OffsetOutOfRange {
            offset: 7,
            lowest: 2,
            next: 5,
        };
        assert_eq!(err.to_string(), "offset 7 out of range [2, 5)");
    }
}
