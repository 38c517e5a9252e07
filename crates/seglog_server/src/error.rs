//! Error types for the access layer.

use seglog_core::CoreError;
use seglog_protocol::{CodecError, Status, StatusCode};
use thiserror::Error;

use crate::auth::Action;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the access layer.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The connection carries no verified subject.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The authorizer denied the call.
    #[error("{subject} not permitted to {action} on *")]
    PermissionDenied {
        /// Subject that was denied.
        subject: String,
        /// Action that was attempted.
        action: Action,
    },

    /// No record at the requested offset.
    #[error("offset out of range: {offset}")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
    },

    /// Any other log failure.
    #[error("log error: {0}")]
    Log(CoreError),

    /// A frame arrived that is not valid at this point of the conversation.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An access policy could not be parsed.
    #[error("invalid policy at line {line}: {message}")]
    InvalidPolicy {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OffsetOutOfRange { offset, .. } => ServerError::OffsetOutOfRange { offset },
            other => ServerError::Log(other),
        }
    }
}

impl ServerError {
    /// Returns the wire status code for this error.
    ///
    /// Out-of-range, permission and authentication failures stay distinct;
    /// protocol misuse is an invalid argument; everything else is internal.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::OffsetOutOfRange { .. } => StatusCode::OutOfRange,
            ServerError::PermissionDenied { .. } => StatusCode::PermissionDenied,
            ServerError::Unauthenticated(_) => StatusCode::Unauthenticated,
            ServerError::Protocol(_) | ServerError::Codec(_) => StatusCode::InvalidArgument,
            ServerError::Log(_)
            | ServerError::Io(_)
            | ServerError::InvalidPolicy { .. }
            | ServerError::ConnectionClosed
            | ServerError::Internal(_) => StatusCode::Internal,
        }
    }

    /// Converts to the status sent to the client.
    ///
    /// Internal failures are reported without detail.
    pub fn to_status(&self) -> Status {
        let code = self.status();
        let message = if code == StatusCode::Internal {
            "internal error".to_string()
        } else {
            self.to_string()
        };
        Status::new(code, message)
    }

    /// Returns true if this is a client error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::Unauthenticated(_)
                | ServerError::PermissionDenied { .. }
                | ServerError::OffsetOutOfRange { .. }
                | ServerError::Protocol(_)
                | ServerError::Codec(_)
        )
    }

    /// Returns true if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ServerError::Log(_)
                | ServerError::Io(_)
                | ServerError::InvalidPolicy { .. }
                | ServerError::Internal(_)
        )
    }
}
