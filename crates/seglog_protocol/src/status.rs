//! Call status carried by error responses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure classes a client can tell apart.
///
/// Only the first three are produced by specific conditions; every other
/// failure inside the server collapses to `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// No record at the requested offset.
    OutOfRange,
    /// The subject may not perform the action.
    PermissionDenied,
    /// The connection carries no verified subject.
    Unauthenticated,
    /// The request was malformed or arrived at the wrong time.
    InvalidArgument,
    /// Any other failure.
    Internal,
}

impl StatusCode {
    /// Returns the code name.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::OutOfRange => "out_of_range",
            StatusCode::PermissionDenied => "permission_denied",
            StatusCode::Unauthenticated => "unauthenticated",
            StatusCode::InvalidArgument => "invalid_argument",
            StatusCode::Internal => "internal",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call: code plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Failure class.
    pub code: StatusCode,
    /// Description for humans; not meant to be parsed.
    pub message: String,
}

impl Status {
    /// Creates a status.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let status = Status::new(StatusCode::PermissionDenied, "bob may not produce");
        assert_eq!(status.to_string(), "permission_denied: bob may not produce");
    }
}
