//! The record type returned by reads.

/// An opaque payload and the offset the log assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The payload bytes, exactly as appended.
    pub value: Vec<u8>,
    /// The offset assigned at append time.
    pub offset: u64,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub fn new(value: Vec<u8>, offset: u64) -> Self {
        Self { value, offset }
    }
}
