//! Protocol messages.

use crate::codec::{decode, encode};
use crate::error::CodecResult;
use crate::status::Status;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A record as it travels on the wire.
///
/// `offset` is ignored on produce; the log assigns it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Opaque payload.
    pub value: Bytes,
    /// Offset assigned by the log.
    pub offset: u64,
}

impl Record {
    /// Creates a record with the given payload and offset.
    pub fn new(value: impl Into<Bytes>, offset: u64) -> Self {
        Self {
            value: value.into(),
            offset,
        }
    }

    /// Creates a record to be produced; the log assigns the offset.
    pub fn unassigned(value: impl Into<Bytes>) -> Self {
        Self::new(value, 0)
    }
}

/// Append one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceRequest {
    /// The record to append.
    pub record: Record,
}

/// Offset assigned to a produced record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceResponse {
    /// The assigned offset.
    pub offset: u64,
}

/// Read one record, or start a consume stream, at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeRequest {
    /// Offset to read.
    pub offset: u64,
}

/// A record returned by consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeResponse {
    /// The record at the requested offset.
    pub record: Record,
}

/// A client-to-server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Presents a signed subject token. Must precede any call.
    Hello {
        /// Protocol version the client speaks.
        protocol_version: u16,
        /// Signed subject token.
        token: Bytes,
    },
    /// Unary produce.
    Produce(ProduceRequest),
    /// Unary consume.
    Consume(ConsumeRequest),
    /// Opens a produce stream; records follow as `StreamRecord`.
    ProduceStream,
    /// Opens a consume stream starting at the given offset.
    ConsumeStream(ConsumeRequest),
    /// One record of an open produce stream.
    StreamRecord(ProduceRequest),
    /// Ends an open produce stream.
    EndStream,
    /// Cancels an open consume stream.
    Cancel,
}

/// A server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The token was accepted.
    HelloOk {
        /// Verified subject bound to the connection.
        subject: String,
    },
    /// Offset for a unary produce or one produce stream record.
    Produced(ProduceResponse),
    /// Record for a unary consume or one consume stream item.
    Consumed(ConsumeResponse),
    /// The open stream finished cleanly.
    StreamEnd,
    /// The call (or open stream) failed.
    Error(Status),
}

impl Request {
    /// Returns a short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Hello { .. } => "hello",
            Request::Produce(_) => "produce",
            Request::Consume(_) => "consume",
            Request::ProduceStream => "produce_stream",
            Request::ConsumeStream(_) => "consume_stream",
            Request::StreamRecord(_) => "stream_record",
            Request::EndStream => "end_stream",
            Request::Cancel => "cancel",
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode(bytes)
    }
}

impl Response {
    /// Returns true if this frame reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode(bytes)
    }
}

impl From<Status> for Response {
    fn from(status: Status) -> Self {
        Response::Error(status)
    }
}
