//! Client for the log server.

use crate::frame::{framed, from_frame, to_frame, FramedConn};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use seglog_protocol::{
    CodecError, ConsumeRequest, ProduceRequest, Record, Request, Response, Status, StatusCode,
    DEFAULT_MAX_FRAME_BYTES, PROTOCOL_VERSION,
};
use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned to client callers.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error status.
    #[error("server returned {0}")]
    Status(Status),

    /// The server answered with a frame that does not fit the call.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection.
    #[error("connection closed")]
    ConnectionClosed,
}

impl ClientError {
    /// Returns the server status code, if the server sent one.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status(status) => Some(status.code),
            _ => None,
        }
    }

    /// Returns true if the server reported no record at the offset.
    pub fn is_out_of_range(&self) -> bool {
        self.code() == Some(StatusCode::OutOfRange)
    }
}

fn unexpected(response: &Response) -> ClientError {
    ClientError::UnexpectedResponse(format!("{response:?}"))
}

/// A connection to a log server.
///
/// Calls take `&mut self`: one call or stream at a time per connection.
pub struct LogClient {
    framed: FramedConn,
    subject: Option<String>,
}

impl LogClient {
    /// Connects and authenticates with `token`.
    ///
    /// `token` is the raw token; decode the hex printed by `seglog token`
    /// with [`decode_token_hex`](crate::decode_token_hex) first.
    ///
    /// # Errors
    ///
    /// Returns `Status` with `Unauthenticated` if the server rejects the
    /// token.
    pub async fn connect(addr: impl ToSocketAddrs, token: &[u8]) -> ClientResult<Self> {
        let mut client = Self::connect_unauthenticated(addr).await?;

        client
            .send(&Request::Hello {
                protocol_version: PROTOCOL_VERSION,
                token: Bytes::copy_from_slice(token),
            })
            .await?;

        match client.recv().await? {
            Response::HelloOk { subject } => {
                client.subject = Some(subject);
                Ok(client)
            }
            Response::Error(status) => Err(ClientError::Status(status)),
            other => Err(unexpected(&other)),
        }
    }

    /// Connects without presenting a token. Every call will fail
    /// `Unauthenticated`.
    pub async fn connect_unauthenticated(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: framed(stream, DEFAULT_MAX_FRAME_BYTES),
            subject: None,
        })
    }

    /// Returns the subject the server verified.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Appends one record and returns its offset.
    pub async fn produce(&mut self, value: impl Into<Bytes>) -> ClientResult<u64> {
        self.send(&Request::Produce(ProduceRequest {
            record: Record::unassigned(value),
        }))
        .await?;

        match self.recv().await? {
            Response::Produced(response) => Ok(response.offset),
            Response::Error(status) => Err(ClientError::Status(status)),
            other => Err(unexpected(&other)),
        }
    }

    /// Reads the record at `offset`.
    pub async fn consume(&mut self, offset: u64) -> ClientResult<Record> {
        self.send(&Request::Consume(ConsumeRequest { offset })).await?;

        match self.recv().await? {
            Response::Consumed(response) => Ok(response.record),
            Response::Error(status) => Err(ClientError::Status(status)),
            other => Err(unexpected(&other)),
        }
    }

    /// Opens a produce stream.
    pub async fn produce_stream(&mut self) -> ClientResult<ProduceStream<'_>> {
        self.send(&Request::ProduceStream).await?;
        Ok(ProduceStream {
            client: self,
            ended: false,
        })
    }

    /// Opens a consume stream starting at `offset`.
    pub async fn consume_stream(&mut self, offset: u64) -> ClientResult<ConsumeStream<'_>> {
        self.send(&Request::ConsumeStream(ConsumeRequest { offset }))
            .await?;
        Ok(ConsumeStream {
            client: self,
            ended: false,
        })
    }

    async fn send(&mut self, request: &Request) -> ClientResult<()> {
        self.framed.send(to_frame(request)?).await?;
        Ok(())
    }

    async fn recv(&mut self) -> ClientResult<Response> {
        let frame = self
            .framed
            .next()
            .await
            .ok_or(ClientError::ConnectionClosed)??;
        Ok(from_frame(&frame)?)
    }
}

impl std::fmt::Debug for LogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogClient")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// An open produce stream. Each `send` waits for its offset.
pub struct ProduceStream<'a> {
    client: &'a mut LogClient,
    ended: bool,
}

impl ProduceStream<'_> {
    /// Appends one record and returns its offset.
    ///
    /// A failure ends the stream on the server side.
    pub async fn send(&mut self, value: impl Into<Bytes>) -> ClientResult<u64> {
        if self.ended {
            return Err(ClientError::UnexpectedResponse("stream already ended".into()));
        }

        self.client
            .send(&Request::StreamRecord(ProduceRequest {
                record: Record::unassigned(value),
            }))
            .await?;

        match self.client.recv().await? {
            Response::Produced(response) => Ok(response.offset),
            Response::Error(status) => {
                self.ended = true;
                Err(ClientError::Status(status))
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Ends the stream and waits for the server to confirm.
    pub async fn finish(self) -> ClientResult<()> {
        if self.ended {
            return Ok(());
        }

        self.client.send(&Request::EndStream).await?;
        match self.client.recv().await? {
            Response::StreamEnd => Ok(()),
            Response::Error(status) => Err(ClientError::Status(status)),
            other => Err(unexpected(&other)),
        }
    }
}

/// An open consume stream.
pub struct ConsumeStream<'a> {
    client: &'a mut LogClient,
    ended: bool,
}

impl ConsumeStream<'_> {
    /// Waits for the next record.
    ///
    /// Returns `None` once the server has ended the stream.
    pub async fn next(&mut self) -> ClientResult<Option<Record>> {
        if self.ended {
            return Ok(None);
        }

        match self.client.recv().await? {
            Response::Consumed(response) => Ok(Some(response.record)),
            Response::StreamEnd => {
                self.ended = true;
                Ok(None)
            }
            Response::Error(status) => {
                self.ended = true;
                Err(ClientError::Status(status))
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Cancels the stream, discarding records already in flight.
    pub async fn cancel(mut self) -> ClientResult<()> {
        if self.ended {
            return Ok(());
        }

        self.client.send(&Request::Cancel).await?;
        while self.next().await?.is_some() {}
        Ok(())
    }
}
