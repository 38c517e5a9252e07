//! TCP transport for the log service.

use crate::auth::Authorizer;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::frame::{framed, from_frame, to_frame, FramedConn};
use crate::service::{CommitLog, LogService};
use crate::token::{AuthConfig, TokenValidator};
use futures::{SinkExt, StreamExt};
use seglog_protocol::{ConsumeRequest, Request, Response, PROTOCOL_VERSION};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Records a consume stream may buffer ahead of the socket.
const CONSUME_BUFFER: usize = 16;

/// State shared by every connection.
struct Shared {
    service: LogService,
    validator: Option<TokenValidator>,
    max_frame_bytes: usize,
}

/// A bound log server.
///
/// Each accepted connection gets its own task. A connection runs one unary
/// call or one stream at a time.
pub struct LogServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl LogServer {
    /// Binds to `config.bind_addr` and prepares to serve `log`.
    ///
    /// With `config.auth_secret` set, `Hello` tokens must be signed subject
    /// tokens; otherwise a token is read as a plain subject name.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the address cannot be bound.
    pub async fn bind(
        config: ServerConfig,
        log: Arc<dyn CommitLog>,
        authorizer: Arc<dyn Authorizer>,
    ) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;

        let service = LogService::new(log, authorizer).with_poll_interval(config.poll_interval);
        let validator = config.auth_secret.map(|secret| {
            TokenValidator::new(AuthConfig::new(secret).with_expiry(config.token_expiry))
        });

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                service,
                validator,
                max_frame_bytes: config.max_frame_bytes,
            }),
        })
    }

    /// Returns the address the server is bound to.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        self.listener.local_addr().map_err(ServerError::from)
    }

    /// Serves connections until `shutdown` completes, then aborts the
    /// connections still open.
    pub async fn run_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = self.local_addr()?;
        info!(addr = %local_addr, auth = self.shared.validator.is_some(), "log server listening");

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let shared = Arc::clone(&self.shared);
                            connections.spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, shared).await {
                                    match e {
                                        ServerError::ConnectionClosed => {
                                            debug!(client = %addr, "connection closed");
                                        }
                                        _ => {
                                            warn!(client = %addr, error = %e, "connection error");
                                        }
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                () = &mut shutdown => {
                    info!(open = connections.len(), "log server shutting down");
                    break;
                }
            }
        }

        connections.shutdown().await;
        Ok(())
    }
}

/// Per-connection state.
struct Connection {
    framed: FramedConn,
    shared: Arc<Shared>,
    /// Verified by `Hello`; `None` until then.
    subject: Option<String>,
}

#[instrument(skip(stream, shared), fields(client = %addr))]
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    shared: Arc<Shared>,
) -> ServerResult<()> {
    debug!("new connection");

    let mut conn = Connection {
        framed: framed(stream, shared.max_frame_bytes),
        shared,
        subject: None,
    };

    while let Some(request) = conn.next_request().await? {
        debug!(kind = request.kind(), subject = conn.subject.as_deref(), "request");

        match request {
            Request::Hello {
                protocol_version,
                token,
            } => conn.hello(protocol_version, &token).await?,
            Request::Produce(req) => {
                let result = conn
                    .shared
                    .service
                    .produce(conn.subject.as_deref(), req)
                    .await
                    .map(Response::Produced);
                conn.reply(result).await?;
            }
            Request::Consume(req) => {
                let result = conn
                    .shared
                    .service
                    .consume(conn.subject.as_deref(), req)
                    .await
                    .map(Response::Consumed);
                conn.reply(result).await?;
            }
            Request::ProduceStream => conn.produce_stream().await?,
            Request::ConsumeStream(req) => conn.consume_stream(req).await?,
            other @ (Request::StreamRecord(_) | Request::EndStream | Request::Cancel) => {
                let err = ServerError::Protocol(format!("{} outside a stream", other.kind()));
                conn.reply(Err(err)).await?;
            }
        }
    }

    Err(ServerError::ConnectionClosed)
}

impl Connection {
    /// Reads and decodes the next frame; `None` once the peer hangs up.
    ///
    /// An undecodable frame is answered with an error and ends the
    /// connection.
    async fn next_request(&mut self) -> ServerResult<Option<Request>> {
        let Some(frame) = self.framed.next().await else {
            return Ok(None);
        };

        match from_frame::<Request>(&frame?) {
            Ok(request) => Ok(Some(request)),
            Err(e) => {
                let err = ServerError::from(e);
                self.send(&Response::Error(err.to_status())).await?;
                Err(err)
            }
        }
    }

    async fn send(&mut self, response: &Response) -> ServerResult<()> {
        let frame = to_frame(response)?;
        self.framed.send(frame).await?;
        Ok(())
    }

    /// Sends the response, or the error's status.
    async fn reply(&mut self, result: ServerResult<Response>) -> ServerResult<()> {
        match result {
            Ok(response) => self.send(&response).await,
            Err(e) => {
                if e.is_server_error() {
                    warn!(error = %e, "call failed");
                } else {
                    debug!(error = %e, "call rejected");
                }
                self.send(&Response::Error(e.to_status())).await
            }
        }
    }

    async fn hello(&mut self, protocol_version: u16, token: &[u8]) -> ServerResult<()> {
        let verified = if protocol_version == PROTOCOL_VERSION {
            self.verify(token)
        } else {
            Err(ServerError::Protocol(format!(
                "protocol version {protocol_version} not supported, expected {PROTOCOL_VERSION}"
            )))
        };

        match verified {
            Ok(subject) => {
                debug!(subject = %subject, "authenticated");
                self.subject = Some(subject.clone());
                self.send(&Response::HelloOk { subject }).await
            }
            Err(e) => {
                self.subject = None;
                self.reply(Err(e)).await
            }
        }
    }

    fn verify(&self, token: &[u8]) -> ServerResult<String> {
        match &self.shared.validator {
            Some(validator) => validator.validate_token(token),
            None => std::str::from_utf8(token)
                .ok()
                .filter(|subject| !subject.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ServerError::Unauthenticated("token is not a subject name".into())),
        }
    }

    /// Bridges `StreamRecord` frames into the service and offsets back out.
    ///
    /// The next frame is read only after the previous record's offset has
    /// been sent, so at most one record is in flight.
    async fn produce_stream(&mut self) -> ServerResult<()> {
        let shared = Arc::clone(&self.shared);
        let subject = self.subject.clone();

        let (req_tx, req_rx) = mpsc::channel(1);
        let (resp_tx, mut resp_rx) = mpsc::channel(1);
        let task = shared
            .service
            .produce_stream(subject.as_deref(), req_rx, resp_tx);
        tokio::pin!(task);

        let mut req_tx = Some(req_tx);
        let mut in_flight = false;

        loop {
            tokio::select! {
                biased;
                Some(response) = resp_rx.recv() => {
                    in_flight = false;
                    self.send(&Response::Produced(response)).await?;
                }
                result = &mut task => {
                    while let Ok(response) = resp_rx.try_recv() {
                        self.send(&Response::Produced(response)).await?;
                    }
                    return match result {
                        Ok(()) => self.send(&Response::StreamEnd).await,
                        Err(e) => self.reply(Err(e)).await,
                    };
                }
                request = self.next_request(), if req_tx.is_some() && !in_flight => {
                    match request? {
                        None => return Err(ServerError::ConnectionClosed),
                        Some(Request::StreamRecord(req)) => {
                            if let Some(tx) = &req_tx {
                                // A closed channel means the task ended; its
                                // result is picked up next iteration.
                                in_flight = tx.send(req).await.is_ok();
                            }
                        }
                        Some(Request::EndStream) => req_tx = None,
                        Some(other) => {
                            let err = ServerError::Protocol(format!(
                                "{} inside a produce stream",
                                other.kind()
                            ));
                            self.send(&Response::Error(err.to_status())).await?;
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    /// Forwards records from the service until the client cancels.
    async fn consume_stream(&mut self, request: ConsumeRequest) -> ServerResult<()> {
        let shared = Arc::clone(&self.shared);
        let subject = self.subject.clone();

        let (tx, mut rx) = mpsc::channel(CONSUME_BUFFER);
        let cancel = CancellationToken::new();
        let task = shared
            .service
            .consume_stream(subject.as_deref(), request, tx, cancel.clone());
        tokio::pin!(task);

        let mut violation: Option<ServerError> = None;

        loop {
            tokio::select! {
                biased;
                result = &mut task => {
                    if let Err(e) = result {
                        while let Ok(response) = rx.try_recv() {
                            self.send(&Response::Consumed(response)).await?;
                        }
                        return self.reply(Err(e)).await;
                    }
                    return match violation.take() {
                        None => self.send(&Response::StreamEnd).await,
                        Some(err) => {
                            self.send(&Response::Error(err.to_status())).await?;
                            Err(err)
                        }
                    };
                }
                Some(response) = rx.recv(), if !cancel.is_cancelled() => {
                    self.send(&Response::Consumed(response)).await?;
                }
                request = self.next_request(), if !cancel.is_cancelled() => {
                    match request? {
                        None => return Err(ServerError::ConnectionClosed),
                        Some(Request::Cancel) => {
                            debug!(subject = subject.as_deref(), "consume stream cancelled");
                            cancel.cancel();
                        }
                        Some(other) => {
                            violation = Some(ServerError::Protocol(format!(
                                "{} inside a consume stream",
                                other.kind()
                            )));
                            cancel.cancel();
                        }
                    }
                }
            }
        }
    }
}
