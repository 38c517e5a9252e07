//! The access layer: authorization in front of a commit log.

use crate::auth::{Action, Authorizer, OBJECT_WILDCARD};
use crate::error::{ServerError, ServerResult};
use seglog_core::{CoreResult, Log, Record as LogRecord};
use seglog_protocol::{ConsumeRequest, ConsumeResponse, ProduceRequest, ProduceResponse, Record};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The log operations the access layer needs.
pub trait CommitLog: Send + Sync {
    /// Appends a payload and returns its offset.
    fn append(&self, value: &[u8]) -> CoreResult<u64>;

    /// Reads the record at `offset`.
    fn read(&self, offset: u64) -> CoreResult<LogRecord>;
}

impl CommitLog for Log {
    fn append(&self, value: &[u8]) -> CoreResult<u64> {
        Log::append(self, value)
    }

    fn read(&self, offset: u64) -> CoreResult<LogRecord> {
        Log::read(self, offset)
    }
}

/// Produce, consume, and their streaming forms, each authorized first.
///
/// Every method takes the caller's verified subject. `None` means the
/// transport could not verify one and the call fails `Unauthenticated`
/// before the authorizer is consulted.
///
/// Log calls block, so they run on the blocking thread pool. Each call
/// logs one `finished call` event at completion with its method, subject,
/// status code, and `elapsed_ns`.
pub struct LogService {
    log: Arc<dyn CommitLog>,
    authorizer: Arc<dyn Authorizer>,
    appended: Notify,
    poll_interval: Duration,
}

impl LogService {
    /// Creates a service over `log` guarded by `authorizer`.
    pub fn new(log: Arc<dyn CommitLog>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            log,
            authorizer,
            appended: Notify::new(),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Sets how often a waiting consume stream retries without a wake-up.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Appends one record and returns its offset.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `PermissionDenied`, or a log error.
    pub async fn produce(
        &self,
        subject: Option<&str>,
        request: ProduceRequest,
    ) -> ServerResult<ProduceResponse> {
        let start = Instant::now();
        let result = self.append(subject, request).await;
        log_call("produce", subject, start, &result);
        result
    }

    async fn append(
        &self,
        subject: Option<&str>,
        request: ProduceRequest,
    ) -> ServerResult<ProduceResponse> {
        self.authorize(subject, Action::Produce)?;

        let log = Arc::clone(&self.log);
        let value = request.record.value;
        let offset = tokio::task::spawn_blocking(move || log.append(&value))
            .await
            .map_err(|e| ServerError::Internal(format!("append task failed: {e}")))??;

        self.appended.notify_waiters();
        debug!(subject, offset, "produced");
        Ok(ProduceResponse { offset })
    }

    /// Reads the record at `request.offset`.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `PermissionDenied`, `OffsetOutOfRange` if nothing
    /// is stored there, or another log error.
    pub async fn consume(
        &self,
        subject: Option<&str>,
        request: ConsumeRequest,
    ) -> ServerResult<ConsumeResponse> {
        let start = Instant::now();
        let result = async {
            self.authorize(subject, Action::Consume)?;
            let record = self.read(request.offset).await?;
            debug!(subject, offset = request.offset, "consumed");
            Ok::<_, ServerError>(ConsumeResponse { record })
        }
        .await;
        log_call("consume", subject, start, &result);
        result
    }

    /// Appends records as they arrive on `requests`, answering each with its
    /// offset on `responses` before taking the next.
    ///
    /// Returns `Ok(())` once `requests` closes. Each record is authorized
    /// separately.
    ///
    /// # Errors
    ///
    /// The first failing produce ends the stream with its error, and
    /// `ConnectionClosed` if `responses` is dropped.
    pub async fn produce_stream(
        &self,
        subject: Option<&str>,
        mut requests: mpsc::Receiver<ProduceRequest>,
        responses: mpsc::Sender<ProduceResponse>,
    ) -> ServerResult<()> {
        let start = Instant::now();
        let result = async {
            while let Some(request) = requests.recv().await {
                let response = self.append(subject, request).await?;
                responses
                    .send(response)
                    .await
                    .map_err(|_| ServerError::ConnectionClosed)?;
            }
            Ok::<_, ServerError>(())
        }
        .await;
        log_call("produce_stream", subject, start, &result);
        result
    }

    /// Sends records from `request.offset` onward until cancelled.
    ///
    /// An offset that has not been written yet is not an error: the stream
    /// waits for the next append through this service, or for the poll
    /// interval to pass, and tries the same offset again. Each delivered
    /// record advances the offset by one.
    ///
    /// Returns `Ok(())` as soon as `cancel` fires or `records` is dropped.
    ///
    /// # Errors
    ///
    /// Authorization failures, and log errors other than out-of-range.
    pub async fn consume_stream(
        &self,
        subject: Option<&str>,
        request: ConsumeRequest,
        records: mpsc::Sender<ConsumeResponse>,
        cancel: CancellationToken,
    ) -> ServerResult<()> {
        let start = Instant::now();
        let result = self.follow(subject, request, records, cancel).await;
        log_call("consume_stream", subject, start, &result);
        result
    }

    async fn follow(
        &self,
        subject: Option<&str>,
        request: ConsumeRequest,
        records: mpsc::Sender<ConsumeResponse>,
        cancel: CancellationToken,
    ) -> ServerResult<()> {
        let mut offset = request.offset;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.authorize(subject, Action::Consume)?;

            // Register before reading so an append between the read and
            // the wait still wakes us.
            let appended = self.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            match self.read(offset).await {
                Ok(record) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        sent = records.send(ConsumeResponse { record }) => {
                            if sent.is_err() {
                                debug!(subject, offset, "consume stream receiver dropped");
                                break;
                            }
                        }
                    }
                    offset += 1;
                }
                Err(ServerError::OffsetOutOfRange { .. }) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = records.closed() => break,
                        () = &mut appended => {}
                        () = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    warn!(subject, offset, error = %e, "consume stream failed");
                    return Err(e);
                }
            }
        }

        debug!(subject, next = offset, "consume stream ended");
        Ok(())
    }

    fn authorize<'a>(&self, subject: Option<&'a str>, action: Action) -> ServerResult<&'a str> {
        let subject = subject.ok_or_else(|| {
            ServerError::Unauthenticated("no verified subject on connection".to_string())
        })?;

        if let Err(e) = self.authorizer.authorize(subject, OBJECT_WILDCARD, action) {
            warn!(subject, %action, "denied");
            return Err(e);
        }
        Ok(subject)
    }

    async fn read(&self, offset: u64) -> ServerResult<Record> {
        let log = Arc::clone(&self.log);
        let record = tokio::task::spawn_blocking(move || log.read(offset))
            .await
            .map_err(|e| ServerError::Internal(format!("read task failed: {e}")))??;
        Ok(Record::new(record.value, record.offset))
    }
}

/// Logs one finished call with its outcome and duration.
fn log_call<T>(
    method: &'static str,
    subject: Option<&str>,
    start: Instant,
    result: &ServerResult<T>,
) {
    let elapsed_ns = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
    match result {
        Ok(_) => info!(method, subject, code = "ok", elapsed_ns, "finished call"),
        Err(e) => info!(
            method,
            subject,
            code = ?e.status(),
            elapsed_ns,
            error = %e,
            "finished call"
        ),
    }
}

impl std::fmt::Debug for LogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogService")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
