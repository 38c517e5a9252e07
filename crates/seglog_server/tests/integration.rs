//! End-to-end tests over TCP.

use seglog_core::{Config, Log};
use seglog_protocol::StatusCode;
use seglog_server::{
    decode_token_hex, encode_token_hex, AclAuthorizer, AuthConfig, ClientError, LogClient,
    LogServer, ServerConfig, TokenValidator,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const SECRET: &[u8] = b"integration-test-secret";

struct TestServer {
    addr: SocketAddr,
    log: Arc<Log>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Log::open(dir.path(), Config::default()).unwrap());

        let authorizer = AclAuthorizer::from_policy(
            "p, root, *, *
             p, reader, *, consume",
        )
        .unwrap();

        let config = ServerConfig::default()
            .with_bind_addr("127.0.0.1:0".parse().unwrap())
            .with_poll_interval(Duration::from_millis(20))
            .with_auth(SECRET.to_vec());

        let server = LogServer::bind(config, log.clone(), Arc::new(authorizer))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .run_until(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            log,
            shutdown: Some(tx),
            handle,
            _dir: dir,
        }
    }

    async fn client(&self, subject: &str) -> LogClient {
        let token = TokenValidator::new(AuthConfig::new(SECRET.to_vec()))
            .create_token(subject)
            .unwrap();
        LogClient::connect(self.addr, &token).await.unwrap()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap();
    }
}

#[tokio::test]
async fn produce_consume_and_boundaries() {
    let server = TestServer::start().await;
    let mut root = server.client("root").await;
    assert_eq!(root.subject(), Some("root"));

    assert_eq!(root.produce(&b"hello"[..]).await.unwrap(), 0);
    assert_eq!(root.produce(&b"world"[..]).await.unwrap(), 1);

    let record = root.consume(0).await.unwrap();
    assert_eq!(&record.value[..], b"hello");
    assert_eq!(record.offset, 0);

    let err = root.consume(2).await.unwrap_err();
    assert!(err.is_out_of_range());

    // Connection stays usable after an error.
    assert_eq!(&root.consume(1).await.unwrap().value[..], b"world");

    server.stop().await;
}

#[tokio::test]
async fn hex_token_connects_after_decoding() {
    let server = TestServer::start().await;
    let token = TokenValidator::new(AuthConfig::new(SECRET.to_vec()))
        .create_token("reader")
        .unwrap();
    let printed = encode_token_hex(&token);

    let mut client = LogClient::connect(server.addr, &decode_token_hex(&printed).unwrap())
        .await
        .unwrap();
    assert_eq!(client.subject(), Some("reader"));

    // The hex text itself is not a token.
    let err = LogClient::connect(server.addr, printed.as_bytes())
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), Some(StatusCode::Unauthenticated));

    assert!(client.consume(0).await.unwrap_err().is_out_of_range());
    server.stop().await;
}

#[tokio::test]
async fn denied_produce_leaves_log_unchanged() {
    let server = TestServer::start().await;
    let mut root = server.client("root").await;
    root.produce(&b"hello"[..]).await.unwrap();
    root.produce(&b"world"[..]).await.unwrap();

    let mut reader = server.client("reader").await;
    let err = reader.produce(&b"sneaky"[..]).await.unwrap_err();
    assert_eq!(err.code(), Some(StatusCode::PermissionDenied));
    assert_eq!(server.log.next_offset(), 2);

    assert_eq!(&reader.consume(1).await.unwrap().value[..], b"world");

    server.stop().await;
}

#[tokio::test]
async fn unauthenticated_calls_fail() {
    let server = TestServer::start().await;

    let mut anon = LogClient::connect_unauthenticated(server.addr).await.unwrap();
    let err = anon.produce(&b"x"[..]).await.unwrap_err();
    assert_eq!(err.code(), Some(StatusCode::Unauthenticated));
    let err = anon.consume(0).await.unwrap_err();
    assert_eq!(err.code(), Some(StatusCode::Unauthenticated));

    let forged = TokenValidator::new(AuthConfig::new(b"wrong-secret".to_vec()))
        .create_token("root")
        .unwrap();
    let err = LogClient::connect(server.addr, &forged).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Status(ref status) if status.code == StatusCode::Unauthenticated
    ));

    assert_eq!(server.log.next_offset(), 0);
    server.stop().await;
}

#[tokio::test]
async fn produce_stream_returns_offsets_in_order() {
    let server = TestServer::start().await;
    let mut root = server.client("root").await;

    let mut stream = root.produce_stream().await.unwrap();
    for (i, value) in ["a", "b", "c", "d"].into_iter().enumerate() {
        assert_eq!(stream.send(value.as_bytes().to_vec()).await.unwrap(), i as u64);
    }
    stream.finish().await.unwrap();

    // Back to unary calls on the same connection.
    assert_eq!(&root.consume(3).await.unwrap().value[..], b"d");

    server.stop().await;
}

#[tokio::test]
async fn produce_stream_denied() {
    let server = TestServer::start().await;
    let mut reader = server.client("reader").await;

    let mut stream = reader.produce_stream().await.unwrap();
    let err = stream.send(&b"x"[..]).await.unwrap_err();
    assert_eq!(err.code(), Some(StatusCode::PermissionDenied));
    stream.finish().await.unwrap();

    assert_eq!(server.log.next_offset(), 0);
    server.stop().await;
}

#[tokio::test]
async fn consume_stream_follows_producer_and_cancels() {
    let server = TestServer::start().await;
    let mut reader = server.client("reader").await;
    let mut root = server.client("root").await;

    let mut stream = reader.consume_stream(0).await.unwrap();

    let producer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        for i in 0..5u64 {
            root.produce(format!("record-{i}").into_bytes()).await.unwrap();
        }
        root
    });

    for i in 0..5u64 {
        let record = stream.next().await.unwrap().unwrap();
        assert_eq!(record.offset, i);
        assert_eq!(record.value, format!("record-{i}").into_bytes());
    }

    stream.cancel().await.unwrap();
    let mut root = producer.await.unwrap();

    // The reader's connection is free again after cancelling.
    assert_eq!(reader.consume(4).await.unwrap().offset, 4);
    assert_eq!(root.produce(&b"after"[..]).await.unwrap(), 5);

    server.stop().await;
}

#[tokio::test]
async fn consume_stream_unauthenticated() {
    let server = TestServer::start().await;
    let mut anon = LogClient::connect_unauthenticated(server.addr).await.unwrap();

    let mut stream = anon.consume_stream(0).await.unwrap();
    let err = stream.next().await.unwrap_err();
    assert_eq!(err.code(), Some(StatusCode::Unauthenticated));
    assert!(stream.next().await.unwrap().is_none());

    server.stop().await;
}
