//! # seglog server
//!
//! Authorized network access to a [`seglog_core::Log`].
//!
//! This crate provides:
//! - [`CommitLog`] and [`Authorizer`] capabilities
//! - [`AclAuthorizer`] (policy lines) and [`AllowAll`]
//! - Subject tokens signed with HMAC-SHA256 ([`TokenValidator`])
//! - [`LogService`]: produce, consume, and both streams
//! - [`LogServer`]: TCP transport with length-delimited CBOR frames
//! - [`LogClient`]: the matching client
//!
//! # Architecture
//!
//! ```text
//! LogClient ──TCP──▶ LogServer ──▶ LogService ──▶ CommitLog (Log)
//!                      │              │
//!                      │              └─ Authorizer(subject, "*", action)
//!                      └─ Hello: TokenValidator ─▶ subject
//! ```
//!
//! A connection carries no subject until its `Hello` token verifies; until
//! then every call fails `Unauthenticated` without consulting the
//! authorizer. Authorized calls reach the log on the blocking thread pool.
//!
//! # Authentication
//!
//! ```rust,ignore
//! use seglog_server::{AuthConfig, ServerConfig, TokenValidator};
//!
//! let secret = b"my-secure-secret-32-bytes-long!".to_vec();
//! let config = ServerConfig::default().with_auth(secret.clone());
//!
//! let validator = TokenValidator::new(AuthConfig::new(secret));
//! let token = validator.create_token("alice")?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod client;
mod config;
mod error;
mod frame;
mod server;
mod service;
mod token;

pub use auth::{AclAuthorizer, Action, AllowAll, Authorizer, OBJECT_WILDCARD};
pub use client::{ClientError, ClientResult, ConsumeStream, LogClient, ProduceStream};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::LogServer;
pub use service::{CommitLog, LogService};
pub use token::{decode_token_hex, encode_token_hex, AuthConfig, TokenValidator};
