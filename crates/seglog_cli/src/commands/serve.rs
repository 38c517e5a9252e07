//! Serve command implementation.

use seglog_core::{Config, Log};
use seglog_server::{AclAuthorizer, AllowAll, Authorizer, LogServer, ServerConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Server flags.
#[derive(Debug)]
pub struct ServeOptions {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Policy file; without one every subject is allowed everything.
    pub policy: Option<PathBuf>,
    /// Token secret.
    pub secret: Option<Vec<u8>>,
    /// Consume stream poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Allow a policy without a token secret, trusting claimed subjects.
    pub insecure: bool,
}

impl ServeOptions {
    /// Checks that a policy is only enforced against verified subjects.
    ///
    /// Without a secret the `Hello` token is taken as the subject name, so
    /// any client could claim a subject the policy trusts.
    pub fn validate(&self) -> Result<(), String> {
        if self.policy.is_some() && self.secret.is_none() && !self.insecure {
            return Err(
                "--policy requires --secret so subjects are verified (pass --insecure to override)"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Runs the serve command.
pub fn run(
    path: &Path,
    config: Config,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    options.validate()?;
    let log = Arc::new(Log::open(path, config)?);

    let authorizer: Arc<dyn Authorizer> = match &options.policy {
        Some(policy) => {
            let acl = AclAuthorizer::from_file(policy)?;
            info!(policy = %policy.display(), rules = acl.len(), "loaded policy");
            Arc::new(acl)
        }
        None => {
            warn!("no policy file given, every subject may produce and consume");
            Arc::new(AllowAll)
        }
    };

    let mut server_config = ServerConfig::new(options.bind)
        .with_poll_interval(Duration::from_millis(options.poll_interval_ms));
    match options.secret {
        Some(secret) => server_config = server_config.with_auth(secret),
        None if options.insecure && options.policy.is_some() => {
            warn!("--insecure: policy is enforced against unverified subjects")
        }
        None => warn!("no token secret given, subjects are not verified"),
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = LogServer::bind(server_config, log.clone(), authorizer).await?;
        server
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
            })
            .await
    })?;

    log.close()?;
    info!("log closed");
    Ok(())
}
