//! seglog CLI
//!
//! Command-line tools for seglog commit logs.
//!
//! # Commands
//!
//! - `serve` - Serve a log over TCP until Ctrl-C
//! - `token` - Mint a signed subject token
//! - `inspect` - Display segment bounds and sizes
//! - `dump` - Print records in an offset range

mod commands;

use clap::{Args, Parser, Subcommand};
use seglog_core::Config;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// seglog command-line tools.
#[derive(Parser)]
#[command(name = "seglog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Segment layout; must match the values the log was written with.
#[derive(Args, Debug, Clone)]
struct LogArgs {
    /// Store size at which a segment rotates
    #[arg(long, default_value_t = Config::default().max_store_bytes)]
    max_store_bytes: u64,

    /// Index capacity per segment, in bytes
    #[arg(long, default_value_t = Config::default().max_index_bytes)]
    max_index_bytes: u64,

    /// First offset of a new log
    #[arg(long, default_value_t = 0)]
    initial_offset: u64,

    /// Index entry width in bytes
    #[arg(long, default_value_t = Config::default().entry_width)]
    entry_width: u64,
}

impl LogArgs {
    fn config(&self) -> Config {
        Config::new()
            .max_store_bytes(self.max_store_bytes)
            .max_index_bytes(self.max_index_bytes)
            .initial_offset(self.initial_offset)
            .entry_width(self.entry_width)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the log over TCP until Ctrl-C
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:7171")]
        bind: SocketAddr,

        /// Policy file with `p, subject, object, action` lines
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Secret for subject tokens; without it tokens are plain subject names
        #[arg(long)]
        secret: Option<String>,

        /// Consume stream poll interval in milliseconds
        #[arg(long, default_value_t = 100)]
        poll_interval_ms: u64,

        /// Enforce --policy without --secret, trusting claimed subjects
        #[arg(long)]
        insecure: bool,

        #[command(flatten)]
        log: LogArgs,
    },

    /// Mint a signed subject token (hex)
    Token {
        /// Subject name to embed
        #[arg(short, long)]
        subject: String,

        /// Secret shared with the server
        #[arg(long)]
        secret: String,
    },

    /// Display segment bounds and sizes
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        #[command(flatten)]
        log: LogArgs,
    },

    /// Print records in an offset range
    Dump {
        /// Start from this offset
        #[arg(short, long, default_value = "0")]
        offset: u64,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Read store files directly, without the index
        #[arg(long)]
        raw: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        #[command(flatten)]
        log: LogArgs,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            policy,
            secret,
            poll_interval_ms,
            insecure,
            log,
        } => {
            let path = cli.path.ok_or("Log path required for serve")?;
            commands::serve::run(
                &path,
                log.config(),
                commands::serve::ServeOptions {
                    bind,
                    policy,
                    secret: secret.map(String::into_bytes),
                    poll_interval_ms,
                    insecure,
                },
            )?;
        }
        Commands::Token { subject, secret } => {
            commands::token::run(&subject, secret.as_bytes())?;
        }
        Commands::Inspect { format, log } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, log.config(), &format)?;
        }
        Commands::Dump {
            offset,
            limit,
            raw,
            format,
            log,
        } => {
            let path = cli.path.ok_or("Log path required for dump")?;
            if raw {
                commands::dump::run_raw(&path, &format)?;
            } else {
                commands::dump::run(&path, log.config(), offset, limit, &format)?;
            }
        }
        Commands::Version => {
            println!("seglog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("seglog core v{}", seglog_core::VERSION);
        }
    }

    Ok(())
}
