//! Server configuration.
//!
//! Every option can come from the command line or the environment. A `.env`
//! file in the working directory is read first.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use ripdb_relay::{RejectionPolicy, RelayConfig};

/// Options of the `ripdb-server` binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "ripdb-server")]
#[command(version, about = "RipDB relay and key-value server")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "RIPDB_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// SQLite database file. In-memory storage when absent.
    #[arg(long, env = "RIPDB_DATABASE")]
    pub database: Option<PathBuf>,

    /// Tell senders when their message is rejected.
    #[arg(long, env = "RIPDB_NOTIFY_REJECTIONS")]
    pub notify_rejections: bool,

    /// Accept messages whose `fromAccountId` is not the signing key.
    #[arg(long, env = "RIPDB_ALLOW_UNBOUND_SENDERS")]
    pub allow_unbound_senders: bool,

    /// Per-connection outbound queue capacity.
    #[arg(long, env = "RIPDB_OUTBOUND_BUFFER", default_value_t = 256)]
    pub outbound_buffer: usize,

    /// Log filter, `tracing_subscriber::EnvFilter` syntax.
    #[arg(long = "log", env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

impl ServerConfig {
    /// Read `.env`, then parse arguments and environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    /// The relay settings these options describe.
    pub fn relay_config(&self) -> RelayConfig {
        let policy = if self.notify_rejections {
            RejectionPolicy::Notify
        } else {
            RejectionPolicy::Silent
        };
        RelayConfig {
            bind_sender_to_key: !self.allow_unbound_senders,
            outbound_buffer: self.outbound_buffer,
            ..RelayConfig::default().with_rejection_policy(policy)
        }
    }
}
