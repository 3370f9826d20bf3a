//! Limiting proxy binary.
//!
//! Runs a single admission-controlled proxy in front of one backend until
//! Ctrl+C.
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                LIMITING PROXY                │
//!     Client Request   │  ┌──────────┐    ┌───────────┐   allow       │
//!     ─────────────────┼─▶│ listener │───▶│ admission │──────────┐    │
//!                      │  └──────────┘    │  policy   │          ▼    │
//!                      │                  └─────┬─────┘   ┌─────────┐ │
//!                      │                        │ reject  │ backend │─┼──▶ Backend
//!     Client Response  │  ┌──────────┐          ▼         │ client  │ │
//!     ◀────────────────┼──│ response │◀── synthetic 429   └────┬────┘ │
//!                      │  │  relay   │◀──────────────────────────┘    │
//!                      │  └──────────┘                                │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use limiting_proxy::config::{load_config, PolicyConfig, ProxyConfig};
use limiting_proxy::observability::{logging, metrics};
use limiting_proxy::LimitingProxy;

#[derive(Parser)]
#[command(name = "limiting-proxy", version)]
#[command(about = "Admission-controlled HTTP proxy for exercising client rate-limit and retry handling", long_about = None)]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    backend_host: Option<String>,

    #[arg(long)]
    backend_port: Option<u16>,

    #[arg(long)]
    listen_host: Option<String>,

    /// 0 picks an ephemeral port
    #[arg(long)]
    listen_port: Option<u16>,

    #[arg(long, value_enum, requires = "limit")]
    policy: Option<PolicyArg>,

    /// Request threshold for the policy
    #[arg(long)]
    limit: Option<u64>,

    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Forward the first N requests, reject the rest
    CutoffAfter,
    /// Reject the first N requests, forward the rest
    RejectFirst,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(host) = self.backend_host {
            config.backend.host = host;
        }
        if let Some(port) = self.backend_port {
            config.backend.port = port;
        }
        if let Some(host) = self.listen_host {
            config.listener.host = host;
        }
        if let Some(port) = self.listen_port {
            config.listener.port = port;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        let limit = self.limit.unwrap_or_else(|| config.policy.limit());
        config.policy = match self.policy {
            Some(PolicyArg::CutoffAfter) => PolicyConfig::CutoffAfter { limit },
            Some(PolicyArg::RejectFirst) => PolicyConfig::RejectFirst { limit },
            None => match config.policy {
                PolicyConfig::CutoffAfter { .. } => PolicyConfig::CutoffAfter { limit },
                PolicyConfig::RejectFirst { .. } => PolicyConfig::RejectFirst { limit },
            },
        };

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability.log_level);

    tracing::info!(
        backend_host = %config.backend.host,
        backend_port = config.backend.port,
        listen_port = config.listener.port,
        policy = ?config.policy,
        "Configuration loaded"
    );

    if let Some(address) = &config.observability.metrics_address {
        match address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %address,
                "Failed to parse metrics address"
            ),
        }
    }

    let proxy = LimitingProxy::new(config);
    proxy.start()?.wait().await?;

    if let Some(url) = proxy.server_url() {
        println!("{url}");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    proxy.stop().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
