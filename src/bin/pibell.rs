//! pibell client - rings the terminal when the doorbell does
//!
//! Connects to a pibell daemon and prints an alarm for every bell press,
//! reconnecting on its own when the connection drops.
//!
//! # Usage
//!
//! ```text
//! pibell raspberrypi.local:12321       # connect and stay running
//! pibell 192.168.1.20:12321 --backoff-secs 5
//! ```
//!
//! While running, type another `HOST:PORT` and press Enter to switch servers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use pibell_client::{App, ClientConfig, TerminalSink};
use pibell_core::PibellConfig;

/// How long shutdown waits for a blocked stdin read.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Default log filter; user-facing output goes through the terminal sink.
const DEFAULT_LOG_FILTER: &str = "pibell_client=warn";

/// pibell client - get notified when the doorbell rings
#[derive(Parser, Debug)]
#[command(name = "pibell", version, about)]
struct Args {
    /// Server address, validated at startup and reported if malformed
    #[arg(value_name = "HOST:PORT")]
    address: String,

    /// Seconds to wait before reconnecting after a connection error
    #[arg(long, value_name = "SECS")]
    backoff_secs: Option<u64>,

    /// Configuration file (overrides $PIBELL_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(args));
    // Stdin reads block a runtime thread until the next line
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    result
}

async fn run(args: Args) -> Result<()> {
    // Logs go to stderr so they do not interleave with notifications
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let file = PibellConfig::discover(args.config.as_deref())
        .context("Failed to load configuration")?;
    let mut config = ClientConfig::from(&file.client);
    if let Some(secs) = args.backoff_secs {
        config.backoff = Duration::from_secs(secs);
    }
    debug!(backoff_secs = config.backoff.as_secs(), "Client configured");

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error waiting for Ctrl+C");
        }
        ctrl_c_token.cancel();
    });

    App::new(TerminalSink::stdout(), config, shutdown)
        .run(&args.address, tokio::io::stdin())
        .await
        .context("Failed to read from stdin")
}
