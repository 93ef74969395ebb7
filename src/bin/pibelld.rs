//! pibell daemon - bell broadcast server
//!
//! Accepts TCP clients and sends each of them a line whenever the doorbell
//! is pressed.
//!
//! # Usage
//!
//! ```bash
//! # Listen on all interfaces, default port 12321
//! pibelld
//!
//! # Listen on one interface and port
//! pibelld 192.168.1.20:4000
//!
//! # Ring once per line typed on stdin (testing without hardware)
//! pibelld --stdin
//!
//! # Enable debug logging
//! RUST_LOG=pibelld=debug pibelld
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown
//! - SIGUSR1: Bell press

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pibell_core::{Address, PibellConfig};
use pibelld::registry::spawn_registry;
use pibelld::server::ListenServer;
use pibelld::{spawn_line_source, spawn_trigger, Broadcaster};

/// How long shutdown waits for a blocked stdin read.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// pibell daemon - tells every connected client when the doorbell rings
#[derive(Parser, Debug)]
#[command(name = "pibelld", version, about)]
struct Args {
    /// Address to listen on [default: 0.0.0.0:12321]
    #[arg(value_name = "LISTEN_ADDRESS:PORT", value_parser = Address::parse_listen)]
    listen: Option<Address>,

    /// Treat every line on stdin as a bell press
    #[arg(long)]
    stdin: bool,

    /// Per-client write deadline in milliseconds
    #[arg(long, value_name = "MS")]
    write_timeout_ms: Option<u64>,

    /// Configuration file (overrides $PIBELL_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Settings after layering defaults, config file and flags.
struct Settings {
    listen: Address,
    write_timeout: Duration,
    stdin: bool,
}

impl Settings {
    fn resolve(args: Args) -> Result<Self> {
        let config = PibellConfig::discover(args.config.as_deref())
            .context("Failed to load configuration")?;

        let listen = match args.listen {
            Some(listen) => listen,
            None => match Address::parse_listen(&config.server.listen) {
                Ok(listen) => listen,
                // Same exit path as a bad positional argument
                Err(e) => Args::command()
                    .error(ErrorKind::ValueValidation, format!("[server] listen: {e}"))
                    .exit(),
            },
        };

        let write_timeout = args
            .write_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.server.write_timeout());

        Ok(Self {
            listen,
            write_timeout,
            stdin: args.stdin,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run_daemon(args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    result
}

/// Runs the daemon (async entry point).
async fn run_daemon(args: Args) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pibelld=info".parse()?)
                .add_directive("pibell_core=info".parse()?),
        )
        .init();

    let settings = Settings::resolve(args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "pibell daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();

    let server = ListenServer::bind(&settings.listen, registry.clone(), cancel_token.clone())
        .await
        .with_context(|| format!("Cannot listen on {}", settings.listen))?;

    let broadcaster = Broadcaster::new(registry, settings.write_timeout);
    let (trigger, _trigger_task) = spawn_trigger(broadcaster, cancel_token.clone());

    #[cfg(unix)]
    {
        match pibelld::trigger::spawn_signal_source(trigger.clone(), cancel_token.clone()) {
            Ok(_) => info!("SIGUSR1 rings the bell"),
            Err(e) => warn!(error = %e, "SIGUSR1 trigger unavailable"),
        }
    }

    if settings.stdin {
        spawn_line_source(tokio::io::stdin(), trigger.clone(), cancel_token.clone());
        info!("Every line on stdin rings the bell");
    }

    info!(
        address = %server.local_addr(),
        write_timeout_ms = settings.write_timeout.as_millis() as u64,
        "Starting server"
    );

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("pibell daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
