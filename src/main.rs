//! Pulse adapter
//!
//! Self-reverting on/off switches driven from a config document, with an
//! optional interactive console.

use anyhow::Result;
use clap::Parser;
use pulse_adapter::cli::{self, ConsoleCommand};
use pulse_adapter::config::open_store;
use pulse_adapter::notify::{LogSink, NotificationSink};
use pulse_adapter::PulseAdapter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pulse adapter - on/off switches that revert on their own
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pulse config document (YAML). Used as the store when --db is not given
    #[arg(short, long, default_value = "pulses.yaml")]
    config: PathBuf,

    /// sled database holding the persisted config; seeded from --config on first run
    #[arg(long, env = "PULSE_DB")]
    db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Run without the interactive console
    #[arg(long)]
    no_repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting pulse adapter...");
    info!("Configuration file: {}", args.config.display());

    let (store, seed) = open_store(&args.config, args.db.as_deref()).await?;
    let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);

    let (adapter, report) = PulseAdapter::start(store, seed, sink).await?;
    for (name, reason) in &report.rejected {
        warn!("Pulse '{}' not started: {}", name, reason);
    }
    if let Some(e) = &report.persist_error {
        warn!("Assigned ids were not persisted and may change next start: {}", e);
    }

    run_app(adapter, !args.no_repl, shutdown_signal()).await?;

    info!("Pulse adapter shutdown complete");
    Ok(())
}

async fn run_app(
    mut adapter: PulseAdapter,
    interactive: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ConsoleCommand>();

    if interactive {
        println!("{}", cli::HELP);
        // Plain thread: readline blocks and must not hold up runtime shutdown
        std::thread::spawn(move || {
            if let Err(e) = cli::run_repl(cmd_tx) {
                warn!("Console stopped: {}", e);
            }
        });
    } else {
        drop(cmd_tx);
    }

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(cmd) = cmd_rx.recv() => {
                match cli::handle_command(adapter.registry(), cmd) {
                    Some(output) => println!("{}", output),
                    None => break,
                }
            }
        }
    }

    adapter.unload();
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
