//! Intrudr Binary Entry Point

use clap::Parser;
use intrudr_cli::{config::CliConfig, logging::init_logging, run, Args};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = CliConfig::load(&args)?;

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&config.logging)?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupt received, cancelling pending requests...");
                watcher.cancel();
            }
            _ = watcher.cancelled() => {}
        }
    });

    let result = run(args, config, cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = &result {
        tracing::error!("Attack failed: {:#}", e);
    }
    result.map(|_| ())
}
