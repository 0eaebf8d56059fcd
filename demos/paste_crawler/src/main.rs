// demos/paste_crawler/src/main.rs

use paste_crawler::{build_pipeline, AppError, CrawlerConfig};
use squadpipe::PipelineHandle;
use std::process::ExitCode;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// First interrupt asks for a graceful shutdown; a second one, or the grace
/// period running out, kills the run.
async fn watch_interrupts(handle: PipelineHandle, grace: Duration) {
  if tokio::signal::ctrl_c().await.is_err() {
    tracing::warn!("Could not listen for interrupts.");
    return;
  }
  tracing::warn!("Interrupt received, shutting down. Interrupt again to kill.");
  handle.shutdown();
  tokio::select! {
    _ = handle.stopped() => return,
    _ = tokio::signal::ctrl_c() => tracing::error!("Second interrupt received."),
    _ = tokio::time::sleep(grace) => tracing::error!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed."),
  }
  handle.kill();
}

async fn run() -> Result<(), AppError> {
  let config = CrawlerConfig::from_env()?;
  tracing::debug!(config = ?config, "Loaded config details.");

  let pipeline = build_pipeline(&config)?;
  let watcher = tokio::spawn(watch_interrupts(pipeline.handle(), config.kill_grace));

  let result = pipeline.run().await;
  watcher.abort();

  let summary = result?;
  tracing::info!(
    processed = summary.stats.processed,
    emitted = summary.stats.emitted,
    failed = summary.stats.failed,
    retried = summary.stats.retried,
    killed = summary.killed,
    "Crawl finished."
  );
  Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(EnvFilter::from_default_env()) // Allow RUST_LOG override
    .init();

  tracing::info!("Starting paste crawler...");

  match run().await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      if e.is_fatal_run() {
        tracing::error!(error = %e, "Crawl was killed by a fatal error.");
      } else {
        tracing::error!(error = %e, "Crawler failed to start.");
      }
      ExitCode::FAILURE
    }
  }
}
