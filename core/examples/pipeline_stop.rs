// squadpipe/examples/pipeline_stop.rs

use squadpipe::stages::{Collector, Timer};
use squadpipe::{Pipeline, PipelineConfig, PipelineState, Squad};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Pipeline Stop Example ---");

  // A timer never runs out of work on its own; it has to be stopped.
  let ticks = Collector::<Duration>::new();
  let pipeline = Pipeline::builder(PipelineConfig::new("ticker"))
    .squad(Squad::single(Timer::new(Duration::from_millis(50))))
    .then(Squad::single(ticks.clone()))
    .build()?;
  let handle = pipeline.handle();

  let run = tokio::spawn(pipeline.run());
  handle.started().await;
  tokio::time::sleep(Duration::from_millis(300)).await;

  // Graceful: queued ticks are still delivered. `handle.kill()` would drop them.
  handle.shutdown();
  let summary = run.await??;

  info!(ticks = ticks.len(), "Stopped after shutdown.");
  assert!(summary.shutdown_requested, "Stop signal was not processed.");
  assert_eq!(handle.state(), PipelineState::Stopped);

  Ok(())
}
