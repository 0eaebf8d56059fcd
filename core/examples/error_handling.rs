// squadpipe/examples/error_handling.rs

use async_trait::async_trait;
use squadpipe::stages::Collector;
use squadpipe::{ErrorClass, Outcome, Pipeline, PipelineConfig, RetryPolicy, Squad, Worker, WorkerContext};
use std::time::Duration;
use tracing::{info, warn};

// Errors this stage knows how to live with.
#[derive(Debug, thiserror::Error)]
enum LookupError {
  #[error("record {0} not found")]
  NotFound(u32),
}

struct Ids;

#[async_trait]
impl Worker for Ids {
  type Input = u32;
  type Output = u32;

  async fn work(&mut self, item: &u32, _ctx: &WorkerContext<u32>) -> anyhow::Result<Outcome<u32>> {
    Ok(Outcome::Emit(*item))
  }

  fn first_pipe_prepare(&mut self) -> Vec<u32> {
    (1..=6).collect()
  }
}

struct Lookup {
  busy_once: std::collections::HashSet<u32>,
}

#[async_trait]
impl Worker for Lookup {
  type Input = u32;
  type Output = String;

  async fn work(&mut self, item: &u32, _ctx: &WorkerContext<String>) -> anyhow::Result<Outcome<String>> {
    match *item {
      // Pretend the backend was busy: ask for the item again later.
      3 if self.busy_once.insert(3) => Ok(Outcome::Retry),
      4 => Err(LookupError::NotFound(4).into()),
      n => Ok(Outcome::Emit(format!("record-{n}"))),
    }
  }

  fn classify(&self, error: &anyhow::Error) -> ErrorClass {
    match error.downcast_ref::<LookupError>() {
      Some(LookupError::NotFound(_)) => ErrorClass::follow_through("not_found"),
      None => ErrorClass::Fatal,
    }
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Error Handling Example ---");

  let collector = Collector::<String>::new();
  let config = PipelineConfig::new("errors").with_retry_policy(RetryPolicy::capped(3).with_backoff(Duration::from_millis(10)));
  let pipeline = Pipeline::builder(config)
    .squad(Squad::single(Ids))
    .then(Squad::single(Lookup {
      busy_once: Default::default(),
    }))
    .then(Squad::single(collector.clone()))
    .build()?;

  let summary = pipeline.run().await?;
  info!(retried = summary.stats.retried, failed = summary.stats.failed, "Run complete.");

  for failure in collector.failures() {
    warn!(origin = %failure.origin(), "{}", failure);
  }
  info!("Records: {:?}", collector.values());
  assert_eq!(collector.values().len(), 5);
  assert_eq!(collector.failure_count(), 1);

  Ok(())
}
