// squadpipe/src/pipeline/config.rs

use crate::core::retry::RetryPolicy;
use std::time::Duration;

/// Default bounded wait used by drain loops and the run loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default upper bound on worker tasks in one pipeline.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Runtime settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// Used in log fields and link names.
  pub name: String,
  /// Capacity of every link between squads. `0` means unbounded.
  pub queue_capacity: usize,
  /// How long a drain loop waits for input before re-checking completion,
  /// and how often the run loop polls worker tasks.
  pub poll_interval: Duration,
  /// Upper bound on the total number of workers across all squads. Every
  /// worker must be able to run at the same time for data to flow end to end,
  /// so a pipeline with more workers than this is rejected.
  pub max_workers: usize,
  pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      name: "pipeline".to_string(),
      queue_capacity: 0,
      poll_interval: DEFAULT_POLL_INTERVAL,
      max_workers: DEFAULT_MAX_WORKERS,
      retry: RetryPolicy::default(),
    }
  }
}

impl PipelineConfig {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
    self.queue_capacity = capacity;
    self
  }

  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  pub fn with_max_workers(mut self, max_workers: usize) -> Self {
    self.max_workers = max_workers;
    self
  }

  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }
}
