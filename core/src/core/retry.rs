// squadpipe/src/core/retry.rs

use std::time::Duration;

/// Governs what happens when a worker answers [`Outcome::Retry`](crate::Outcome::Retry).
///
/// The default is unlimited retries with no backoff: an item that always asks
/// for a retry loops until the pipeline is killed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Maximum number of times one item may be resubmitted. `None` means unlimited.
  pub max_retries: Option<u32>,
  /// Delay before an item is resubmitted.
  pub backoff: Duration,
}

impl RetryPolicy {
  pub fn unlimited() -> Self {
    Self::default()
  }

  pub fn capped(max_retries: u32) -> Self {
    Self {
      max_retries: Some(max_retries),
      backoff: Duration::ZERO,
    }
  }

  pub fn with_backoff(mut self, backoff: Duration) -> Self {
    self.backoff = backoff;
    self
  }

  /// Whether an item that has already been resubmitted `retries` times may be resubmitted again.
  pub fn allows(&self, retries: u32) -> bool {
    self.max_retries.map_or(true, |max| retries < max)
  }
}
