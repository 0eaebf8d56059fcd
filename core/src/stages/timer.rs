// squadpipe/src/stages/timer.rs

use crate::core::control::Outcome;
use crate::core::worker::{Worker, WorkerContext};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{event, Level};

/// Head-of-pipeline scheduler: emits its interval downstream, sleeps, and
/// repeats until its output link is signaled complete.
///
/// Seeds itself with its own interval, so the input it consumes is the
/// interval to use. A zero interval emits exactly once.
pub struct Timer {
  name: Option<String>,
  interval: Duration,
}

impl Timer {
  pub fn new(interval: Duration) -> Self {
    Self { name: None, interval }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }
}

#[async_trait]
impl Worker for Timer {
  type Input = Duration;
  type Output = Duration;

  fn name(&self) -> String {
    self.name.clone().unwrap_or_else(|| "Timer".to_string())
  }

  async fn work(&mut self, interval: &Duration, ctx: &WorkerContext<Duration>) -> anyhow::Result<Outcome<Duration>> {
    let interval = *interval;
    event!(Level::INFO, worker = %ctx.name(), interval = ?interval, "Started timer.");
    if interval.is_zero() {
      return Ok(Outcome::Emit(interval));
    }
    let mut ticks: u64 = 0;
    while !ctx.output_closed() {
      if !ctx.emit(interval).await {
        break;
      }
      ticks += 1;
      // Wakes early when the pipeline shuts down.
      tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = ctx.output_closed_wait() => {}
      }
      event!(Level::DEBUG, worker = %ctx.name(), ticks, "Finished sleep.");
    }
    Ok(Outcome::Suppress)
  }

  fn first_pipe_prepare(&mut self) -> Vec<Duration> {
    vec![self.interval]
  }
}
