// squadpipe/src/pipeline/drain.rs

//! The per-worker drain loop: pull, process, push, until the input link is
//! complete and nothing is left in flight.

use crate::core::control::{ErrorClass, Outcome};
use crate::core::envelope::{Envelope, Failure};
use crate::core::link::{Link, LinkControl, Queued};
use crate::core::retry::RetryPolicy;
use crate::core::worker::{Worker, WorkerContext};
use crate::error::{PipeError, PipeResult};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};

/// Failure kind forwarded when an item exceeds the retry policy.
pub const RETRIES_EXHAUSTED: &str = "retries_exhausted";

/// Per-worker counters, summed into the run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
  /// Items pulled from the input link (retried attempts counted each time).
  pub processed: u64,
  /// Successful envelopes pushed by returning `Outcome::Emit`.
  pub emitted: u64,
  /// Failure envelopes pushed downstream.
  pub failed: u64,
  pub suppressed: u64,
  pub retried: u64,
}

impl DrainStats {
  pub(crate) fn absorb(&mut self, other: &DrainStats) {
    self.processed += other.processed;
    self.emitted += other.emitted;
    self.failed += other.failed;
    self.suppressed += other.suppressed;
    self.retried += other.retried;
  }
}

#[derive(Debug, Clone)]
pub(crate) struct DrainSettings {
  pub poll_interval: Duration,
  pub retry: RetryPolicy,
}

// Signals both ends of a worker's links on every exit path, unwinding included.
struct LinkGuard {
  input: Arc<dyn LinkControl>,
  output: Option<Arc<dyn LinkControl>>,
}

impl Drop for LinkGuard {
  fn drop(&mut self) {
    self.input.consumer_finished();
    if let Some(output) = &self.output {
      output.producer_finished();
    }
  }
}

// A pulled item that is still in flight. Settles on drop unless requeued.
struct Claim<'a, T: Send + 'static> {
  link: &'a Link<T>,
  settled: bool,
}

impl<'a, T: Send + 'static> Claim<'a, T> {
  fn new(link: &'a Link<T>) -> Self {
    Self { link, settled: false }
  }

  fn requeue(mut self, item: Queued<T>) -> bool {
    self.settled = true;
    self.link.requeue(item)
  }
}

impl<T: Send + 'static> Drop for Claim<'_, T> {
  fn drop(&mut self) {
    if !self.settled {
      self.link.task_done();
    }
  }
}

/// Where a worker's input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputKind {
  /// The output link of the previous squad.
  Shared,
  /// A private link filled from `first_pipe_prepare` once `prepare` succeeded.
  Seeded,
}

/// Runs one worker to completion. `finish` runs exactly once whatever the
/// loop's outcome, a panic included; if both fail, the loop's error wins.
pub(crate) async fn drain<W: Worker>(
  mut worker: W,
  ctx: WorkerContext<W::Output>,
  input: Arc<Link<W::Input>>,
  input_kind: InputKind,
  output: Option<Arc<Link<W::Output>>>,
  settings: DrainSettings,
) -> PipeResult<DrainStats> {
  let _guard = LinkGuard {
    input: input.clone(),
    output: output.map(|link| link as Arc<dyn LinkControl>),
  };
  event!(Level::DEBUG, "Starting work.");

  let result = AssertUnwindSafe(run_loop(&mut worker, &ctx, &input, input_kind, &settings))
    .catch_unwind()
    .await;

  let finished = worker.finish(&ctx).await;
  let result = match result {
    Ok(result) => result,
    Err(panic) => {
      if let Err(finish_err) = finished {
        event!(Level::WARN, error = %finish_err, "Finish failed after a panic.");
      }
      // Re-raised so the task still reports the panic.
      std::panic::resume_unwind(panic);
    }
  };
  match (result, finished) {
    (Ok(stats), Ok(())) => {
      event!(
        Level::DEBUG,
        processed = stats.processed,
        emitted = stats.emitted,
        failed = stats.failed,
        "Worker drained."
      );
      Ok(stats)
    }
    (Ok(_), Err(source)) => {
      event!(Level::ERROR, error = %source, "Unhandled error while finishing.");
      Err(PipeError::WorkerFailed {
        worker: ctx.name().to_string(),
        source,
      })
    }
    (Err(e), finished) => {
      if let Err(finish_err) = finished {
        event!(Level::WARN, error = %finish_err, "Finish failed after an earlier fatal error.");
      }
      Err(e)
    }
  }
}

async fn run_loop<W: Worker>(
  worker: &mut W,
  ctx: &WorkerContext<W::Output>,
  input: &Link<W::Input>,
  input_kind: InputKind,
  settings: &DrainSettings,
) -> PipeResult<DrainStats> {
  if let Err(source) = worker.prepare(ctx).await {
    event!(Level::ERROR, error = %source, "Unhandled error while preparing.");
    return Err(PipeError::PrepareFailed {
      worker: ctx.name().to_string(),
      source,
    });
  }
  if input_kind == InputKind::Seeded {
    let seeds = worker.first_pipe_prepare();
    let offered = seeds.len();
    let queued = input.seed(seeds);
    event!(Level::DEBUG, offered, queued, "Running as first in the pipe.");
  }

  let mut stats = DrainStats::default();
  loop {
    let Some(queued) = input.pop(settings.poll_interval).await else {
      if input.is_drained() {
        break;
      }
      continue;
    };
    let claim = Claim::new(input);
    stats.processed += 1;

    let result = match &queued.envelope {
      Envelope::Ok(item) => worker.work(item, ctx).await,
      Envelope::Failed(failure) => worker.handle_failed_input(failure, ctx).await,
    };

    match result {
      Ok(Outcome::Emit(value)) => {
        stats.emitted += 1;
        ctx.forward(Envelope::Ok(value)).await;
      }
      Ok(Outcome::Suppress) => {
        stats.suppressed += 1;
        event!(Level::TRACE, "Work produced no output.");
      }
      Ok(Outcome::Fail(failure)) => {
        stats.failed += 1;
        ctx.forward(Envelope::Failed(failure)).await;
      }
      Ok(Outcome::Retry) => {
        if settings.retry.allows(queued.retries) {
          stats.retried += 1;
          let retries = queued.retries.saturating_add(1);
          event!(Level::DEBUG, retries, "Resubmitting item to input.");
          if !settings.retry.backoff.is_zero() {
            tokio::time::sleep(settings.retry.backoff).await;
          }
          if !claim.requeue(Queued::retried(queued.envelope, retries)) {
            event!(Level::DEBUG, "Input link was cleared, retry dropped.");
          }
        } else {
          stats.failed += 1;
          event!(Level::WARN, retries = queued.retries, "Retry limit reached, forwarding failure.");
          let failure = Failure::new(
            ctx.name(),
            RETRIES_EXHAUSTED,
            format!("gave up after {} retries", queued.retries),
          );
          ctx.forward(Envelope::Failed(failure)).await;
        }
      }
      Err(error) => match worker.classify(&error) {
        ErrorClass::FollowThrough { kind } => {
          stats.failed += 1;
          event!(Level::WARN, kind = %kind, error = %format!("{error:#}"), "Follow-through error, forwarding failure.");
          ctx.forward(Envelope::Failed(Failure::from_error(ctx.name(), kind, error))).await;
        }
        ErrorClass::Fatal => {
          event!(Level::ERROR, error = %format!("{error:#}"), "Unhandled error while working.");
          return Err(PipeError::WorkerFailed {
            worker: ctx.name().to_string(),
            source: error,
          });
        }
      },
    }
  }
  Ok(stats)
}
