// squadpipe/src/pipeline/execution.rs

//! Contains `Pipeline::run()`, which wires links, submits every worker as its
//! own task and supervises them, plus the `PipelineHandle` used for graceful
//! shutdown and kill.

use crate::core::link::LinkControl;
use crate::error::{PipeError, PipeResult};
use crate::pipeline::definition::Pipeline;
use crate::pipeline::drain::{DrainSettings, DrainStats};
use crate::pipeline::stage::{MaterializedLink, SpawnEnv, WiredStage, WorkerExit};
use crate::pipeline::state::PipelineState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{event, instrument, Level};

/// What a finished run reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
  /// Number of worker tasks that ran.
  pub workers: usize,
  /// Counters summed over every worker that returned normally.
  pub stats: DrainStats,
  /// Whether a graceful shutdown was requested during the run.
  pub shutdown_requested: bool,
  /// Whether the run was killed (explicitly or by a fatal error).
  pub killed: bool,
}

struct HandleInner {
  name: String,
  links: Mutex<Vec<Arc<dyn LinkControl>>>,
  state: watch::Sender<PipelineState>,
  shutdown_requested: AtomicBool,
  kill_requested: AtomicBool,
}

/// Cloneable handle to a pipeline, valid before, during and after its run.
///
/// The runtime installs no signal handlers: the embedding program decides
/// which external events map to [`shutdown`](Self::shutdown) and
/// [`kill`](Self::kill).
#[derive(Clone)]
pub struct PipelineHandle {
  inner: Arc<HandleInner>,
}

impl PipelineHandle {
  pub(crate) fn new(name: String) -> Self {
    let (state, _) = watch::channel(PipelineState::Unwired);
    Self {
      inner: Arc::new(HandleInner {
        name,
        links: Mutex::new(Vec::new()),
        state,
        shutdown_requested: AtomicBool::new(false),
        kill_requested: AtomicBool::new(false),
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn state(&self) -> PipelineState {
    *self.inner.state.borrow()
  }

  pub fn is_shutdown_requested(&self) -> bool {
    self.inner.shutdown_requested.load(Ordering::SeqCst)
  }

  pub fn is_killed(&self) -> bool {
    self.inner.kill_requested.load(Ordering::SeqCst)
  }

  /// Waits until the pipeline state satisfies `predicate`.
  pub async fn wait_until(&self, mut predicate: impl FnMut(PipelineState) -> bool) -> PipelineState {
    let mut rx = self.inner.state.subscribe();
    let result = rx.wait_for(|state| predicate(*state)).await;
    match result {
      Ok(state) => *state,
      // The sender lives in `inner`, which we hold, so it cannot be dropped.
      Err(_) => self.state(),
    }
  }

  /// Waits until worker tasks have been submitted.
  pub async fn started(&self) -> PipelineState {
    self.wait_until(PipelineState::is_started).await
  }

  /// Waits until every worker task has returned.
  pub async fn stopped(&self) {
    self.wait_until(PipelineState::is_stopped).await;
  }

  /// Graceful stop: sets every link's completion signal. Queued items are
  /// kept and in-flight items finish; workers stop once their input drains.
  ///
  /// Requested before the run starts, it is applied as soon as links exist.
  pub fn shutdown(&self) {
    event!(Level::WARN, pipeline = %self.inner.name, "Performing a graceful shutdown.");
    self.inner.shutdown_requested.store(true, Ordering::SeqCst);
    self.signal_links();
    self.advance(PipelineState::Draining);
  }

  /// Forced stop: shutdown, then discard every queued, unclaimed item.
  /// A `work` call already in progress is never interrupted.
  pub fn kill(&self) {
    event!(Level::ERROR, pipeline = %self.inner.name, "Performing a kill.");
    self.inner.kill_requested.store(true, Ordering::SeqCst);
    self.inner.shutdown_requested.store(true, Ordering::SeqCst);
    self.signal_links();
    let discarded: usize = self.inner.links.lock().iter().map(|link| link.clear()).sum();
    event!(Level::DEBUG, pipeline = %self.inner.name, discarded, "Kill discarded queued items.");
    self.advance(PipelineState::Killing);
  }

  fn signal_links(&self) {
    for link in self.inner.links.lock().iter() {
      link.mark_done();
    }
  }

  fn register_links(&self, links: impl IntoIterator<Item = Arc<dyn LinkControl>>) {
    self.inner.links.lock().extend(links);
  }

  /// Moves to `next` if that is a legal transition from the current state.
  fn advance(&self, next: PipelineState) -> bool {
    self.inner.state.send_if_modified(|state| {
      if state.can_move_to(next) {
        event!(Level::DEBUG, pipeline = %self.inner.name, from = ?*state, to = ?next, "Pipeline state changed.");
        *state = next;
        true
      } else {
        false
      }
    })
  }

  fn transition(&self, next: PipelineState) -> PipeResult<()> {
    let from = self.state();
    if self.advance(next) {
      Ok(())
    } else {
      Err(PipeError::InvalidState { from, to: next })
    }
  }
}

impl std::fmt::Debug for PipelineHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PipelineHandle")
      .field("name", &self.inner.name)
      .field("state", &self.state())
      .field("links", &self.inner.links.lock().len())
      .finish()
  }
}

fn panic_message(err: JoinError) -> String {
  if err.is_cancelled() {
    return "task was cancelled".to_string();
  }
  let payload = err.into_panic();
  if let Some(msg) = payload.downcast_ref::<&str>() {
    (*msg).to_string()
  } else if let Some(msg) = payload.downcast_ref::<String>() {
    msg.clone()
  } else {
    "unknown panic payload".to_string()
  }
}

impl Pipeline {
  /// Wires the links, runs every worker as an independent task and blocks
  /// until all of them have returned.
  ///
  /// The first fatal worker error (or panic) kills the pipeline and is
  /// returned once every task has stopped.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      pipeline = %self.config.name,
      squads = self.stages.len(),
      workers = self.worker_count(),
    ),
    err(Display)
  )]
  pub async fn run(self) -> PipeResult<RunSummary> {
    let Pipeline { config, stages, handle } = self;
    event!(Level::INFO, "Started running pipeline.");

    let total_workers: usize = stages.iter().map(|stage| stage.worker_count()).sum();
    if total_workers > config.max_workers {
      return Err(PipeError::configuration(format!(
        "{total_workers} workers exceed max_workers = {}; every worker must run concurrently",
        config.max_workers
      )));
    }

    // Wiring: one link between each pair of consecutive squads.
    let links: Vec<MaterializedLink> = stages
      .windows(2)
      .enumerate()
      .map(|(i, pair)| pair[0].make_output_link(format!("{}:link{i}", config.name), config.queue_capacity))
      .collect();
    let head_count = stages.first().map_or(0, |stage| stage.worker_count());
    handle.register_links(links.iter().map(|link| link.control.clone()));

    let mut wired: Vec<Box<dyn WiredStage>> = Vec::with_capacity(stages.len());
    for (index, stage) in stages.into_iter().enumerate() {
      let input = index.checked_sub(1).map(|i| links[i].erased.clone());
      let output = links.get(index).map(|link| link.erased.clone());
      let (stage, synthetic) = stage.wire(index, input, output, &config.name)?;
      handle.register_links(synthetic);
      wired.push(stage);
    }
    handle.transition(PipelineState::Wired)?;

    // Requests made before the links existed apply before any worker pops.
    if handle.is_killed() {
      handle.kill();
    } else if handle.is_shutdown_requested() {
      handle.shutdown();
    }

    let settings = DrainSettings {
      poll_interval: config.poll_interval,
      retry: config.retry.clone(),
    };
    let env = SpawnEnv {
      pipeline_name: &config.name,
      settings: &settings,
    };
    let mut tasks: JoinSet<WorkerExit> = JoinSet::new();
    let mut names: HashMap<tokio::task::Id, String> = HashMap::new();
    for stage in wired {
      names.extend(stage.spawn(&mut tasks, &env));
    }
    handle.transition(PipelineState::Running)?;
    event!(Level::INFO, "Submitted {} worker tasks.", tasks.len());

    if handle.is_killed() {
      handle.advance(PipelineState::Killing);
    } else if handle.is_shutdown_requested() {
      handle.advance(PipelineState::Draining);
    }

    let mut summary = RunSummary {
      workers: total_workers,
      ..RunSummary::default()
    };
    let mut head_remaining = head_count;
    let mut first_fatal: Option<PipeError> = None;

    loop {
      // Bounded wait so the loop stays responsive while tasks are busy.
      let joined = match tokio::time::timeout(config.poll_interval, tasks.join_next()).await {
        Err(_) => {
          event!(Level::TRACE, remaining = tasks.len(), "Waiting for workers.");
          continue;
        }
        Ok(None) => break,
        Ok(Some(joined)) => joined,
      };

      let (worker, squad_index, result) = match joined {
        Ok(exit) => (exit.worker, Some(exit.squad_index), exit.result),
        Err(join_err) => {
          let worker = names
            .get(&join_err.id())
            .cloned()
            .unwrap_or_else(|| "<unknown>".to_string());
          let message = panic_message(join_err);
          (worker.clone(), None, Err(PipeError::WorkerPanicked { worker, message }))
        }
      };

      match result {
        Ok(stats) => {
          event!(Level::DEBUG, worker = %worker, "Worker returned.");
          summary.stats.absorb(&stats);
          if squad_index == Some(0) {
            head_remaining = head_remaining.saturating_sub(1);
            if head_remaining == 0 && handle.advance(PipelineState::Draining) {
              event!(Level::DEBUG, "Head squad finished, draining.");
            }
          }
        }
        Err(err) => {
          event!(Level::ERROR, worker = %worker, error = %err, "Worker failed with a fatal error, killing pipeline.");
          if first_fatal.is_none() {
            handle.kill();
            first_fatal = Some(err);
          }
        }
      }
    }

    summary.shutdown_requested = handle.is_shutdown_requested();
    summary.killed = handle.is_killed();
    handle.transition(PipelineState::Stopped)?;
    event!(Level::INFO, killed = summary.killed, "All workers stopped.");

    match first_fatal {
      Some(err) => Err(err),
      None => Ok(summary),
    }
  }
}
