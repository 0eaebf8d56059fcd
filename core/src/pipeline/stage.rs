// squadpipe/src/pipeline/stage.rs

//! Type-erased squads, so the orchestrator can hold an ordered list of squads
//! whose payload types differ from stage to stage.
//!
//! Links travel between stages as `Arc<dyn Any + Send + Sync>` and are
//! downcast back to `Link<T>` by the stage that consumes them. The typed
//! builder guarantees adjacent types agree, but a mismatch is still reported
//! as an error rather than a panic.

use crate::core::link::{Link, LinkControl};
use crate::core::worker::{Worker, WorkerContext};
use crate::error::{PipeError, PipeResult};
use crate::pipeline::drain::{drain, DrainSettings, DrainStats, InputKind};
use crate::pipeline::squad::Squad;
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{span, Instrument, Level};

pub(crate) type ErasedLink = Arc<dyn Any + Send + Sync>;

/// A link materialized by the orchestrator: the typed handle for wiring plus
/// the control surface for shutdown and kill.
pub(crate) struct MaterializedLink {
  pub erased: ErasedLink,
  pub control: Arc<dyn LinkControl>,
}

/// What a worker task hands back when it returns.
pub(crate) struct WorkerExit {
  pub worker: String,
  pub squad_index: usize,
  pub result: PipeResult<DrainStats>,
}

/// Everything a wired stage needs to submit its workers.
pub(crate) struct SpawnEnv<'a> {
  pub pipeline_name: &'a str,
  pub settings: &'a DrainSettings,
}

pub(crate) trait AnyStage: Send {
  fn worker_count(&self) -> usize;

  fn output_type_name(&self) -> &'static str;

  /// Creates the link that carries this stage's output.
  fn make_output_link(&self, name: String, capacity: usize) -> MaterializedLink;

  /// Binds this stage's workers to their links and registers them as
  /// producers/consumers. Head stages create one private input link per
  /// worker; those are returned so the orchestrator owns them too.
  fn wire(
    self: Box<Self>,
    squad_index: usize,
    input: Option<ErasedLink>,
    output: Option<ErasedLink>,
    pipeline_name: &str,
  ) -> PipeResult<(Box<dyn WiredStage>, Vec<Arc<dyn LinkControl>>)>;
}

pub(crate) trait WiredStage: Send {
  /// Submits every worker as its own task; returns each task's worker name.
  fn spawn(self: Box<Self>, tasks: &mut JoinSet<WorkerExit>, env: &SpawnEnv<'_>) -> Vec<(tokio::task::Id, String)>;
}

pub(crate) struct SquadStage<W: Worker> {
  squad: Squad<W>,
}

impl<W: Worker> SquadStage<W> {
  pub fn new(squad: Squad<W>) -> Self {
    Self { squad }
  }
}

fn downcast_link<T: Send + 'static>(link: ErasedLink, squad_index: usize) -> PipeResult<Arc<Link<T>>> {
  link.downcast::<Link<T>>().map_err(|_| PipeError::TypeMismatch {
    squad_index,
    expected_type: std::any::type_name::<Link<T>>().to_string(),
  })
}

impl<W: Worker> AnyStage for SquadStage<W> {
  fn worker_count(&self) -> usize {
    self.squad.len()
  }

  fn output_type_name(&self) -> &'static str {
    std::any::type_name::<W::Output>()
  }

  fn make_output_link(&self, name: String, capacity: usize) -> MaterializedLink {
    let link = Arc::new(Link::<W::Output>::new(name, capacity));
    MaterializedLink {
      erased: link.clone(),
      control: link,
    }
  }

  fn wire(
    self: Box<Self>,
    squad_index: usize,
    input: Option<ErasedLink>,
    output: Option<ErasedLink>,
    pipeline_name: &str,
  ) -> PipeResult<(Box<dyn WiredStage>, Vec<Arc<dyn LinkControl>>)> {
    let shared_input = input
      .map(|link| downcast_link::<W::Input>(link, squad_index))
      .transpose()?;
    let output = output
      .map(|link| downcast_link::<W::Output>(link, squad_index))
      .transpose()?;

    let input_kind = match shared_input {
      Some(_) => InputKind::Shared,
      None => InputKind::Seeded,
    };
    let mut synthetic: Vec<Arc<dyn LinkControl>> = Vec::new();
    let mut workers = Vec::with_capacity(self.squad.len());
    for (worker_index, worker) in self.squad.workers.into_iter().enumerate() {
      // Head workers get a private link, filled by the worker's own task
      // once `prepare` has succeeded.
      let input = match &shared_input {
        Some(link) => link.clone(),
        None => {
          let link = Arc::new(Link::new(format!("{pipeline_name}:seed{worker_index}"), 0));
          synthetic.push(link.clone());
          link
        }
      };
      input.register_consumer();
      if let Some(link) = &output {
        link.register_producer();
      }
      workers.push((worker, input));
    }

    Ok((
      Box::new(WiredSquad::<W> {
        squad_index,
        input_kind,
        workers,
        output,
      }),
      synthetic,
    ))
  }
}

struct WiredSquad<W: Worker> {
  squad_index: usize,
  input_kind: InputKind,
  workers: Vec<(W, Arc<Link<W::Input>>)>,
  output: Option<Arc<Link<W::Output>>>,
}

impl<W: Worker> WiredStage for WiredSquad<W> {
  fn spawn(self: Box<Self>, tasks: &mut JoinSet<WorkerExit>, env: &SpawnEnv<'_>) -> Vec<(tokio::task::Id, String)> {
    let squad_index = self.squad_index;
    let input_kind = self.input_kind;
    let mut spawned = Vec::with_capacity(self.workers.len());
    for (worker, input) in self.workers {
      let name = worker.name();
      let ctx = WorkerContext::new(name.clone(), squad_index, self.output.clone());
      let worker_span = span!(
        Level::INFO,
        "worker",
        pipeline = %env.pipeline_name,
        squad = squad_index,
        worker = %name
      );
      let settings = env.settings.clone();
      let output = self.output.clone();
      let exit_name = name.clone();
      let handle = tasks.spawn(
        async move {
          let result = drain(worker, ctx, input, input_kind, output, settings).await;
          WorkerExit {
            worker: exit_name,
            squad_index,
            result,
          }
        }
        .instrument(worker_span),
      );
      tracing::event!(Level::DEBUG, worker = %name, squad = squad_index, "Submitted worker.");
      spawned.push((handle.id(), name));
    }
    spawned
  }
}
