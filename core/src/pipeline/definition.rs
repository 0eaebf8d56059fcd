// squadpipe/src/pipeline/definition.rs

//! Contains the `Pipeline` struct and the typed builder that assembles it
//! from squads.

use crate::core::worker::Worker;
use crate::error::{PipeError, PipeResult};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::execution::PipelineHandle;
use crate::pipeline::squad::Squad;
use crate::pipeline::stage::{AnyStage, SquadStage};
use std::marker::PhantomData;

/// An ordered sequence of squads, connected by links when it runs.
///
/// Built once, run once: [`run`](Pipeline::run) consumes it.
pub struct Pipeline {
  pub(crate) config: PipelineConfig,
  pub(crate) stages: Vec<Box<dyn AnyStage>>,
  pub(crate) handle: PipelineHandle,
}

/// Marker for a builder that has no squads yet.
pub struct Empty;

/// Builds a [`Pipeline`]. `Out` is the payload type produced by the last
/// squad added, so the next squad must consume exactly that type.
pub struct PipelineBuilder<Out> {
  config: PipelineConfig,
  stages: Vec<Box<dyn AnyStage>>,
  _out: PhantomData<fn() -> Out>,
}

impl Pipeline {
  pub fn builder(config: PipelineConfig) -> PipelineBuilder<Empty> {
    PipelineBuilder {
      config,
      stages: Vec::new(),
      _out: PhantomData,
    }
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn squad_count(&self) -> usize {
    self.stages.len()
  }

  /// Total number of workers across all squads.
  pub fn worker_count(&self) -> usize {
    self.stages.iter().map(|stage| stage.worker_count()).sum()
  }

  /// A cloneable handle for observing the run and requesting shutdown or kill.
  pub fn handle(&self) -> PipelineHandle {
    self.handle.clone()
  }

  /// See [`PipelineHandle::shutdown`].
  pub fn shutdown(&self) {
    self.handle.shutdown();
  }

  /// See [`PipelineHandle::kill`].
  pub fn kill(&self) {
    self.handle.kill();
  }
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("config", &self.config)
      .field("squads", &self.stages.len())
      .field("workers", &self.worker_count())
      .field(
        "outputs",
        &self.stages.iter().map(|stage| stage.output_type_name()).collect::<Vec<_>>(),
      )
      .field("state", &self.handle.state())
      .finish()
  }
}

impl PipelineBuilder<Empty> {
  /// Adds the head squad. Its workers have no upstream and seed themselves
  /// through [`Worker::first_pipe_prepare`].
  pub fn squad<W: Worker>(mut self, squad: Squad<W>) -> PipelineBuilder<W::Output> {
    self.stages.push(Box::new(SquadStage::new(squad)));
    PipelineBuilder {
      config: self.config,
      stages: self.stages,
      _out: PhantomData,
    }
  }
}

impl<Out: Send + 'static> PipelineBuilder<Out> {
  /// Appends a squad consuming the previous squad's output.
  pub fn then<W>(mut self, squad: Squad<W>) -> PipelineBuilder<W::Output>
  where
    W: Worker<Input = Out>,
  {
    self.stages.push(Box::new(SquadStage::new(squad)));
    PipelineBuilder {
      config: self.config,
      stages: self.stages,
      _out: PhantomData,
    }
  }

  /// Validates the squad list and produces an unwired pipeline.
  pub fn build(self) -> PipeResult<Pipeline> {
    if self.stages.is_empty() {
      return Err(PipeError::configuration("a pipeline needs at least one squad"));
    }
    if let Some(index) = self.stages.iter().position(|stage| stage.worker_count() == 0) {
      return Err(PipeError::configuration(format!("squad {index} has no workers")));
    }
    if self.config.poll_interval.is_zero() {
      return Err(PipeError::configuration("poll interval must be greater than zero"));
    }
    let handle = PipelineHandle::new(self.config.name.clone());
    Ok(Pipeline {
      config: self.config,
      stages: self.stages,
      handle,
    })
  }
}
