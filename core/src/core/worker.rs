// squadpipe/src/core/worker.rs

//! Defines the `Worker` contract implemented by every pipeline stage, and the
//! `WorkerContext` handed to its hooks.

use crate::core::control::{default_classify, ErrorClass, Outcome};
use crate::core::envelope::{Envelope, Failure};
use crate::core::link::Link;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, Level};

/// A unit of stage logic.
///
/// Each worker instance runs its whole drain loop as one long-lived task:
/// `prepare`, then `first_pipe_prepare` (head squad only), then `work` or
/// `handle_failed_input` per pulled item, and finally `finish`. `finish` runs
/// on every exit path, including a failed `prepare` and a panic in `work`.
///
/// Only `work` is required. All workers of one squad must be interchangeable.
#[async_trait]
pub trait Worker: Send + 'static {
  /// Payload consumed from the input link.
  type Input: Send + Sync + 'static;
  /// Payload produced to the output link.
  type Output: Send + 'static;

  /// Display name used in logs and error reports. Defaults to the type name.
  fn name(&self) -> String {
    short_type_name::<Self>().to_string()
  }

  /// Runs once before any input is consumed. An error here is fatal.
  async fn prepare(&mut self, ctx: &WorkerContext<Self::Output>) -> anyhow::Result<()> {
    event!(Level::DEBUG, worker = %ctx.name(), "Preparing work.");
    Ok(())
  }

  /// Transforms one successful input item.
  ///
  /// Errors are passed to [`classify`](Self::classify): follow-through errors
  /// become failure envelopes, anything else terminates the worker.
  async fn work(&mut self, item: &Self::Input, ctx: &WorkerContext<Self::Output>) -> anyhow::Result<Outcome<Self::Output>>;

  /// Invoked instead of `work` for a failure forwarded from upstream.
  /// Passes the failure through unchanged by default.
  async fn handle_failed_input(
    &mut self,
    failure: &Failure,
    ctx: &WorkerContext<Self::Output>,
  ) -> anyhow::Result<Outcome<Self::Output>> {
    event!(Level::DEBUG, worker = %ctx.name(), failure = %failure, "Passing failure through.");
    Ok(Outcome::Fail(failure.clone()))
  }

  /// Runs exactly once after the drain loop ends, whether it ended normally or
  /// with an error. Output link completion is handled by the runtime.
  async fn finish(&mut self, ctx: &WorkerContext<Self::Output>) -> anyhow::Result<()> {
    event!(Level::DEBUG, worker = %ctx.name(), "Finished work.");
    Ok(())
  }

  /// Called only for workers of the head squad, which have no upstream link,
  /// after `prepare` succeeded. The returned items become this worker's
  /// synthetic, already-complete input.
  fn first_pipe_prepare(&mut self) -> Vec<Self::Input> {
    Vec::new()
  }

  /// Decides whether an error is an expected follow-through failure or fatal.
  fn classify(&self, error: &anyhow::Error) -> ErrorClass {
    default_classify(error)
  }
}

/// What a worker can see of the pipeline while it runs.
pub struct WorkerContext<Out: Send + 'static> {
  name: String,
  squad_index: usize,
  output: Option<Arc<Link<Out>>>,
}

impl<Out: Send + 'static> WorkerContext<Out> {
  pub(crate) fn new(name: String, squad_index: usize, output: Option<Arc<Link<Out>>>) -> Self {
    Self {
      name,
      squad_index,
      output,
    }
  }

  /// A detached context, useful for driving a worker outside a pipeline.
  pub fn standalone(name: impl Into<String>) -> Self {
    Self::new(name.into(), 0, None)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn squad_index(&self) -> usize {
    self.squad_index
  }

  /// Whether this worker has a real downstream link.
  pub fn has_output(&self) -> bool {
    self.output.is_some()
  }

  /// Pushes an extra successful item downstream, in addition to whatever the
  /// current `work` call returns. Blocks while a bounded output link is full.
  ///
  /// Returns `false` if the item was dropped (no output link, or no consumer left).
  pub async fn emit(&self, item: Out) -> bool {
    self.forward(Envelope::Ok(item)).await
  }

  /// Pushes a failure envelope downstream.
  pub async fn emit_failure(&self, failure: Failure) -> bool {
    self.forward(Envelope::Failed(failure)).await
  }

  pub(crate) async fn forward(&self, envelope: Envelope<Out>) -> bool {
    match &self.output {
      Some(link) => {
        if envelope.is_ok() {
          event!(Level::TRACE, worker = %self.name, link = %link.name(), "Sending to output.");
        }
        link.push(envelope).await
      }
      None => false,
    }
  }

  /// True once the output link's completion signal is set. A worker without
  /// an output link reports closed, since nothing downstream wants more.
  pub fn output_closed(&self) -> bool {
    self.output.as_ref().map_or(true, |link| link.is_done())
  }

  /// Resolves once [`output_closed`](Self::output_closed) would return true.
  pub async fn output_closed_wait(&self) {
    if let Some(link) = &self.output {
      link.closed().await;
    }
  }
}

pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
  let full = std::any::type_name::<T>();
  let base = full.split('<').next().unwrap_or(full);
  base.rsplit("::").next().unwrap_or(base)
}
