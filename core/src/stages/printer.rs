// squadpipe/src/stages/printer.rs

use crate::core::control::Outcome;
use crate::core::envelope::Failure;
use crate::core::worker::{Worker, WorkerContext};
use async_trait::async_trait;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::{event, Level};

/// Debug stage: logs everything passing through and forwards it unchanged.
pub struct Printer<T> {
  name: Option<String>,
  _item: PhantomData<fn(T) -> T>,
}

impl<T> Default for Printer<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Printer<T> {
  pub fn new() -> Self {
    Self {
      name: None,
      _item: PhantomData,
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }
}

#[async_trait]
impl<T> Worker for Printer<T>
where
  T: Debug + Clone + Send + Sync + 'static,
{
  type Input = T;
  type Output = T;

  fn name(&self) -> String {
    self.name.clone().unwrap_or_else(|| "Printer".to_string())
  }

  async fn work(&mut self, item: &T, ctx: &WorkerContext<T>) -> anyhow::Result<Outcome<T>> {
    event!(Level::INFO, worker = %ctx.name(), "{:?}", item);
    Ok(Outcome::Emit(item.clone()))
  }

  async fn handle_failed_input(&mut self, failure: &Failure, ctx: &WorkerContext<T>) -> anyhow::Result<Outcome<T>> {
    event!(Level::ERROR, worker = %ctx.name(), origin = %failure.origin(), "{}", failure);
    Ok(Outcome::Fail(failure.clone()))
  }
}
