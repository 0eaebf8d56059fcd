// squadpipe/src/stages/collector.rs

use crate::core::control::Outcome;
use crate::core::envelope::{Envelope, Failure};
use crate::core::worker::{Worker, WorkerContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Terminal stage that records every envelope it receives, in arrival order.
///
/// Clones share the same storage, so a squad of collectors and the code that
/// inspects the results all see one list.
pub struct Collector<T> {
  name: Option<String>,
  received: Arc<Mutex<Vec<Envelope<T>>>>,
}

impl<T> Clone for Collector<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      received: Arc::clone(&self.received),
    }
  }
}

impl<T> Default for Collector<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Collector<T> {
  pub fn new() -> Self {
    Self {
      name: None,
      received: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn len(&self) -> usize {
    self.received.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn failure_count(&self) -> usize {
    self.received.lock().iter().filter(|env| !env.is_ok()).count()
  }
}

impl<T: Clone> Collector<T> {
  pub fn envelopes(&self) -> Vec<Envelope<T>> {
    self.received.lock().clone()
  }

  /// Successful payloads only.
  pub fn values(&self) -> Vec<T> {
    self.received.lock().iter().filter_map(|env| env.value().cloned()).collect()
  }

  pub fn failures(&self) -> Vec<Failure> {
    self.received.lock().iter().filter_map(|env| env.failure().cloned()).collect()
  }
}

#[async_trait]
impl<T> Worker for Collector<T>
where
  T: Clone + Send + Sync + 'static,
{
  type Input = T;
  type Output = T;

  fn name(&self) -> String {
    self.name.clone().unwrap_or_else(|| "Collector".to_string())
  }

  async fn work(&mut self, item: &T, _ctx: &WorkerContext<T>) -> anyhow::Result<Outcome<T>> {
    self.received.lock().push(Envelope::Ok(item.clone()));
    Ok(Outcome::Suppress)
  }

  async fn handle_failed_input(&mut self, failure: &Failure, _ctx: &WorkerContext<T>) -> anyhow::Result<Outcome<T>> {
    self.received.lock().push(Envelope::Failed(failure.clone()));
    Ok(Outcome::Suppress)
  }
}
