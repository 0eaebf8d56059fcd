// squadpipe/src/stages/dedup.rs

//! A stage that forwards each distinct value at most once per run.

use crate::core::control::Outcome;
use crate::core::worker::{Worker, WorkerContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{event, Level};

/// Loads values that were already seen in a previous run, e.g. from the
/// storage a persister writes to.
#[async_trait]
pub trait SeedSource<T>: Send + Sync {
  async fn load(&self) -> anyhow::Result<Vec<T>>;
}

type Bypass<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Drops values it has already forwarded.
///
/// Clones share one membership set, so a squad built from clones of a single
/// `Dedup` keeps the at-most-once guarantee across all of its workers.
pub struct Dedup<T> {
  name: Option<String>,
  cache: Arc<Mutex<HashSet<T>>>,
  bypass: Option<Bypass<T>>,
  seed: Option<Arc<dyn SeedSource<T>>>,
}

impl<T> Clone for Dedup<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      cache: Arc::clone(&self.cache),
      bypass: self.bypass.clone(),
      seed: self.seed.clone(),
    }
  }
}

impl<T> Default for Dedup<T>
where
  T: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Dedup<T>
where
  T: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      name: None,
      cache: Arc::new(Mutex::new(HashSet::new())),
      bypass: None,
      seed: None,
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Values matching `predicate` pass through unconditionally and are never
  /// cached, e.g. control values such as start pulses.
  pub fn with_bypass(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
    self.bypass = Some(Arc::new(predicate));
    self
  }

  /// Preloads the membership set from `source` at `prepare()` time.
  pub fn with_seed(mut self, source: impl SeedSource<T> + 'static) -> Self {
    self.seed = Some(Arc::new(source));
    self
  }

  pub fn contains(&self, value: &T) -> bool {
    self.cache.lock().contains(value)
  }

  pub fn len(&self) -> usize {
    self.cache.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if the value was not cached before.
  pub fn insert(&self, value: T) -> bool {
    event!(Level::TRACE, value = ?value, "Adding to cache.");
    self.cache.lock().insert(value)
  }

  /// Forgets a value so it may be forwarded again.
  pub fn remove(&self, value: &T) -> bool {
    event!(Level::TRACE, value = ?value, "Removing from cache.");
    self.cache.lock().remove(value)
  }
}

#[async_trait]
impl<T> Worker for Dedup<T>
where
  T: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
  type Input = T;
  type Output = T;

  fn name(&self) -> String {
    self.name.clone().unwrap_or_else(|| "Dedup".to_string())
  }

  async fn prepare(&mut self, ctx: &WorkerContext<T>) -> anyhow::Result<()> {
    if let Some(seed) = &self.seed {
      let values = seed.load().await?;
      let loaded = values.len();
      self.cache.lock().extend(values);
      event!(Level::INFO, worker = %ctx.name(), loaded, "Preloaded cache.");
    }
    Ok(())
  }

  async fn work(&mut self, item: &T, ctx: &WorkerContext<T>) -> anyhow::Result<Outcome<T>> {
    if self.bypass.as_ref().is_some_and(|bypass| bypass(item)) {
      return Ok(Outcome::Emit(item.clone()));
    }
    if self.insert(item.clone()) {
      Ok(Outcome::Emit(item.clone()))
    } else {
      event!(Level::DEBUG, worker = %ctx.name(), item = ?item, "Dropped cached work.");
      Ok(Outcome::Suppress)
    }
  }
}
