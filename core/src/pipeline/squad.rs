// squadpipe/src/pipeline/squad.rs

use crate::core::worker::Worker;

/// An ordered group of interchangeable workers sharing one input link and
/// one output link. Workers race for items, so a squad of N gives N-way
/// parallelism at its stage.
pub struct Squad<W: Worker> {
  pub(crate) workers: Vec<W>,
}

impl<W: Worker> Squad<W> {
  pub fn new(workers: Vec<W>) -> Self {
    Self { workers }
  }

  pub fn single(worker: W) -> Self {
    Self { workers: vec![worker] }
  }

  /// Builds `count` workers from `factory`, which receives the worker index.
  pub fn from_fn(count: usize, factory: impl FnMut(usize) -> W) -> Self {
    Self {
      workers: (0..count).map(factory).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.workers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.workers.is_empty()
  }

  pub fn workers(&self) -> &[W] {
    &self.workers
  }
}
