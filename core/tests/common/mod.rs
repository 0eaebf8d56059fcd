// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use parking_lot::Mutex;
use squadpipe::{fatal, ErrorClass, Failure, Outcome, Worker, WorkerContext};
use std::collections::HashMap;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::Level;

// --- Head worker seeding a fixed list of items ---
pub struct Source<T> {
  pub name: String,
  pub seeds: Vec<T>,
  pub delay: Duration,
}

impl<T> Source<T> {
  pub fn new(name: &str, seeds: Vec<T>) -> Self {
    Self {
      name: name.to_string(),
      seeds,
      delay: Duration::ZERO,
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Worker for Source<T> {
  type Input = T;
  type Output = T;

  fn name(&self) -> String {
    self.name.clone()
  }

  async fn work(&mut self, item: &T, _ctx: &WorkerContext<T>) -> anyhow::Result<Outcome<T>> {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    Ok(Outcome::Emit(item.clone()))
  }

  fn first_pipe_prepare(&mut self) -> Vec<T> {
    std::mem::take(&mut self.seeds)
  }
}

// --- Pass-through with an optional per-item delay and progress tracking ---
#[derive(Clone, Default)]
pub struct Progress {
  pub started: Arc<AtomicUsize>,
  pub completed: Arc<Mutex<Vec<i32>>>,
  pub started_notify: Arc<Notify>,
}

impl Progress {
  pub fn started(&self) -> usize {
    self.started.load(Ordering::SeqCst)
  }

  pub fn completed(&self) -> Vec<i32> {
    self.completed.lock().clone()
  }
}

pub struct Passthrough {
  pub name: String,
  pub delay: Duration,
  pub progress: Progress,
}

impl Passthrough {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      delay: Duration::ZERO,
      progress: Progress::default(),
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn with_progress(mut self, progress: Progress) -> Self {
    self.progress = progress;
    self
  }
}

#[async_trait]
impl Worker for Passthrough {
  type Input = i32;
  type Output = i32;

  fn name(&self) -> String {
    self.name.clone()
  }

  async fn work(&mut self, item: &i32, _ctx: &WorkerContext<i32>) -> anyhow::Result<Outcome<i32>> {
    self.progress.started.fetch_add(1, Ordering::SeqCst);
    self.progress.started_notify.notify_one();
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.progress.completed.lock().push(*item);
    Ok(Outcome::Emit(*item))
  }
}

// --- Asks for a retry a fixed number of times per item, then succeeds ---
pub struct Flaky {
  pub retries_before_success: u32,
  pub attempts: Arc<Mutex<HashMap<i32, u32>>>,
}

impl Flaky {
  pub fn new(retries_before_success: u32) -> Self {
    Self {
      retries_before_success,
      attempts: Arc::new(Mutex::new(HashMap::new())),
    }
  }
}

#[async_trait]
impl Worker for Flaky {
  type Input = i32;
  type Output = i32;

  async fn work(&mut self, item: &i32, _ctx: &WorkerContext<i32>) -> anyhow::Result<Outcome<i32>> {
    let attempt = {
      let mut attempts = self.attempts.lock();
      let entry = attempts.entry(*item).or_insert(0);
      *entry += 1;
      *entry
    };
    if attempt <= self.retries_before_success {
      tracing::debug!(target: "test_workers", item, attempt, "asking for retry");
      return Ok(Outcome::Retry);
    }
    Ok(Outcome::Emit(*item * 10))
  }
}

// --- Raises an error for one specific item ---
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailMode {
  FollowThrough,
  Fatal,
}

pub struct FailOn {
  pub target: i32,
  pub mode: FailMode,
}

#[async_trait]
impl Worker for FailOn {
  type Input = i32;
  type Output = i32;

  fn name(&self) -> String {
    "fail_on".to_string()
  }

  async fn work(&mut self, item: &i32, _ctx: &WorkerContext<i32>) -> anyhow::Result<Outcome<i32>> {
    if *item != self.target {
      return Ok(Outcome::Emit(*item));
    }
    match self.mode {
      FailMode::FollowThrough => Err(anyhow::anyhow!("expected failure on {item}")),
      FailMode::Fatal => Err(fatal(anyhow::anyhow!("unexpected failure on {item}"))),
    }
  }
}

// --- Narrows follow-through to one error type, like a network-facing stage ---
#[derive(Debug, thiserror::Error)]
#[error("network unreachable")]
pub struct NetworkError;

pub struct NetworkStage {
  pub fail_with_network: i32,
  pub fail_with_other: i32,
}

#[async_trait]
impl Worker for NetworkStage {
  type Input = i32;
  type Output = i32;

  async fn work(&mut self, item: &i32, _ctx: &WorkerContext<i32>) -> anyhow::Result<Outcome<i32>> {
    if *item == self.fail_with_network {
      return Err(NetworkError.into());
    }
    if *item == self.fail_with_other {
      anyhow::bail!("parse failure on {item}");
    }
    Ok(Outcome::Emit(*item))
  }

  fn classify(&self, error: &anyhow::Error) -> ErrorClass {
    if error.is::<NetworkError>() {
      ErrorClass::follow_through("network")
    } else {
      ErrorClass::Fatal
    }
  }
}

// --- Records every hook invocation ---
#[derive(Clone, Default)]
pub struct HookLog(pub Arc<Mutex<Vec<String>>>);

impl HookLog {
  pub fn push(&self, entry: impl Into<String>) {
    self.0.lock().push(entry.into());
  }

  pub fn entries(&self) -> Vec<String> {
    self.0.lock().clone()
  }

  pub fn count(&self, entry: &str) -> usize {
    self.0.lock().iter().filter(|e| e.as_str() == entry).count()
  }
}

pub struct Hooked {
  pub log: HookLog,
  pub fail_prepare: bool,
}

#[async_trait]
impl Worker for Hooked {
  type Input = i32;
  type Output = i32;

  async fn prepare(&mut self, _ctx: &WorkerContext<i32>) -> anyhow::Result<()> {
    self.log.push("prepare");
    if self.fail_prepare {
      anyhow::bail!("storage unavailable");
    }
    Ok(())
  }

  async fn work(&mut self, item: &i32, _ctx: &WorkerContext<i32>) -> anyhow::Result<Outcome<i32>> {
    self.log.push(format!("work:{item}"));
    Ok(Outcome::Emit(*item))
  }

  async fn handle_failed_input(&mut self, failure: &Failure, _ctx: &WorkerContext<i32>) -> anyhow::Result<Outcome<i32>> {
    self.log.push(format!("failed:{}", failure.kind()));
    Ok(Outcome::Fail(failure.clone()))
  }

  async fn finish(&mut self, _ctx: &WorkerContext<i32>) -> anyhow::Result<()> {
    self.log.push("finish");
    Ok(())
  }
}

// --- Panics on one specific item ---
pub struct PanicOn {
  pub target: i32,
  pub log: HookLog,
}

#[async_trait]
impl Worker for PanicOn {
  type Input = i32;
  type Output = i32;

  fn name(&self) -> String {
    "PanicOn".to_string()
  }

  async fn work(&mut self, item: &i32, _ctx: &WorkerContext<i32>) -> anyhow::Result<Outcome<i32>> {
    self.log.push(format!("work:{item}"));
    if *item == self.target {
      panic!("boom on {item}");
    }
    Ok(Outcome::Emit(*item))
  }

  async fn finish(&mut self, _ctx: &WorkerContext<i32>) -> anyhow::Result<()> {
    self.log.push("finish");
    Ok(())
  }
}

// --- Head worker whose seeds are loaded in prepare ---
pub struct Resuming {
  pub loaded: Vec<i32>,
  pub log: HookLog,
}

impl Resuming {
  pub fn new(log: HookLog) -> Self {
    Self { loaded: Vec::new(), log }
  }
}

#[async_trait]
impl Worker for Resuming {
  type Input = i32;
  type Output = i32;

  fn name(&self) -> String {
    "Resuming".to_string()
  }

  async fn prepare(&mut self, _ctx: &WorkerContext<i32>) -> anyhow::Result<()> {
    self.log.push("prepare");
    self.loaded = vec![1, 2, 3];
    Ok(())
  }

  fn first_pipe_prepare(&mut self) -> Vec<i32> {
    self.log.push("first_pipe_prepare");
    std::mem::take(&mut self.loaded)
  }

  async fn work(&mut self, item: &i32, _ctx: &WorkerContext<i32>) -> anyhow::Result<Outcome<i32>> {
    self.log.push(format!("work:{item}"));
    Ok(Outcome::Emit(*item))
  }

  async fn finish(&mut self, _ctx: &WorkerContext<i32>) -> anyhow::Result<()> {
    self.log.push("finish");
    Ok(())
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Upper bound for any single pipeline run in tests.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Short poll interval so tests finish quickly.
pub const TEST_POLL: Duration = Duration::from_millis(20);
