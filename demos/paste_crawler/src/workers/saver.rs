// demos/paste_crawler/src/workers/saver.rs

use crate::models::Paste;
use async_trait::async_trait;
use parking_lot::Mutex;
use squadpipe::{Failure, Outcome, Worker, WorkerContext};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{event, Level};

pub const PASTE_SUFFIX: &str = "json";
pub const ERROR_LOG: &str = "errors.log";

/// Writes each paste to `<dir>/<id>.json` and records failures in
/// `<dir>/errors.log`. Clones share the error log lock.
#[derive(Debug, Clone)]
pub struct JsonSaver {
  name: String,
  dir: PathBuf,
  error_log: Arc<Mutex<()>>,
}

impl JsonSaver {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      name: "JsonSaver".to_string(),
      dir: dir.into(),
      error_log: Arc::new(Mutex::new(())),
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn paste_path(&self, id: &str) -> PathBuf {
    self.dir.join(id).with_extension(PASTE_SUFFIX)
  }

  fn append_error(&self, failure: &Failure) -> std::io::Result<()> {
    let _guard = self.error_log.lock();
    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(self.dir.join(ERROR_LOG))?;
    writeln!(file, "{}: {}", failure.kind(), failure.message())
  }
}

#[async_trait]
impl Worker for JsonSaver {
  type Input = Paste;
  type Output = Paste;

  fn name(&self) -> String {
    self.name.clone()
  }

  async fn prepare(&mut self, ctx: &WorkerContext<Paste>) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&self.dir).await?;
    event!(Level::INFO, worker = %ctx.name(), dir = %self.dir.display(), "Writing pastes.");
    Ok(())
  }

  async fn work(&mut self, paste: &Paste, ctx: &WorkerContext<Paste>) -> anyhow::Result<Outcome<Paste>> {
    let path = self.paste_path(&paste.id);
    let body = serde_json::to_vec_pretty(paste)?;
    tokio::fs::write(&path, body).await?;
    event!(Level::DEBUG, worker = %ctx.name(), path = %path.display(), "Saved paste.");
    Ok(Outcome::Emit(paste.clone()))
  }

  async fn handle_failed_input(&mut self, failure: &Failure, ctx: &WorkerContext<Paste>) -> anyhow::Result<Outcome<Paste>> {
    if let Err(err) = self.append_error(failure) {
      event!(Level::WARN, worker = %ctx.name(), error = %err, "Could not append to error log.");
    }
    Ok(Outcome::Fail(failure.clone()))
  }
}
