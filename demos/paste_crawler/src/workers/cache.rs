// demos/paste_crawler/src/workers/cache.rs

use super::saver::PASTE_SUFFIX;
use async_trait::async_trait;
use squadpipe::stages::{Dedup, SeedSource};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Ids of pastes already saved by an earlier run: the stems of the
/// `*.json` files in the output directory.
#[derive(Debug, Clone)]
pub struct PersistedIds {
  dir: PathBuf,
}

impl PersistedIds {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }
}

#[async_trait]
impl SeedSource<String> for PersistedIds {
  async fn load(&self) -> anyhow::Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(&self.dir).await {
      Ok(entries) => entries,
      // First run: nothing saved yet.
      Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
      Err(err) => return Err(err.into()),
    };
    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().and_then(|ext| ext.to_str()) != Some(PASTE_SUFFIX) {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
        ids.push(stem.to_string());
      }
    }
    Ok(ids)
  }
}

/// The paste-id cache: forwards each id at most once, skipping ids saved by
/// earlier runs.
pub fn paste_cache(dir: impl Into<PathBuf>) -> Dedup<String> {
  Dedup::new().named("PasteCache").with_seed(PersistedIds::new(dir))
}
