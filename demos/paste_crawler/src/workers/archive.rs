// demos/paste_crawler/src/workers/archive.rs

use super::request::{classify_request_error, status_outcome, PageClient};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use squadpipe::{ErrorClass, Outcome, Worker, WorkerContext};
use std::time::Duration;
use tracing::{event, Level};

pub const ARCHIVE_PATH: &str = "archive";

static MAINTABLE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#"(?s)<table[^>]*class="maintable"[^>]*>(.*?)</table>"#).expect("Invalid maintable regex"));
// A public paste row: the visibility marker followed by the link to the paste.
static PUBLIC_PASTE_HREF: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(?s)<span[^>]*class="[^"]*public[^"]*"[^>]*>.*?</span>\s*<a href="/([A-Za-z0-9]+)""#)
    .expect("Invalid paste href regex")
});

/// Extracts the ids of public pastes listed in the archive's main table.
pub fn parse_archive(html: &str) -> Vec<String> {
  let Some(table) = MAINTABLE.captures(html).and_then(|caps| caps.get(1)) else {
    return Vec::new();
  };
  PUBLIC_PASTE_HREF
    .captures_iter(table.as_str())
    .filter_map(|caps| caps.get(1))
    .map(|id| id.as_str().trim_matches('/').to_string())
    .collect()
}

/// Fetches the archive page and emits every listed paste id.
///
/// As the head of a pipeline it seeds a single trigger, so it crawls once.
/// Placed after a [`Timer`](squadpipe::stages::Timer) it crawls once per tick.
pub struct ArchiveWorker {
  client: PageClient,
}

impl ArchiveWorker {
  pub fn new(client: PageClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Worker for ArchiveWorker {
  type Input = Duration;
  type Output = String;

  async fn work(&mut self, _tick: &Duration, ctx: &WorkerContext<String>) -> anyhow::Result<Outcome<String>> {
    event!(Level::INFO, worker = %ctx.name(), "Getting current paste ids from archive.");
    let html = match self.client.get_text(ARCHIVE_PATH).await {
      Ok(html) => html,
      Err(err) => return status_outcome(ctx.name(), err),
    };
    let ids = parse_archive(&html);
    event!(Level::DEBUG, worker = %ctx.name(), found = ids.len(), "Parsed archive.");
    // More than one output per input, so ids are pushed directly.
    for id in ids {
      if !ctx.emit(id).await {
        break;
      }
    }
    Ok(Outcome::Suppress)
  }

  fn first_pipe_prepare(&mut self) -> Vec<Duration> {
    vec![Duration::ZERO]
  }

  fn classify(&self, error: &anyhow::Error) -> ErrorClass {
    classify_request_error(error)
  }
}
