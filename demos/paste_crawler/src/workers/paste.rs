// demos/paste_crawler/src/workers/paste.rs

use super::request::{classify_request_error, status_outcome, PageClient};
use crate::models::Paste;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use squadpipe::{ErrorClass, Outcome, Worker, WorkerContext};
use tracing::{event, Level};

static TITLE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#"(?s)<div class="info-top">\s*<h1>(.*?)</h1>"#).expect("Invalid title regex"));
static AUTHOR: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#"(?s)<div class="username">\s*<a[^>]*>(.*?)</a>"#).expect("Invalid author regex"));
static DATE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"<div class="date">\s*<span title="([^"]*)">([^<]*)</span>"#).expect("Invalid date regex")
});
static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})(?:st|nd|rd|th)\b").expect("Invalid ordinal regex"));
static CLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}:\d{2}:\d{2} [AP]M").expect("Invalid clock regex"));

fn unescape(text: &str) -> String {
  text
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&quot;", "\"")
    .replace("&#039;", "'")
    .replace("&amp;", "&")
}

fn capture(re: &Regex, html: &str) -> Option<String> {
  re.captures(html)
    .and_then(|caps| caps.get(1))
    .map(|m| unescape(m.as_str().trim()))
    .filter(|s| !s.is_empty())
}

/// The date block shows `Jan 5th, 2020` and carries the time of day in its
/// title. Both must parse.
fn parse_posted_at(html: &str) -> Option<DateTime<Utc>> {
  let caps = DATE.captures(html)?;
  let day_text = ORDINAL.replace_all(caps.get(2)?.as_str().trim(), "$1");
  let date = NaiveDate::parse_from_str(&day_text, "%b %d, %Y").ok()?;
  let clock = CLOCK.find(caps.get(1)?.as_str())?;
  let time = NaiveTime::parse_from_str(clock.as_str(), "%I:%M:%S %p").ok()?;
  Some(date.and_time(time).and_utc())
}

/// Builds a [`Paste`] from its page and raw content. Missing title or
/// author fall back to what the site shows for anonymous pastes.
pub fn parse_paste_page(id: &str, html: &str, raw: String) -> Paste {
  Paste {
    id: id.to_string(),
    title: capture(&TITLE, html).unwrap_or_else(|| "Untitled".to_string()),
    author: capture(&AUTHOR, html).unwrap_or_else(|| "Guest".to_string()),
    content: raw,
    posted_at: parse_posted_at(html),
    fetched_at: Utc::now(),
  }
}

/// Requests and parses a single paste.
pub struct PasteWorker {
  name: String,
  client: PageClient,
}

impl PasteWorker {
  pub fn new(name: impl Into<String>, client: PageClient) -> Self {
    Self {
      name: name.into(),
      client,
    }
  }
}

#[async_trait]
impl Worker for PasteWorker {
  type Input = String;
  type Output = Paste;

  fn name(&self) -> String {
    self.name.clone()
  }

  async fn work(&mut self, id: &String, ctx: &WorkerContext<Paste>) -> anyhow::Result<Outcome<Paste>> {
    event!(Level::INFO, worker = %ctx.name(), paste = %id, "Getting more information about paste.");
    let html = match self.client.get_text(id).await {
      Ok(html) => html,
      Err(err) => return status_outcome(ctx.name(), err),
    };
    let raw = match self.client.get_text(&format!("raw/{id}")).await {
      Ok(raw) => raw,
      Err(err) => return status_outcome(ctx.name(), err),
    };
    Ok(Outcome::Emit(parse_paste_page(id, &html, raw)))
  }

  fn classify(&self, error: &anyhow::Error) -> ErrorClass {
    classify_request_error(error)
  }
}
