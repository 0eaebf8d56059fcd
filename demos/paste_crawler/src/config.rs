// demos/paste_crawler/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use squadpipe::RetryPolicy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://pastebin.com";
pub const DEFAULT_OUTPUT_DIR: &str = "PasteBin";

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
  pub base_url: String,
  pub output_dir: PathBuf,
  pub paste_workers: usize,
  pub saver_workers: usize,
  /// 0 means unbounded links.
  pub queue_capacity: usize,
  /// Zero runs a single archive pass; otherwise the archive is polled on this interval.
  pub interval: Duration,
  pub retry: RetryPolicy,
  /// How long a graceful shutdown may take before the run is killed.
  pub kill_grace: Duration,
}

impl Default for CrawlerConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
      paste_workers: 8,
      saver_workers: 2,
      queue_capacity: 0,
      interval: Duration::ZERO,
      retry: RetryPolicy::unlimited(),
      kill_grace: Duration::from_secs(10),
    }
  }
}

fn parse_var<T>(var_name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(var_name) {
    Ok(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
    Err(_) => Ok(default),
  }
}

impl CrawlerConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let defaults = Self::default();
    let base_url = env::var("CRAWLER_BASE_URL").unwrap_or(defaults.base_url);
    let output_dir = env::var("CRAWLER_OUTPUT_DIR")
      .map(PathBuf::from)
      .unwrap_or(defaults.output_dir);
    let paste_workers = parse_var("CRAWLER_PASTE_WORKERS", defaults.paste_workers)?;
    let saver_workers = parse_var("CRAWLER_SAVER_WORKERS", defaults.saver_workers)?;
    let queue_capacity = parse_var("CRAWLER_QUEUE_CAPACITY", defaults.queue_capacity)?;
    let interval = Duration::from_secs(parse_var("CRAWLER_INTERVAL_SECS", 0u64)?);
    let kill_grace = Duration::from_secs(parse_var("CRAWLER_KILL_GRACE_SECS", defaults.kill_grace.as_secs())?);

    let max_retries = match env::var("CRAWLER_MAX_RETRIES") {
      Ok(raw) => Some(
        raw
          .trim()
          .parse::<u32>()
          .map_err(|e| AppError::Config(format!("Invalid CRAWLER_MAX_RETRIES: {}", e)))?,
      ),
      Err(_) => None,
    };
    let backoff = Duration::from_millis(parse_var("CRAWLER_RETRY_BACKOFF_MS", 0u64)?);
    let retry = RetryPolicy { max_retries, backoff };

    if paste_workers == 0 || saver_workers == 0 {
      return Err(AppError::Config("worker counts must be at least 1".to_string()));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
      return Err(AppError::Config(format!("CRAWLER_BASE_URL is not an http(s) URL: {}", base_url)));
    }

    tracing::info!("Crawler configuration loaded successfully.");
    Ok(Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      output_dir,
      paste_workers,
      saver_workers,
      queue_capacity,
      interval,
      retry,
      kill_grace,
    })
  }
}
