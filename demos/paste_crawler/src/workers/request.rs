// demos/paste_crawler/src/workers/request.rs

//! Shared HTTP plumbing for the crawling workers.

use reqwest::{Client, StatusCode};
use squadpipe::{ErrorClass, Outcome};
use std::time::Duration;
use thiserror::Error;
use tracing::{event, Level};

/// Status codes answered with a retry instead of giving up on the item.
pub const RETRY_STATUS_CODES: &[StatusCode] = &[StatusCode::TOO_MANY_REQUESTS];

/// Failure kind given to transport errors forwarded downstream.
pub const REQUEST_FAILURE_KIND: &str = "request";

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("GET {url} answered {status}")]
  Status { url: String, status: StatusCode },

  #[error("GET {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },
}

/// A `reqwest` client bound to one site.
#[derive(Debug, Clone)]
pub struct PageClient {
  base_url: String,
  client: Client,
}

impl PageClient {
  pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .user_agent(concat!("paste_crawler/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      client,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path.trim_start_matches('/'))
  }

  /// Fetches `path` relative to the base URL and returns the body text.
  pub async fn get_text(&self, path: &str) -> Result<String, FetchError> {
    let url = self.url(path);
    event!(Level::DEBUG, url = %url, "Sending GET request.");
    let transport = |source| FetchError::Transport {
      url: url.clone(),
      source,
    };
    let response = self.client.get(&url).send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status { url: url.clone(), status });
    }
    response.text().await.map_err(transport)
  }
}

/// Maps an unsuccessful fetch onto what the worker hands back for the item:
/// throttling asks for a retry, any other status is dropped quietly, and
/// everything else is left for [`classify_request_error`] to judge.
pub fn status_outcome<T>(worker: &str, error: FetchError) -> anyhow::Result<Outcome<T>> {
  match error {
    FetchError::Status { url, status } if RETRY_STATUS_CODES.contains(&status) => {
      event!(Level::WARN, worker, url = %url, code = status.as_u16(), "Failed request, retrying.");
      Ok(Outcome::Retry)
    }
    FetchError::Status { url, status } => {
      event!(Level::DEBUG, worker, url = %url, code = status.as_u16(), "Failed request, dropping item.");
      Ok(Outcome::Suppress)
    }
    other => Err(other.into()),
  }
}

/// Transport errors follow through as `request` failures; anything else a
/// crawling worker raises is fatal.
pub fn classify_request_error(error: &anyhow::Error) -> ErrorClass {
  match error.downcast_ref::<FetchError>() {
    Some(FetchError::Transport { .. }) => ErrorClass::follow_through(REQUEST_FAILURE_KIND),
    _ => ErrorClass::Fatal,
  }
}
