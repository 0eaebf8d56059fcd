// demos/paste_crawler/src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One crawled paste, as written to `<output_dir>/<id>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paste {
  pub id: String,
  pub title: String,
  pub author: String,
  pub content: String,
  /// When the paste was published, if the page showed it.
  pub posted_at: Option<DateTime<Utc>>,
  pub fetched_at: DateTime<Utc>,
}
