// demos/paste_crawler/src/lib.rs

//! A paste-site crawler assembled from squadpipe squads:
//! archive → paste cache → paste workers → JSON saver → printer.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod workers;

pub use config::CrawlerConfig;
pub use errors::{AppError, Result};
pub use models::Paste;
pub use pipeline::build_pipeline;
