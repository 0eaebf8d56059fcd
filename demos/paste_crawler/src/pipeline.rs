// demos/paste_crawler/src/pipeline.rs

use crate::config::CrawlerConfig;
use crate::errors::Result;
use crate::workers::{paste_cache, ArchiveWorker, JsonSaver, PageClient, PasteWorker};
use squadpipe::stages::{Printer, Timer};
use squadpipe::{Pipeline, PipelineConfig, Squad};

/// Wires the crawler:
/// `[archive | timer → archive] → paste cache → paste workers → saver → printer`.
pub fn build_pipeline(config: &CrawlerConfig) -> Result<Pipeline> {
  let client = PageClient::new(&config.base_url)?;

  let periodic = !config.interval.is_zero();
  let total_workers = usize::from(periodic) + 1 + 1 + config.paste_workers + config.saver_workers + 1;
  let pipe_config = PipelineConfig::new("paste_crawler")
    .with_queue_capacity(config.queue_capacity)
    .with_max_workers(total_workers.max(squadpipe::pipeline::config::DEFAULT_MAX_WORKERS))
    .with_retry_policy(config.retry.clone());

  let head = if periodic {
    Pipeline::builder(pipe_config)
      .squad(Squad::single(Timer::new(config.interval)))
      .then(Squad::single(ArchiveWorker::new(client.clone())))
  } else {
    Pipeline::builder(pipe_config).squad(Squad::single(ArchiveWorker::new(client.clone())))
  };

  let saver = JsonSaver::new(&config.output_dir);
  let pipeline = head
    .then(Squad::single(paste_cache(&config.output_dir)))
    .then(Squad::from_fn(config.paste_workers, |i| {
      PasteWorker::new(format!("PasteWorker_{i}"), client.clone())
    }))
    .then(Squad::from_fn(config.saver_workers, |i| {
      saver.clone().named(format!("JsonSaver_{i}"))
    }))
    .then(Squad::single(Printer::new()))
    .build()?;

  tracing::info!(
    squads = pipeline.squad_count(),
    workers = pipeline.worker_count(),
    periodic,
    "Crawler pipeline built."
  );
  Ok(pipeline)
}
