// squadpipe/examples/basic_pipeline.rs

use async_trait::async_trait;
use squadpipe::stages::{Collector, Dedup, Printer};
use squadpipe::{Outcome, PipeError, Pipeline, PipelineConfig, Squad, Worker, WorkerContext};
use tracing::info;

// 1. A head worker: it has no upstream, so it seeds its own input.
struct Words {
  text: &'static str,
}

#[async_trait]
impl Worker for Words {
  type Input = String;
  type Output = String;

  async fn work(&mut self, item: &String, _ctx: &WorkerContext<String>) -> anyhow::Result<Outcome<String>> {
    Ok(Outcome::Emit(item.to_lowercase()))
  }

  fn first_pipe_prepare(&mut self) -> Vec<String> {
    self.text.split_whitespace().map(str::to_string).collect()
  }
}

// 2. A transforming worker, run as a squad of three.
struct Shout;

#[async_trait]
impl Worker for Shout {
  type Input = String;
  type Output = String;

  async fn work(&mut self, item: &String, _ctx: &WorkerContext<String>) -> anyhow::Result<Outcome<String>> {
    // Returning None suppresses the item.
    Ok(Some(item.to_uppercase()).filter(|word| word.len() > 2).into())
  }
}

#[tokio::main]
async fn main() -> Result<(), PipeError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  // 3. Chain the squads. Adjacent stage types are checked at compile time.
  let collector = Collector::<String>::new();
  let pipeline = Pipeline::builder(PipelineConfig::new("basic"))
    .squad(Squad::single(Words {
      text: "the quick brown fox jumps over the lazy dog the end",
    }))
    .then(Squad::single(Dedup::new()))
    .then(Squad::from_fn(3, |_| Shout))
    .then(Squad::single(Printer::new()))
    .then(Squad::single(collector.clone()))
    .build()?;

  // 4. Run until every worker has drained its input.
  let summary = pipeline.run().await?;

  // 5. Inspect the results
  info!(
    processed = summary.stats.processed,
    emitted = summary.stats.emitted,
    suppressed = summary.stats.suppressed,
    "Pipeline finished."
  );
  let mut words = collector.values();
  words.sort();
  info!("Collected: {:?}", words);
  assert!(words.contains(&"QUICK".to_string()));
  assert_eq!(words.iter().filter(|w| *w == "THE").count(), 1, "dedup forwards each word once");

  Ok(())
}
