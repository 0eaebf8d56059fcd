use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use squadpipe::stages::Dedup;
use squadpipe::{Link, Outcome, Pipeline, PipelineConfig, Squad, Worker, WorkerContext};
use squadpipe::Envelope;
use std::time::Duration;
use tokio::runtime::Runtime; // To run async code within Criterion

// --- Benchmark workers ---
struct Numbers {
  count: u64,
}

#[async_trait]
impl Worker for Numbers {
  type Input = u64;
  type Output = u64;

  async fn work(&mut self, item: &u64, _ctx: &WorkerContext<u64>) -> anyhow::Result<Outcome<u64>> {
    Ok(Outcome::Emit(*item))
  }

  fn first_pipe_prepare(&mut self) -> Vec<u64> {
    (0..self.count).collect()
  }
}

// Simulates some CPU-bound work per item.
struct Spin {
  iterations: u64,
}

#[async_trait]
impl Worker for Spin {
  type Input = u64;
  type Output = u64;

  async fn work(&mut self, item: &u64, _ctx: &WorkerContext<u64>) -> anyhow::Result<Outcome<u64>> {
    let mut acc = *item;
    for _ in 0..self.iterations {
      acc = acc.wrapping_mul(31).wrapping_add(7);
    }
    Ok(Outcome::Emit(acc))
  }
}

struct Sink;

#[async_trait]
impl Worker for Sink {
  type Input = u64;
  type Output = u64;

  async fn work(&mut self, _item: &u64, _ctx: &WorkerContext<u64>) -> anyhow::Result<Outcome<u64>> {
    Ok(Outcome::Suppress)
  }
}

fn bench_config() -> PipelineConfig {
  PipelineConfig::new("bench")
    .with_poll_interval(Duration::from_millis(5))
    .with_max_workers(64)
}

// --- Benchmark Functions ---

fn bench_squad_width(c: &mut Criterion) {
  let mut group = c.benchmark_group("SquadWidth");
  let rt = Runtime::new().unwrap();
  let items: u64 = 1_000;

  for width in [1usize, 4, 16].iter() {
    group.throughput(Throughput::Elements(items));
    group.bench_with_input(BenchmarkId::new("spin_100", width), width, |b, &width| {
      b.to_async(&rt).iter_batched(
        || {
          Pipeline::builder(bench_config())
            .squad(Squad::single(Numbers { count: items }))
            .then(Squad::from_fn(width, |_| Spin { iterations: 100 }))
            .then(Squad::single(Sink))
            .build()
            .unwrap()
        },
        |pipeline| async move { pipeline.run().await.unwrap() },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

fn bench_queue_capacity(c: &mut Criterion) {
  let mut group = c.benchmark_group("QueueCapacity");
  let rt = Runtime::new().unwrap();
  let items: u64 = 1_000;

  for capacity in [0usize, 1, 16, 256].iter() {
    group.throughput(Throughput::Elements(items));
    group.bench_with_input(BenchmarkId::new("three_squads", capacity), capacity, |b, &capacity| {
      b.to_async(&rt).iter_batched(
        || {
          Pipeline::builder(bench_config().with_queue_capacity(capacity))
            .squad(Squad::single(Numbers { count: items }))
            .then(Squad::from_fn(2, |_| Spin { iterations: 10 }))
            .then(Squad::single(Sink))
            .build()
            .unwrap()
        },
        |pipeline| async move { pipeline.run().await.unwrap() },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

fn bench_dedup(c: &mut Criterion) {
  let mut group = c.benchmark_group("Dedup");
  let rt = Runtime::new().unwrap();
  let items: u64 = 1_000;

  group.throughput(Throughput::Elements(items));
  group.bench_function("distinct_values", |b| {
    b.to_async(&rt).iter_batched(
      || {
        Pipeline::builder(bench_config())
          .squad(Squad::single(Numbers { count: items }))
          .then(Squad::single(Dedup::<u64>::new()))
          .then(Squad::single(Sink))
          .build()
          .unwrap()
      },
      |pipeline| async move { pipeline.run().await.unwrap() },
      criterion::BatchSize::SmallInput,
    );
  });
  group.finish();
}

fn bench_link_push_pop(c: &mut Criterion) {
  let mut group = c.benchmark_group("Link");
  let rt = Runtime::new().unwrap();

  group.bench_function("push_then_pop", |b| {
    let link = Link::<u64>::new("bench", 0);
    b.to_async(&rt).iter(|| {
      let link = &link;
      async move {
        link.push(Envelope::Ok(1)).await;
        let item = link.try_pop();
        link.task_done();
        item
      }
    });
  });
  group.finish();
}

criterion_group!(
  benches,
  bench_squad_width,
  bench_queue_capacity,
  bench_dedup,
  bench_link_push_pop
);
criterion_main!(benches);
