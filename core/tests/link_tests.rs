// tests/link_tests.rs
mod common;
use common::*;
use serial_test::serial;
use squadpipe::{Envelope, Failure, Link};
use std::sync::Arc;
use std::time::Duration;

fn ok_values(link: &Link<i32>) -> Vec<i32> {
  let mut values = Vec::new();
  while let Some(item) = link.try_pop() {
    values.push(item.envelope.ok().expect("expected successful envelope"));
    link.task_done();
  }
  values
}

#[tokio::test]
#[serial]
async fn test_link_is_fifo() {
  setup_tracing();
  let link = Link::new("fifo", 0);
  for i in 1..=3 {
    assert!(link.push(Envelope::Ok(i)).await);
  }
  assert_eq!(link.len(), 3);
  assert_eq!(ok_values(&link), vec![1, 2, 3]);
  assert_eq!(link.unfinished(), 0);
}

#[tokio::test]
#[serial]
async fn test_pop_times_out_on_empty_link() {
  setup_tracing();
  let link: Link<i32> = Link::new("empty", 0);
  let started = std::time::Instant::now();
  assert!(link.pop(Duration::from_millis(50)).await.is_none());
  assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
#[serial]
async fn test_pop_wakes_on_push() {
  setup_tracing();
  let link = Arc::new(Link::new("wake", 0));
  let producer = link.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(30)).await;
    producer.push(Envelope::Ok(7)).await;
  });
  let item = link.pop(Duration::from_secs(5)).await.expect("item should arrive");
  assert_eq!(item.envelope.ok(), Some(7));
}

#[tokio::test]
#[serial]
async fn test_drained_requires_done_and_no_unfinished_items() {
  setup_tracing();
  let link = Link::new("drain", 0);
  link.push(Envelope::Ok(1)).await;
  link.mark_done();
  assert!(!link.is_drained(), "queued item pending");

  let claimed = link.try_pop().unwrap();
  assert!(link.is_empty());
  assert!(!link.is_drained(), "claimed item still in flight");

  link.task_done();
  drop(claimed);
  assert!(link.is_drained());
}

#[tokio::test]
#[serial]
async fn test_completion_waits_for_every_producer() {
  setup_tracing();
  let link: Link<i32> = Link::new("producers", 0);
  link.register_producer();
  link.register_producer();

  link.producer_finished();
  assert!(!link.is_done(), "one producer of the squad is still running");

  link.producer_finished();
  assert!(link.is_done());
  assert!(link.is_drained());
}

#[tokio::test]
#[serial]
async fn test_shutdown_signal_does_not_drain_while_producers_live() {
  setup_tracing();
  let link: Link<i32> = Link::new("shutdown", 0);
  link.register_producer();
  link.mark_done();
  assert!(link.is_done());
  assert!(!link.is_drained(), "a live producer may still forward an in-flight item");
  link.producer_finished();
  assert!(link.is_drained());
}

#[tokio::test]
#[serial]
async fn test_completion_signal_latches() {
  setup_tracing();
  let link: Link<i32> = Link::new("latch", 0);
  link.mark_done();
  link.mark_done();
  assert!(link.is_done());
  link.register_producer();
  assert!(link.is_done(), "registering never unsets completion");
}

#[tokio::test]
#[serial]
async fn test_seeded_link_is_complete_and_holds_seeds() {
  setup_tracing();
  let link = Link::seeded("seed", vec![4, 5]);
  assert!(link.is_done());
  assert_eq!(link.unfinished(), 2);
  assert_eq!(ok_values(&link), vec![4, 5]);
  assert!(link.is_drained());

  let empty: Link<i32> = Link::seeded("seed-empty", Vec::new());
  assert!(empty.is_drained());
}

#[tokio::test]
#[serial]
async fn test_bounded_link_applies_backpressure() {
  setup_tracing();
  let link = Arc::new(Link::new("bounded", 1));
  link.register_consumer();
  assert!(link.push(Envelope::Ok(1)).await);

  let producer = link.clone();
  let blocked = tokio::spawn(async move { producer.push(Envelope::Ok(2)).await });
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(!blocked.is_finished(), "push must wait for a free slot");
  assert_eq!(link.len(), 1);

  let first = link.pop(Duration::from_millis(100)).await.unwrap();
  link.task_done();
  assert_eq!(first.envelope.ok(), Some(1));

  let pushed = tokio::time::timeout(Duration::from_secs(2), blocked)
    .await
    .expect("push should complete once a slot frees")
    .unwrap();
  assert!(pushed);
  assert_eq!(ok_values(&link), vec![2]);
}

#[tokio::test]
#[serial]
async fn test_clear_discards_queued_items_and_frees_slots() {
  setup_tracing();
  let link = Arc::new(Link::new("clear", 2));
  link.register_consumer();
  link.push(Envelope::Ok(1)).await;
  link.push(Envelope::Ok(2)).await;

  let claimed = link.try_pop().unwrap();
  link.push(Envelope::Ok(3)).await;
  assert_eq!(link.unfinished(), 3);

  assert_eq!(link.clear(), 2);
  assert!(link.is_empty());
  assert_eq!(link.unfinished(), 1, "the claimed item is untouched by clear");
  assert_eq!(claimed.envelope.ok(), Some(1));

  // Both slots are free again.
  tokio::time::timeout(Duration::from_secs(1), async {
    link.push(Envelope::Ok(4)).await;
    link.push(Envelope::Ok(5)).await;
  })
  .await
  .expect("cleared slots must be released");
}

#[tokio::test]
#[serial]
async fn test_abandoned_link_drops_pushes_instead_of_blocking() {
  setup_tracing();
  let link = Arc::new(Link::new("abandoned", 1));
  link.register_consumer();
  link.push(Envelope::Ok(1)).await;

  let producer = link.clone();
  let blocked = tokio::spawn(async move { producer.push(Envelope::Ok(2)).await });
  tokio::time::sleep(Duration::from_millis(30)).await;

  link.consumer_finished();
  let pushed = tokio::time::timeout(Duration::from_secs(2), blocked)
    .await
    .expect("blocked producer must be released")
    .unwrap();
  assert!(!pushed);
  assert!(!link.push(Envelope::Ok(3)).await);
  assert_eq!(link.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_failure_envelopes_flow_through_links() {
  setup_tracing();
  let link: Link<i32> = Link::new("failures", 0);
  link.push(Envelope::Failed(Failure::new("upstream", "network", "timed out"))).await;
  let item = link.try_pop().unwrap();
  let failure = item.envelope.failure().cloned().expect("failure envelope");
  assert_eq!(failure.origin(), "upstream");
  assert_eq!(failure.to_string(), "network: timed out");
}

#[tokio::test]
#[serial]
async fn test_closed_resolves_when_marked_done() {
  setup_tracing();
  let link: Arc<Link<i32>> = Arc::new(Link::new("closed", 0));
  let waiter = link.clone();
  let handle = tokio::spawn(async move { waiter.closed().await });
  tokio::time::sleep(Duration::from_millis(20)).await;
  assert!(!handle.is_finished());
  link.mark_done();
  tokio::time::timeout(Duration::from_secs(1), handle)
    .await
    .expect("closed() should resolve")
    .unwrap();
}
