// squadpipe/src/core/link.rs

//! A `Link<T>` connects one squad's output to the next squad's input: a FIFO
//! of envelopes plus a latching completion signal.
//!
//! Besides the queue itself the link tracks:
//! - unfinished items (queued plus claimed-but-not-settled), so consumers never
//!   stop while a sibling is about to resubmit a retried item;
//! - live producers, so completion fires only once every worker of the
//!   upstream squad has finished, not the first one;
//! - live consumers, so producers never block forever on a stage that is gone.
//!
//! All mutation goes through the link's own lock, atomics and notifiers.

use crate::core::envelope::Envelope;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::time::Instant;
use tracing::{event, Level};

/// An envelope sitting in a link, with the bookkeeping the runtime needs.
#[derive(Debug)]
pub struct Queued<T> {
  pub envelope: Envelope<T>,
  /// How many times this item has already been resubmitted.
  pub retries: u32,
  holds_slot: bool,
}

impl<T> Queued<T> {
  pub(crate) fn retried(envelope: Envelope<T>, retries: u32) -> Self {
    Self {
      envelope,
      retries,
      holds_slot: false,
    }
  }
}

struct LinkQueue<T> {
  items: VecDeque<Queued<T>>,
  unfinished: usize,
}

pub struct Link<T: Send + 'static> {
  name: String,
  capacity: usize,
  queue: Mutex<LinkQueue<T>>,
  available: Notify,
  // Present only for bounded links; one permit per free slot.
  slots: Option<Semaphore>,
  done: AtomicBool,
  done_notify: Notify,
  // Set by `clear`: retries are no longer resubmitted.
  discarding: AtomicBool,
  producers: AtomicUsize,
  consumers: AtomicUsize,
  abandoned: AtomicBool,
}

impl<T: Send + 'static> Link<T> {
  /// Creates an open link. `capacity == 0` means unbounded.
  pub fn new(name: impl Into<String>, capacity: usize) -> Self {
    Self {
      name: name.into(),
      capacity,
      queue: Mutex::new(LinkQueue {
        items: VecDeque::new(),
        unfinished: 0,
      }),
      available: Notify::new(),
      slots: (capacity > 0).then(|| Semaphore::new(capacity)),
      done: AtomicBool::new(false),
      done_notify: Notify::new(),
      discarding: AtomicBool::new(false),
      producers: AtomicUsize::new(0),
      consumers: AtomicUsize::new(0),
      abandoned: AtomicBool::new(false),
    }
  }

  /// Creates the synthetic, already-complete input link of a head worker,
  /// holding `seeds` as successful envelopes.
  pub fn seeded(name: impl Into<String>, seeds: Vec<T>) -> Self {
    let link = Self::new(name, 0);
    link.seed(seeds);
    link
  }

  /// Loads a head worker's seeds and latches completion. Seeds are dropped
  /// if the link was already cleared by a kill. Returns the number queued.
  pub(crate) fn seed(&self, seeds: Vec<T>) -> usize {
    let queued = {
      let mut queue = self.queue.lock();
      if self.discarding.load(Ordering::SeqCst) {
        0
      } else {
        let count = seeds.len();
        queue.unfinished += count;
        queue.items.extend(seeds.into_iter().map(|seed| Queued {
          envelope: Envelope::Ok(seed),
          retries: 0,
          holds_slot: false,
        }));
        count
      }
    };
    self.mark_done();
    if queued > 0 {
      self.available.notify_waiters();
    }
    queued
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Configured bound, `0` for unbounded.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Number of items currently queued (not counting claimed ones).
  pub fn len(&self) -> usize {
    self.queue.lock().items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Queued plus claimed-but-unsettled items.
  pub fn unfinished(&self) -> usize {
    self.queue.lock().unfinished
  }

  /// Pushes an envelope, waiting for a free slot on a bounded link.
  ///
  /// Returns `false` when the item was dropped because no consumer is left
  /// to ever take it.
  pub async fn push(&self, envelope: Envelope<T>) -> bool {
    if self.is_abandoned() {
      event!(Level::DEBUG, link = %self.name, "No consumers left, dropping item.");
      return false;
    }
    let holds_slot = match &self.slots {
      Some(slots) => match slots.acquire().await {
        Ok(permit) => {
          permit.forget();
          true
        }
        Err(_) => {
          event!(Level::DEBUG, link = %self.name, "Link abandoned while waiting for a slot, dropping item.");
          return false;
        }
      },
      None => false,
    };
    {
      let mut queue = self.queue.lock();
      queue.items.push_back(Queued {
        envelope,
        retries: 0,
        holds_slot,
      });
      queue.unfinished += 1;
    }
    self.available.notify_one();
    true
  }

  /// Puts a claimed item back at the tail without releasing its claim, so
  /// the unfinished count never touches zero in between. Bypasses capacity.
  ///
  /// Returns `false` (and settles the claim) when the link has been cleared.
  pub(crate) fn requeue(&self, item: Queued<T>) -> bool {
    let mut queue = self.queue.lock();
    if self.discarding.load(Ordering::SeqCst) {
      queue.unfinished = queue.unfinished.saturating_sub(1);
      return false;
    }
    queue.items.push_back(Queued {
      holds_slot: false,
      ..item
    });
    drop(queue);
    self.available.notify_one();
    true
  }

  /// Takes the next item without waiting.
  pub fn try_pop(&self) -> Option<Queued<T>> {
    let item = self.queue.lock().items.pop_front()?;
    if item.holds_slot {
      if let Some(slots) = &self.slots {
        slots.add_permits(1);
      }
    }
    Some(item)
  }

  /// Takes the next item, waiting at most `timeout` for one to arrive.
  ///
  /// A popped item stays counted as unfinished until [`task_done`](Self::task_done).
  pub async fn pop(&self, timeout: Duration) -> Option<Queued<T>> {
    let deadline = Instant::now() + timeout;
    loop {
      let notified = self.available.notified();
      if let Some(item) = self.try_pop() {
        return Some(item);
      }
      if tokio::time::timeout_at(deadline, notified).await.is_err() {
        return None;
      }
    }
  }

  /// Settles one claimed item.
  pub fn task_done(&self) {
    let mut queue = self.queue.lock();
    queue.unfinished = queue.unfinished.saturating_sub(1);
  }

  /// Latches the completion signal. Idempotent; never unset.
  pub fn mark_done(&self) {
    if !self.done.swap(true, Ordering::SeqCst) {
      event!(Level::TRACE, link = %self.name, "Link marked complete.");
    }
    self.done_notify.notify_waiters();
  }

  pub fn is_done(&self) -> bool {
    self.done.load(Ordering::SeqCst)
  }

  /// Resolves once the completion signal is set.
  pub async fn closed(&self) {
    loop {
      let notified = self.done_notify.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();
      if self.is_done() {
        return;
      }
      notified.await;
    }
  }

  /// A consumer may stop once no more input can ever arrive: the link is
  /// complete, every upstream producer has finished, and nothing is queued
  /// or still being processed.
  pub fn is_drained(&self) -> bool {
    self.is_done() && self.producers.load(Ordering::SeqCst) == 0 && self.unfinished() == 0
  }

  /// Discards every queued, unclaimed item. Claimed items are untouched.
  /// Returns the number of discarded items.
  pub fn clear(&self) -> usize {
    self.discarding.store(true, Ordering::SeqCst);
    let cleared: Vec<Queued<T>> = {
      let mut queue = self.queue.lock();
      let cleared: Vec<_> = queue.items.drain(..).collect();
      queue.unfinished = queue.unfinished.saturating_sub(cleared.len());
      cleared
    };
    let released = cleared.iter().filter(|item| item.holds_slot).count();
    if released > 0 {
      if let Some(slots) = &self.slots {
        slots.add_permits(released);
      }
    }
    if !cleared.is_empty() {
      event!(Level::DEBUG, link = %self.name, discarded = cleared.len(), "Cleared queued items.");
    }
    cleared.len()
  }

  /// Registers one upstream worker. Must happen before any worker runs.
  pub fn register_producer(&self) {
    self.producers.fetch_add(1, Ordering::SeqCst);
  }

  /// Counts down one upstream worker; the last one latches completion.
  pub fn producer_finished(&self) {
    let previous = self
      .producers
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .unwrap_or(0);
    if previous <= 1 {
      self.mark_done();
    }
  }

  /// Registers one downstream worker. Must happen before any worker runs.
  pub fn register_consumer(&self) {
    self.consumers.fetch_add(1, Ordering::SeqCst);
  }

  /// Counts down one downstream worker; once none is left, pushes are dropped.
  pub fn consumer_finished(&self) {
    let previous = self
      .consumers
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .unwrap_or(0);
    if previous <= 1 {
      self.abandoned.store(true, Ordering::SeqCst);
      if let Some(slots) = &self.slots {
        slots.close();
      }
    }
  }

  pub fn is_abandoned(&self) -> bool {
    self.abandoned.load(Ordering::SeqCst)
  }
}

impl<T: Send + 'static> fmt::Debug for Link<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Link")
      .field("name", &self.name)
      .field("capacity", &self.capacity)
      .field("queued", &self.len())
      .field("unfinished", &self.unfinished())
      .field("done", &self.is_done())
      .finish()
  }
}

/// Type-erased control surface the orchestrator keeps for every link it owns.
pub trait LinkControl: Send + Sync {
  fn name(&self) -> &str;
  fn mark_done(&self);
  fn is_done(&self) -> bool;
  fn clear(&self) -> usize;
  fn len(&self) -> usize;
  fn producer_finished(&self);
  fn consumer_finished(&self);
}

impl<T: Send + 'static> LinkControl for Link<T> {
  fn name(&self) -> &str {
    Link::name(self)
  }

  fn mark_done(&self) {
    Link::mark_done(self)
  }

  fn is_done(&self) -> bool {
    Link::is_done(self)
  }

  fn clear(&self) -> usize {
    Link::clear(self)
  }

  fn len(&self) -> usize {
    Link::len(self)
  }

  fn producer_finished(&self) {
    Link::producer_finished(self)
  }

  fn consumer_finished(&self) {
    Link::consumer_finished(self)
  }
}
