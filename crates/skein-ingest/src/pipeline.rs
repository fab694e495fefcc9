//! The ingestion loop.
//!
//! ```text
//!   EventSource ──(producer task)──▶ bounded mpsc ──▶ Ingestor
//!                                                      ├─ chain::resolve
//!                                                      ├─ PersistenceGate
//!                                                      └─ ThroughputMonitor
//! ```
//!
//! The producer pulls from the source until it ends, fails, or shutdown is
//! requested, then reports why through a oneshot and drops its sender. The
//! consumer processes one event at a time in arrival order and publishes an
//! [`IngestStats`] snapshot after each.

use std::{future::Future, sync::Arc, time::Instant};

use serde::Serialize;
use skein_core::{
  chain::{self, DEFAULT_MAX_CHAIN_LEN},
  post::Post,
  source::EventSource,
  store::DedupStore,
  throughput::ThroughputMonitor,
};
use strum::Display;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result,
  gate::{GateOutcome, PersistenceGate, WriteMode},
  policy::{FailureBudget, RetryPolicy, StoreFailurePolicy, Verdict},
};

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
  Success,
  Failure,
}

/// Lifecycle of one [`Ingestor::run`].
///
/// `Running` until the source closes, `Draining` while already queued
/// events are processed, then `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
  #[default]
  Running,
  Draining,
  Terminated(Termination),
}

/// Counters published after every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
  pub state:                LoopState,
  pub events_consumed:      u64,
  pub posts_checked:        u64,
  pub authors_inserted:     u64,
  pub posts_inserted:       u64,
  pub truncated_chains:     u64,
  pub store_failures:       u64,
  /// Events still queued when a transport failure stopped the loop.
  pub discarded_events:     u64,
  pub rate_reports:         u64,
  /// `None` until the first report, or when the last window was too short.
  pub last_rate_per_minute: Option<f64>,
}

impl IngestStats {
  fn absorb(&mut self, outcome: GateOutcome) {
    self.posts_checked += outcome.posts_checked;
    self.authors_inserted += outcome.authors_inserted;
    self.posts_inserted += outcome.posts_inserted;
  }
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub queue_capacity:           usize,
  pub max_chain_len:            usize,
  pub write_mode:               WriteMode,
  pub drain_on_transport_error: bool,
  pub retry:                    RetryPolicy,
  pub store_failures:           StoreFailurePolicy,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      queue_capacity:           1024,
      max_chain_len:            DEFAULT_MAX_CHAIN_LEN,
      write_mode:               WriteMode::default(),
      drain_on_transport_error: true,
      retry:                    RetryPolicy::default(),
      store_failures:           StoreFailurePolicy::default(),
    }
  }
}

// ─── Producer ────────────────────────────────────────────────────────────────

/// Why the producer stopped pulling.
#[derive(Debug)]
enum SourceEnd {
  Exhausted,
  Shutdown,
  ConsumerGone,
  Failed(skein_core::Error),
}

async fn produce<Src, F>(
  mut source: Src,
  tx: mpsc::Sender<Post>,
  end_tx: oneshot::Sender<SourceEnd>,
  shutdown: F,
) where
  Src: EventSource,
  F: Future<Output = ()>,
{
  tokio::pin!(shutdown);
  let mut pulled: u64 = 0;

  let end = loop {
    let next = tokio::select! {
      biased;
      () = &mut shutdown => break SourceEnd::Shutdown,
      next = source.next() => next,
    };
    match next {
      Ok(Some(post)) => {
        pulled += 1;
        if tx.send(post).await.is_err() {
          break SourceEnd::ConsumerGone;
        }
      }
      Ok(None) => break SourceEnd::Exhausted,
      Err(e) => break SourceEnd::Failed(skein_core::Error::transport(e)),
    }
  };

  debug!(source = source.name(), pulled, reason = ?end, "producer stopped");
  // The consumer may already be gone.
  let _ = end_tx.send(end);
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

pub struct Ingestor<S> {
  gate:     PersistenceGate<S>,
  config:   PipelineConfig,
  monitor:  ThroughputMonitor,
  budget:   FailureBudget,
  stats:    IngestStats,
  stats_tx: watch::Sender<IngestStats>,
}

impl<S: DedupStore> Ingestor<S> {
  pub fn new(store: Arc<S>, config: PipelineConfig) -> Self {
    let gate = PersistenceGate::new(store, config.write_mode, config.retry.clone());
    let (stats_tx, _) = watch::channel(IngestStats::default());
    Self {
      gate,
      monitor: ThroughputMonitor::new(Instant::now()),
      budget: FailureBudget::new(config.store_failures),
      config,
      stats: IngestStats::default(),
      stats_tx,
    }
  }

  /// A receiver that sees every published [`IngestStats`] snapshot.
  pub fn subscribe(&self) -> watch::Receiver<IngestStats> { self.stats_tx.subscribe() }

  pub fn stats(&self) -> &IngestStats { &self.stats }

  pub fn state(&self) -> LoopState { self.stats.state }

  fn publish(&self) { self.stats_tx.send_replace(self.stats.clone()); }

  fn set_state(&mut self, state: LoopState) {
    if self.stats.state != state {
      info!(?state, "ingestion state changed");
      self.stats.state = state;
      self.publish();
    }
  }

  /// Resolve, persist and count one event.
  ///
  /// Store failures are absorbed according to the failure policy; `Err` is
  /// returned only when that policy says to stop.
  pub async fn ingest(&mut self, post: &Post) -> Result<()> {
    let chain = chain::resolve(post, self.config.max_chain_len);
    if let Some(truncation) = chain.truncation() {
      self.stats.truncated_chains += 1;
      let e = skein_core::Error::from(truncation);
      warn!(kind = %e.kind(), post = %post.id, error = %e, "persisting truncated chain prefix");
    }

    let mut outcome = GateOutcome::default();
    let persisted = self.gate.persist_chain(&chain, &mut outcome).await;
    self.stats.absorb(outcome);

    let mut fatal = None;
    if let Err(e) = persisted {
      self.stats.store_failures += 1;
      error!(kind = %e.kind(), post = %post.id, error = %e, "abandoning chain");
      if let Verdict::Exhausted { failures } = self.budget.record(Instant::now()) {
        fatal = Some(Error::StoreBudgetExhausted { failures, last: e });
      }
    }

    self.stats.events_consumed += 1;
    if let Some(report) = self.monitor.record(Instant::now()) {
      self.stats.rate_reports += 1;
      self.stats.last_rate_per_minute = report.rate.per_minute();
      info!(
        events = report.events,
        elapsed = ?report.elapsed,
        rate = %report.rate,
        total = self.stats.events_consumed,
        "throughput"
      );
    }
    self.publish();

    match fatal {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Consume `source` until it ends or `shutdown` resolves, then drain.
  ///
  /// Returns the final counters on a clean end of stream or shutdown. A
  /// transport failure or an exhausted store-failure budget is returned as
  /// `Err` once the loop has stopped.
  pub async fn run<Src, F>(mut self, source: Src, shutdown: F) -> Result<IngestStats>
  where
    Src: EventSource + 'static,
    F: Future<Output = ()> + Send + 'static,
  {
    let (tx, mut rx) = mpsc::channel(self.config.queue_capacity.max(1));
    let (end_tx, mut end_rx) = oneshot::channel();

    info!(
      source = source.name(),
      mode = %self.gate.mode(),
      queue = self.config.queue_capacity,
      "starting ingestion"
    );
    let producer = tokio::spawn(produce(source, tx, end_tx, shutdown));
    self.set_state(LoopState::Running);

    let mut ended = false;
    let mut transport_failure = None;

    loop {
      if !ended && let Ok(end) = end_rx.try_recv() {
        ended = true;
        match self.on_source_end(end) {
          Ok(()) => {}
          Err(e) if self.config.drain_on_transport_error => transport_failure = Some(e),
          Err(e) => {
            rx.close();
            while rx.try_recv().is_ok() {
              self.stats.discarded_events += 1;
            }
            warn!(discarded = self.stats.discarded_events, "discarding queued events");
            return self.fail(Error::Core(e));
          }
        }
      }

      let Some(post) = rx.recv().await else { break };
      if let Err(e) = self.ingest(&post).await {
        error!(error = %e, "store failure policy exhausted, stopping");
        producer.abort();
        return self.fail(e);
      }
    }

    // Every sender is gone, so the producer has finished.
    if let Err(e) = producer.await {
      return self.fail(e.into());
    }
    if !ended && let Ok(end) = end_rx.await {
      if let Err(e) = self.on_source_end(end) {
        transport_failure = Some(e);
      }
    }

    match transport_failure {
      Some(e) => self.fail(Error::Core(e)),
      None => {
        self.set_state(LoopState::Terminated(Termination::Success));
        info!(
          events = self.stats.events_consumed,
          posts = self.stats.posts_inserted,
          authors = self.stats.authors_inserted,
          "ingestion finished"
        );
        Ok(self.stats)
      }
    }
  }

  /// Log why the source stopped and enter `Draining`. Returns the transport
  /// failure, if that was the reason.
  fn on_source_end(&mut self, end: SourceEnd) -> skein_core::Result<()> {
    match end {
      SourceEnd::Exhausted => info!("source exhausted"),
      SourceEnd::Shutdown => info!("shutdown requested, closing source"),
      SourceEnd::ConsumerGone => {}
      SourceEnd::Failed(e) => {
        error!(kind = %e.kind(), error = %e, "event source failed");
        if self.config.drain_on_transport_error {
          self.set_state(LoopState::Draining);
        }
        return Err(e);
      }
    }
    self.set_state(LoopState::Draining);
    Ok(())
  }

  fn fail(&mut self, e: Error) -> Result<IngestStats> {
    self.set_state(LoopState::Terminated(Termination::Failure));
    Err(e)
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::atomic::Ordering, time::Duration};

  use skein_core::{
    ErrorKind,
    post::PostId,
    store::StoreOp,
    throughput::REPORT_EVERY,
  };

  use super::*;
  use crate::testing::{RecordingStore, ScriptedSource, Step, author, post};

  fn config() -> PipelineConfig {
    PipelineConfig { retry: RetryPolicy::none(), ..PipelineConfig::default() }
  }

  fn never() -> impl Future<Output = ()> + Send + 'static { std::future::pending() }

  #[tokio::test]
  async fn run_persists_every_event_and_succeeds() {
    let store = Arc::new(RecordingStore::default());
    let a = post(100, author(1, "u1"), None);
    let b = post(200, author(2, "u2"), Some(a.clone()));
    let source = ScriptedSource::posts([a.clone(), b, a]);

    let ingestor = Ingestor::new(store.clone(), config());
    let stats_rx = ingestor.subscribe();
    let stats = ingestor.run(source, never()).await.unwrap();

    assert_eq!(stats.events_consumed, 3);
    assert_eq!(stats.posts_checked, 4);
    assert_eq!(stats.posts_inserted, 2);
    assert_eq!(stats.authors_inserted, 2);
    assert_eq!(stats.state, LoopState::Terminated(Termination::Success));
    assert_eq!(store.post_rows(), 2);
    assert_eq!(*stats_rx.borrow(), stats);
  }

  #[tokio::test]
  async fn transport_failure_drains_then_fails() {
    let store = Arc::new(RecordingStore::default());
    let source = ScriptedSource::new([
      Step::Post(post(1, author(1, "u1"), None)),
      Step::Post(post(2, author(1, "u1"), None)),
      Step::Fail,
      Step::Post(post(3, author(1, "u1"), None)),
    ]);
    let pulls = source.pulls();

    let ingestor = Ingestor::new(store.clone(), config());
    let stats_rx = ingestor.subscribe();
    let err = ingestor.run(source, never()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(pulls.load(Ordering::SeqCst), 3);
    assert!(store.has_post(PostId(1)) && store.has_post(PostId(2)));
    assert!(!store.has_post(PostId(3)));

    let stats = stats_rx.borrow().clone();
    assert_eq!(stats.events_consumed, 2);
    assert_eq!(stats.discarded_events, 0);
    assert_eq!(stats.state, LoopState::Terminated(Termination::Failure));
  }

  #[tokio::test]
  async fn transport_failure_without_drain_discards_queue() {
    let store = Arc::new(RecordingStore::default());
    let mut steps: Vec<Step> = (1..=4).map(|id| Step::Post(post(id, author(1, "u1"), None))).collect();
    steps.push(Step::Fail);
    let source = ScriptedSource::new(steps);

    let cfg = PipelineConfig { drain_on_transport_error: false, ..config() };
    let ingestor = Ingestor::new(store.clone(), cfg);
    let stats_rx = ingestor.subscribe();
    let err = ingestor.run(source, never()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    let stats = stats_rx.borrow().clone();
    assert!(stats.discarded_events > 0);
    assert_eq!(stats.events_consumed + stats.discarded_events, 4);
    assert_eq!(stats.state, LoopState::Terminated(Termination::Failure));
  }

  #[tokio::test]
  async fn shutdown_closes_source_and_drains() {
    let store = Arc::new(RecordingStore::default());
    let source = ScriptedSource::posts([
      post(1, author(1, "u1"), None),
      post(2, author(2, "u2"), None),
    ])
    .hang_when_dry();

    let shutdown = tokio::time::sleep(Duration::from_millis(50));
    let stats = Ingestor::new(store.clone(), config())
      .run(source, shutdown)
      .await
      .unwrap();

    assert_eq!(stats.events_consumed, 2);
    assert_eq!(stats.state, LoopState::Terminated(Termination::Success));
    assert_eq!(store.post_rows(), 2);
  }

  #[tokio::test]
  async fn store_failure_is_counted_and_loop_continues() {
    let store = Arc::new(RecordingStore::default());
    store.fail(StoreOp::InsertPost, 1);
    let source = ScriptedSource::posts([
      post(1, author(1, "u1"), None),
      post(2, author(2, "u2"), None),
    ]);

    let stats = Ingestor::new(store.clone(), config()).run(source, never()).await.unwrap();

    assert_eq!(stats.store_failures, 1);
    assert_eq!(stats.events_consumed, 2);
    assert_eq!(stats.authors_inserted, 2);
    assert_eq!(stats.posts_inserted, 1);
    assert!(!store.has_post(PostId(1)));
    assert!(store.has_post(PostId(2)));
  }

  #[tokio::test]
  async fn fatal_policy_stops_on_first_store_failure() {
    let store = Arc::new(RecordingStore::default());
    store.fail(StoreOp::AuthorExists, 1);
    let source = ScriptedSource::posts([
      post(1, author(1, "u1"), None),
      post(2, author(2, "u2"), None),
    ]);

    let cfg = PipelineConfig { store_failures: StoreFailurePolicy::Fatal, ..config() };
    let err = Ingestor::new(store.clone(), cfg).run(source, never()).await.unwrap_err();

    assert!(matches!(err, Error::StoreBudgetExhausted { failures: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::Store);
    assert!(!store.has_post(PostId(2)));
  }

  #[tokio::test]
  async fn exhausted_budget_stops_the_loop() {
    let store = Arc::new(RecordingStore::default());
    store.fail(StoreOp::PostExists, usize::MAX);
    let source = ScriptedSource::posts((1..=5).map(|id| post(id, author(id, "u"), None)));

    let cfg = PipelineConfig {
      store_failures: StoreFailurePolicy::Budget { max_failures: 2, window_secs: 60 },
      ..config()
    };
    let ingestor = Ingestor::new(store.clone(), cfg);
    let stats_rx = ingestor.subscribe();
    let err = ingestor.run(source, never()).await.unwrap_err();

    assert!(matches!(err, Error::StoreBudgetExhausted { failures: 2, .. }));
    let stats = stats_rx.borrow().clone();
    assert_eq!(stats.events_consumed, 2);
    assert_eq!(stats.store_failures, 2);
    assert_eq!(stats.state, LoopState::Terminated(Termination::Failure));
  }

  #[tokio::test]
  async fn cyclic_chain_is_cut_and_its_prefix_persisted() {
    let store = Arc::new(RecordingStore::default());
    let looped = post(1, author(1, "a"), Some(post(2, author(2, "b"), Some(post(1, author(1, "a"), None)))));

    let mut ingestor = Ingestor::new(store.clone(), config());
    ingestor.ingest(&looped).await.unwrap();

    assert_eq!(ingestor.stats().truncated_chains, 1);
    assert_eq!(ingestor.stats().posts_inserted, 2);
    assert_eq!(store.post_rows(), 2);
  }

  #[tokio::test]
  async fn rate_is_reported_once_per_thousand_events() {
    let store = Arc::new(RecordingStore::default());
    let mut ingestor = Ingestor::new(store, config());
    let a = post(1, author(1, "u1"), None);

    for _ in 0..REPORT_EVERY - 1 {
      ingestor.ingest(&a).await.unwrap();
    }
    assert_eq!(ingestor.stats().rate_reports, 0);

    ingestor.ingest(&a).await.unwrap();
    assert_eq!(ingestor.stats().rate_reports, 1);
    assert_eq!(ingestor.stats().events_consumed, REPORT_EVERY);
  }

  #[tokio::test]
  async fn jsonl_into_sqlite_is_idempotent_across_runs() {
    use skein_store_sqlite::SqliteStore;

    use crate::source::JsonlSource;

    let original = post(1, author(1, "a"), None);
    let middle = post(2, author(2, "b"), Some(original.clone()));
    let top = post(3, author(3, "c"), Some(middle.clone()));
    let mut body = String::new();
    for p in [&original, &middle, &top] {
      body.push_str(&skein_wire::encode_line(p));
      body.push('\n');
    }
    let body = body.into_bytes();

    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());

    let first = JsonlSource::new("first", std::io::Cursor::new(body.clone()), false);
    let stats = Ingestor::new(store.clone(), config()).run(first, never()).await.unwrap();
    assert_eq!(stats.state, LoopState::Terminated(Termination::Success));
    assert_eq!(stats.events_consumed, 3);
    assert_eq!(stats.posts_inserted, 3);
    assert_eq!(stats.authors_inserted, 3);
    assert_eq!(store.count_posts().await.unwrap(), 3);
    assert_eq!(store.count_authors().await.unwrap(), 3);

    let second = JsonlSource::new("second", std::io::Cursor::new(body), false);
    let stats = Ingestor::new(store.clone(), config()).run(second, never()).await.unwrap();
    assert_eq!(stats.state, LoopState::Terminated(Termination::Success));
    assert_eq!(stats.events_consumed, 3);
    assert_eq!(stats.posts_inserted, 0);
    assert_eq!(stats.authors_inserted, 0);
    assert_eq!(store.count_posts().await.unwrap(), 3);
    assert_eq!(store.count_authors().await.unwrap(), 3);
  }
}
