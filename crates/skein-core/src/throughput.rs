//! Event-rate measurement.
//!
//! One [`ThroughputMonitor`] belongs to one ingestion loop. It is fed the
//! current instant on every consumed event so that it never reads a clock
//! itself, which keeps it deterministic under test.

use std::{
  fmt,
  time::{Duration, Instant},
};

/// Number of events between two rate reports.
pub const REPORT_EVERY: u64 = 1000;

/// Intervals shorter than this are too short to divide by.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A measured event rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
  PerMinute(f64),
  /// The interval was too short to yield a meaningful figure.
  Unbounded,
}

impl Rate {
  pub fn per_minute(&self) -> Option<f64> {
    match self {
      Self::PerMinute(r) => Some(*r),
      Self::Unbounded => None,
    }
  }
}

impl fmt::Display for Rate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::PerMinute(r) => write!(f, "{r:.1} events/min"),
      Self::Unbounded => f.write_str("unbounded"),
    }
  }
}

/// Emitted once every [`REPORT_EVERY`] events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateReport {
  pub events:  u64,
  pub elapsed: Duration,
  pub rate:    Rate,
}

#[derive(Debug, Clone)]
pub struct ThroughputMonitor {
  count:       u64,
  last_report: Instant,
}

impl ThroughputMonitor {
  pub fn new(start: Instant) -> Self { Self { count: 0, last_report: start } }

  /// Events counted since the last report.
  pub fn pending(&self) -> u64 { self.count }

  /// Count one consumed event. Returns a report when the threshold is reached,
  /// after which the counter and the reference instant are reset.
  pub fn record(&mut self, now: Instant) -> Option<RateReport> {
    self.count += 1;
    if self.count < REPORT_EVERY {
      return None;
    }

    let elapsed = now.saturating_duration_since(self.last_report);
    let rate = if elapsed < MIN_INTERVAL {
      Rate::Unbounded
    } else {
      Rate::PerMinute(self.count as f64 / (elapsed.as_secs_f64() / 60.0))
    };
    let report = RateReport { events: self.count, elapsed, rate };

    self.count = 0;
    self.last_report = now;
    Some(report)
  }
}
