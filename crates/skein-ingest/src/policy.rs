//! Retry and failure-budget policies for store calls.

use std::{
  collections::VecDeque,
  time::{Duration, Instant},
};

use serde::Deserialize;

/// Upper bound on a single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(30);

// ─── Retry ───────────────────────────────────────────────────────────────────

/// Exponential backoff for a single store call.
///
/// `max_attempts` counts the first try, so `1` disables retries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  pub max_attempts:  u32,
  pub base_delay_ms: u64,
  pub multiplier:    f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, base_delay_ms: 100, multiplier: 2.0 }
  }
}

impl RetryPolicy {
  /// A single attempt, no waiting.
  pub fn none() -> Self {
    Self { max_attempts: 1, base_delay_ms: 0, multiplier: 1.0 }
  }

  /// Sleep before attempt `failed + 1`, where `failed >= 1` attempts have
  /// already failed.
  pub fn delay_after(&self, failed: u32) -> Duration {
    let exponent = failed.saturating_sub(1).min(i32::MAX as u32) as i32;
    let factor = self.multiplier.max(1.0).powi(exponent);
    let millis = self.base_delay_ms as f64 * factor;
    if !millis.is_finite() || millis >= MAX_DELAY.as_millis() as f64 {
      return MAX_DELAY;
    }
    Duration::from_millis(millis as u64)
  }
}

// ─── Store failure policy ────────────────────────────────────────────────────

/// What the ingestion loop does after a store call has exhausted its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum StoreFailurePolicy {
  /// Log, count, and move on to the next event.
  #[default]
  Continue,
  /// Stop the loop on the first failure.
  Fatal,
  /// Stop once `max_failures` failures fall within `window_secs`.
  Budget { max_failures: u32, window_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Continue,
  Exhausted { failures: usize },
}

/// Sliding-window failure counter driven by a [`StoreFailurePolicy`].
#[derive(Debug)]
pub struct FailureBudget {
  policy: StoreFailurePolicy,
  recent: VecDeque<Instant>,
}

impl FailureBudget {
  pub fn new(policy: StoreFailurePolicy) -> Self {
    Self { policy, recent: VecDeque::new() }
  }

  /// Count one failure observed at `now`.
  pub fn record(&mut self, now: Instant) -> Verdict {
    match self.policy {
      StoreFailurePolicy::Continue => Verdict::Continue,
      StoreFailurePolicy::Fatal => Verdict::Exhausted { failures: 1 },
      StoreFailurePolicy::Budget { max_failures, window_secs } => {
        let window = Duration::from_secs(window_secs);
        self.recent.push_back(now);
        while let Some(&oldest) = self.recent.front() {
          if now.saturating_duration_since(oldest) > window {
            self.recent.pop_front();
          } else {
            break;
          }
        }
        if self.recent.len() >= max_failures.max(1) as usize {
          Verdict::Exhausted { failures: self.recent.len() }
        } else {
          Verdict::Continue
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_grows_by_multiplier() {
    let retry = RetryPolicy { max_attempts: 5, base_delay_ms: 100, multiplier: 2.0 };
    assert_eq!(retry.delay_after(1), Duration::from_millis(100));
    assert_eq!(retry.delay_after(2), Duration::from_millis(200));
    assert_eq!(retry.delay_after(3), Duration::from_millis(400));
  }

  #[test]
  fn backoff_is_capped() {
    let retry = RetryPolicy { max_attempts: 100, base_delay_ms: 1_000, multiplier: 10.0 };
    assert_eq!(retry.delay_after(50), MAX_DELAY);
  }

  #[test]
  fn continue_never_exhausts() {
    let mut budget = FailureBudget::new(StoreFailurePolicy::Continue);
    let now = Instant::now();
    for _ in 0..1_000 {
      assert_eq!(budget.record(now), Verdict::Continue);
    }
  }

  #[test]
  fn fatal_exhausts_immediately() {
    let mut budget = FailureBudget::new(StoreFailurePolicy::Fatal);
    assert_eq!(budget.record(Instant::now()), Verdict::Exhausted { failures: 1 });
  }

  #[test]
  fn budget_counts_only_failures_inside_window() {
    let policy = StoreFailurePolicy::Budget { max_failures: 3, window_secs: 10 };
    let mut budget = FailureBudget::new(policy);
    let t0 = Instant::now();

    assert_eq!(budget.record(t0), Verdict::Continue);
    assert_eq!(budget.record(t0 + Duration::from_secs(1)), Verdict::Continue);
    // Both earlier failures have aged out by now.
    assert_eq!(budget.record(t0 + Duration::from_secs(12)), Verdict::Continue);
    assert_eq!(budget.record(t0 + Duration::from_secs(13)), Verdict::Continue);
    assert_eq!(
      budget.record(t0 + Duration::from_secs(14)),
      Verdict::Exhausted { failures: 3 }
    );
  }
}
