//! Sliding-window call metrics.
//!
//! [`CallMetrics`] is the accumulating collector a breaker carries across
//! state transitions: a lock-protected ring of the most recent call outcomes
//! plus a separate counter of calls rejected while open. Snapshots derive
//! failure, slow-call, and success rates from the buffered counts, reporting
//! `None` until the window holds the configured minimum number of calls.

mod window;


use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::CircuitBreakerConfig;

pub(crate) use window::CallOutcome;
use window::{OutcomeCounts, SlidingWindow};

/// Point-in-time view of the sliding window.
///
/// Rates are fractions in [0, 1] and report `None` while the window holds
/// fewer calls than the configured minimum, so callers can tell "no failures
/// observed" apart from "not enough data to judge".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSnapshot {
    total_calls: u32,
    successful_calls: u32,
    failed_calls: u32,
    slow_successful_calls: u32,
    slow_failed_calls: u32,
    failure_rate: Option<f32>,
    slow_call_rate: Option<f32>,
    success_rate: Option<f32>,
}

impl HealthSnapshot {
    pub(crate) fn from_counts(counts: OutcomeCounts, minimum_calls: u32) -> Self {
        let total = counts.total();
        let rate = |count: u32| {
            if total >= minimum_calls && total > 0 {
                Some(count as f32 / total as f32)
            } else {
                None
            }
        };
        Self {
            total_calls: total,
            successful_calls: counts.successful(),
            failed_calls: counts.failed(),
            slow_successful_calls: counts.slow_successes,
            slow_failed_calls: counts.slow_errors,
            failure_rate: rate(counts.failed()),
            slow_call_rate: rate(counts.slow()),
            success_rate: rate(counts.successful()),
        }
    }

    /// Number of outcomes currently buffered, at most the window size.
    #[must_use]
    pub fn total_calls(&self) -> u32 {
        self.total_calls
    }

    /// Buffered successful calls, fast and slow.
    #[must_use]
    pub fn successful_calls(&self) -> u32 {
        self.successful_calls
    }

    /// Buffered failed calls, fast and slow.
    #[must_use]
    pub fn failed_calls(&self) -> u32 {
        self.failed_calls
    }

    /// Buffered slow calls regardless of outcome.
    #[must_use]
    pub fn slow_calls(&self) -> u32 {
        self.slow_successful_calls + self.slow_failed_calls
    }

    /// Buffered calls that were slow and succeeded.
    #[must_use]
    pub fn slow_successful_calls(&self) -> u32 {
        self.slow_successful_calls
    }

    /// Buffered calls that were slow and failed.
    #[must_use]
    pub fn slow_failed_calls(&self) -> u32 {
        self.slow_failed_calls
    }

    /// Fraction of buffered calls that failed, or `None` below the
    /// minimum-sample floor.
    #[must_use]
    pub fn failure_rate(&self) -> Option<f32> {
        self.failure_rate
    }

    /// Fraction of buffered calls that were slow, or `None` below the
    /// minimum-sample floor.
    #[must_use]
    pub fn slow_call_rate(&self) -> Option<f32> {
        self.slow_call_rate
    }

    /// Fraction of buffered calls that succeeded, or `None` below the
    /// minimum-sample floor.
    #[must_use]
    pub fn success_rate(&self) -> Option<f32> {
        self.success_rate
    }
}

/// Result of comparing a snapshot against the configured trip thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThresholdCheck {
    /// Not enough buffered calls to judge; takes precedence over the
    /// numeric comparisons.
    BelowMinimumSamples,
    /// Rates are known and below both thresholds.
    BelowThresholds,
    /// The failure rate alone reached its threshold.
    FailureAboveThreshold,
    /// The slow-call rate alone reached its threshold.
    SlowAboveThreshold,
    /// Both rates reached their thresholds.
    BothAboveThreshold,
}

impl ThresholdCheck {
    /// True when the check justifies tripping the breaker open.
    pub(crate) fn is_breach(self) -> bool {
        matches!(
            self,
            Self::FailureAboveThreshold | Self::SlowAboveThreshold | Self::BothAboveThreshold
        )
    }
}

/// The metrics collector carried by both breaker states.
///
/// Recording and snapshotting take a short mutex over the ring; the
/// rejection counter is a relaxed atomic beside it because it never has to
/// be coherent with the window contents.
#[derive(Debug)]
pub(crate) struct CallMetrics {
    window: Mutex<SlidingWindow>,
    not_permitted_calls: AtomicU64,
    minimum_calls: u32,
    failure_rate_threshold: f32,
    slow_call_rate_threshold: f32,
    slow_call_duration_threshold: Duration,
}

impl CallMetrics {
    pub(crate) fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            window: Mutex::new(SlidingWindow::with_capacity(config.window_size)),
            not_permitted_calls: AtomicU64::new(0),
            minimum_calls: config.clamped_minimum_calls(),
            failure_rate_threshold: config.failure_rate_threshold,
            slow_call_rate_threshold: config.slow_call_rate_threshold,
            slow_call_duration_threshold: config.slow_call_duration_threshold,
        }
    }

    /// Record a successful call and return the snapshot including it.
    pub(crate) fn record_success(&self, duration: Duration) -> HealthSnapshot {
        self.record(CallOutcome::classified(
            true,
            duration,
            self.slow_call_duration_threshold,
        ))
    }

    /// Record a failed call and return the snapshot including it.
    pub(crate) fn record_error(&self, duration: Duration) -> HealthSnapshot {
        self.record(CallOutcome::classified(
            false,
            duration,
            self.slow_call_duration_threshold,
        ))
    }

    fn record(&self, outcome: CallOutcome) -> HealthSnapshot {
        let counts = {
            let mut window = self.window.lock();
            window.record(outcome);
            window.counts()
        };
        HealthSnapshot::from_counts(counts, self.minimum_calls)
    }

    /// Current aggregates without recording anything.
    pub(crate) fn snapshot(&self) -> HealthSnapshot {
        let counts = self.window.lock().counts();
        HealthSnapshot::from_counts(counts, self.minimum_calls)
    }

    /// Compare a snapshot's rates against the trip thresholds.
    pub(crate) fn classify(&self, snapshot: &HealthSnapshot) -> ThresholdCheck {
        match (snapshot.failure_rate(), snapshot.slow_call_rate()) {
            (Some(failure), Some(slow)) => {
                let failure_breach = failure * 100.0 >= self.failure_rate_threshold;
                let slow_breach = slow * 100.0 >= self.slow_call_rate_threshold;
                match (failure_breach, slow_breach) {
                    (true, true) => ThresholdCheck::BothAboveThreshold,
                    (true, false) => ThresholdCheck::FailureAboveThreshold,
                    (false, true) => ThresholdCheck::SlowAboveThreshold,
                    (false, false) => ThresholdCheck::BelowThresholds,
                }
            }
            _ => ThresholdCheck::BelowMinimumSamples,
        }
    }

    /// Count a call rejected by the open state. Reporting-only; does not
    /// touch the window.
    pub(crate) fn on_call_rejected(&self) {
        self.not_permitted_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Calls rejected while open since this collector was created.
    pub(crate) fn not_permitted_calls(&self) -> u64 {
        self.not_permitted_calls.load(Ordering::Relaxed)
    }
}
