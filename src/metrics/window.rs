//! Fixed-capacity ring buffer of call outcomes.
//!
//! The window holds the last `capacity` outcomes in arrival order and keeps
//! per-category aggregate counts in step with every insert and eviction, so
//! rate derivation never walks the buffer.

use std::time::Duration;

/// Outcome of one completed call, classified on the two orthogonal axes
/// success/failure and fast/slow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallOutcome {
    Success,
    SlowSuccess,
    Error,
    SlowError,
}

impl CallOutcome {
    /// Classify a completed call. A call is slow when its duration strictly
    /// exceeds the configured slow-call threshold.
    pub(crate) fn classified(success: bool, duration: Duration, slow_threshold: Duration) -> Self {
        match (success, duration > slow_threshold) {
            (true, false) => Self::Success,
            (true, true) => Self::SlowSuccess,
            (false, false) => Self::Error,
            (false, true) => Self::SlowError,
        }
    }
}

/// Aggregate counts per outcome category for the buffered entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OutcomeCounts {
    pub(crate) successes: u32,
    pub(crate) slow_successes: u32,
    pub(crate) errors: u32,
    pub(crate) slow_errors: u32,
}

impl OutcomeCounts {
    fn add(&mut self, outcome: CallOutcome) {
        match outcome {
            CallOutcome::Success => self.successes += 1,
            CallOutcome::SlowSuccess => self.slow_successes += 1,
            CallOutcome::Error => self.errors += 1,
            CallOutcome::SlowError => self.slow_errors += 1,
        }
    }

    fn remove(&mut self, outcome: CallOutcome) {
        match outcome {
            CallOutcome::Success => self.successes -= 1,
            CallOutcome::SlowSuccess => self.slow_successes -= 1,
            CallOutcome::Error => self.errors -= 1,
            CallOutcome::SlowError => self.slow_errors -= 1,
        }
    }

    pub(crate) fn total(&self) -> u32 {
        self.successes + self.slow_successes + self.errors + self.slow_errors
    }

    pub(crate) fn successful(&self) -> u32 {
        self.successes + self.slow_successes
    }

    pub(crate) fn failed(&self) -> u32 {
        self.errors + self.slow_errors
    }

    pub(crate) fn slow(&self) -> u32 {
        self.slow_successes + self.slow_errors
    }
}

/// Ring buffer with FIFO eviction and O(1) aggregate maintenance.
#[derive(Debug)]
pub(crate) struct SlidingWindow {
    slots: Box<[Option<CallOutcome>]>,
    head: usize,
    counts: OutcomeCounts,
}

impl SlidingWindow {
    /// An empty window. `capacity` must be positive; configuration
    /// validation guarantees it before construction.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            head: 0,
            counts: OutcomeCounts::default(),
        }
    }

    /// Insert `outcome`, evicting the oldest buffered entry once the window
    /// is full. Aggregates are adjusted by exactly the evicted and inserted
    /// categories.
    pub(crate) fn record(&mut self, outcome: CallOutcome) {
        if let Some(evicted) = self.slots[self.head].replace(outcome) {
            self.counts.remove(evicted);
        }
        self.counts.add(outcome);
        self.head = (self.head + 1) % self.slots.len();
    }

    pub(crate) fn counts(&self) -> OutcomeCounts {
        self.counts
    }
}
