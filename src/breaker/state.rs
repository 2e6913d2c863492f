//! State objects for the two-state machine.
//!
//! Each transition builds a fresh [`ActiveState`] and installs it wholesale;
//! a published state instance is never mutated apart from its departure
//! guard. The guard is a one-shot atomic flag owned by the instance: of any
//! number of concurrent callers trying to depart the same state, exactly one
//! claims it and goes on to install the successor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::CallMetrics;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Normal operation; calls are admitted unconditionally and their
    /// outcomes feed the sliding window.
    Closed,
    /// Load shedding; every admission attempt is put to the reopening
    /// policy.
    Open,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
        }
    }
}

/// One-shot claim on departing a state instance.
#[derive(Debug, Default)]
struct DepartureGuard(AtomicBool);

impl DepartureGuard {
    /// Claim the departure. True for exactly one caller per instance.
    fn claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Closed state: unconditional admission, threshold watching.
#[derive(Debug)]
pub(crate) struct ClosedState {
    /// Window shared with the state this one was entered from.
    pub(crate) metrics: Arc<CallMetrics>,
    guard: DepartureGuard,
}

impl ClosedState {
    /// Claim the closed-to-open departure; true for exactly one caller.
    pub(crate) fn begin_departure(&self) -> bool {
        self.guard.claim()
    }
}

/// Open state: policy-gated admission, rejection counting.
#[derive(Debug)]
pub(crate) struct OpenState {
    /// Window shared with the state this one was entered from.
    pub(crate) metrics: Arc<CallMetrics>,
    /// When this open period began, by the breaker's clock.
    pub(crate) opened_at: Instant,
    guard: DepartureGuard,
}

impl OpenState {
    /// Claim the open-to-closed departure; true for exactly one caller.
    pub(crate) fn begin_departure(&self) -> bool {
        self.guard.claim()
    }

    /// True once some caller has claimed the departure. Admission
    /// short-circuits to permit at that point instead of re-running the
    /// policy against a state on its way out.
    pub(crate) fn is_departing(&self) -> bool {
        self.guard.claimed()
    }
}

/// The state object held by the breaker's shared cell.
#[derive(Debug)]
pub(crate) enum ActiveState {
    Closed(ClosedState),
    Open(OpenState),
}

impl ActiveState {
    pub(crate) fn closed(metrics: Arc<CallMetrics>) -> Self {
        Self::Closed(ClosedState {
            metrics,
            guard: DepartureGuard::default(),
        })
    }

    pub(crate) fn open(metrics: Arc<CallMetrics>, opened_at: Instant) -> Self {
        Self::Open(OpenState {
            metrics,
            opened_at,
            guard: DepartureGuard::default(),
        })
    }

    pub(crate) fn kind(&self) -> State {
        match self {
            Self::Closed(_) => State::Closed,
            Self::Open(_) => State::Open,
        }
    }

    pub(crate) fn metrics(&self) -> &Arc<CallMetrics> {
        match self {
            Self::Closed(closed) => &closed.metrics,
            Self::Open(open) => &open.metrics,
        }
    }
}
