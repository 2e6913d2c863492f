//! Centralized defaults for the circuit breaker.
//!
//! All magic numbers used by [`crate::CircuitBreakerConfig`] are defined here
//! with documented rationale, so deployments that override them know what
//! they are trading away.

use std::time::Duration;

// =============================================================================
// Sliding Window
// =============================================================================

/// Number of call outcomes retained in the sliding window.
///
/// Rationale: 100 outcomes keeps rate estimates stable against short bursts
/// while still reacting to a sustained failure pattern within one window's
/// worth of traffic.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Minimum number of buffered calls before rates are considered meaningful.
///
/// Rationale: below this floor every rate reports "unknown" and the closed
/// state never trips, preventing a handful of early failures from opening
/// the breaker. Clamped to the window size at construction.
pub const DEFAULT_MINIMUM_CALLS: u32 = 100;

// =============================================================================
// Thresholds
// =============================================================================

/// Failure-rate threshold in percent at or above which the breaker opens.
pub const DEFAULT_FAILURE_RATE_THRESHOLD: f32 = 50.0;

/// Slow-call-rate threshold in percent at or above which the breaker opens.
///
/// Rationale: 100% means slowness alone only trips the breaker when every
/// buffered call was slow; deployments that care about latency lower this.
pub const DEFAULT_SLOW_CALL_RATE_THRESHOLD: f32 = 100.0;

/// Duration above which a call counts as slow.
pub const DEFAULT_SLOW_CALL_DURATION_THRESHOLD: Duration = Duration::from_secs(60);

// =============================================================================
// Reopening
// =============================================================================

/// Hard cap on how long the open state may refuse calls on its own judgment.
///
/// Rationale: once a breaker has been open this long, the buffered rates
/// describe a dependency we have stopped observing. The health rating is
/// forced to positive infinity past this point so admission resumes
/// unconditionally and fresh outcomes refill the window.
pub const DEFAULT_MAX_OPEN_DURATION: Duration = Duration::from_secs(10);

/// Weight of the failure-rate term in the health rating.
pub const DEFAULT_FAILURE_WEIGHT: f32 = 0.4;

/// Weight of the slow-call-rate term in the health rating.
pub const DEFAULT_SLOW_WEIGHT: f32 = 0.15;

/// Weight of the success-rate term in the health rating.
pub const DEFAULT_SUCCESS_WEIGHT: f32 = 0.35;

/// Weight of the elapsed-open term in the health rating.
///
/// Rationale: a small time weight lets a fully failing dependency regain
/// admission gradually as the open period ages, instead of waiting for the
/// hard cap alone.
pub const DEFAULT_TIME_WEIGHT: f32 = 0.1;

/// Rating at or above which the scored policy grants admission.
///
/// Rationale: with the default weights the rating of a healthy, fully
/// sampled window sits near 0.9 and that of a fully failing one near 0.1
/// plus the time term, so 0.7 demands either good recent history or a
/// well-aged open period.
pub const DEFAULT_DECISION_THRESHOLD: f32 = 0.7;
