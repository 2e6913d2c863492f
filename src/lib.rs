// =============================================================================
// Lint Configuration
// =============================================================================

// Safety: nothing in this crate needs unsafe
#![deny(unsafe_code)]
// Correctness: Must handle all fallible operations
#![deny(unused_must_use)]
// Quality: Pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]

// Allowed with documented reasons
#![allow(clippy::module_name_repetitions)] // e.g., config::CircuitBreakerConfig is clearer
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation
#![allow(clippy::doc_markdown)] // Too many false positives in code docs
#![allow(clippy::cast_precision_loss)] // u32 window counts sit far below f32 precision limits

//! Adaptive circuit breaker with stochastic reopening.
//!
//! `reclose` guards calls to an unreliable dependency with a two-state
//! admission protocol:
//!
//! - **Closed**: every call is admitted; outcomes land in a fixed sliding
//!   window and are checked against failure-rate and slow-call-rate
//!   thresholds after each record.
//! - **Open**: each attempt consults the configured [`ReopeningPolicy`],
//!   which rates current health and either admits the call, closing the
//!   breaker again, or rejects it and counts the rejection.
//!
//! There is no half-open probe phase and no fixed cooldown. The breaker
//! recloses the way a power-line recloser does: admission chances rise as
//! recorded health improves and as the open period ages toward
//! [`CircuitBreakerConfig::max_open_duration`], past which admission is
//! unconditional.
//!
//! # Example
//!
//! ```
//! use reclose::{CircuitBreaker, CircuitBreakerConfig, State};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::with_config(
//!     "inventory",
//!     CircuitBreakerConfig {
//!         window_size: 50,
//!         minimum_number_of_calls: 10,
//!         failure_rate_threshold: 50.0,
//!         ..Default::default()
//!     },
//! )?;
//!
//! for _ in 0..10 {
//!     if breaker.try_acquire_permission() {
//!         // Invoke the dependency here, clocking the call.
//!         breaker.on_success(Duration::from_millis(12));
//!     }
//! }
//! assert_eq!(breaker.state(), State::Closed);
//! # Ok::<(), reclose::BreakerError>(())
//! ```
//!
//! A breaker is cheap to share behind [`std::sync::Arc`]. For the usual
//! one-breaker-per-dependency setup, [`BreakerRegistry`] owns them by name.

/// The circuit breaker itself: admission, outcome recording, transitions.
pub mod breaker;

/// Injectable monotonic time source, with a manual clock for tests.
pub mod clock;

/// Configuration types: thresholds, reopening policy, outcome predicates.
pub mod config;

/// Centralized defaults with documented rationale.
pub mod constants;

/// Error type and result alias for every fallible breaker operation.
pub mod error;

/// Sliding-window call metrics and health snapshots.
pub mod metrics;

/// Named breaker registry for one-breaker-per-dependency deployments.
pub mod registry;

mod policy;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use breaker::{BreakerMetrics, CircuitBreaker, CircuitBreakerBuilder, State};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CircuitBreakerConfig, ErrorPredicate, RatingWeights, ReopeningPolicy, ResultPredicate,
};
pub use error::{BreakerError, BreakerResult};
pub use metrics::HealthSnapshot;
pub use registry::BreakerRegistry;
