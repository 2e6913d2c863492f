//! Circuit breaker configuration.
//!
//! Defines the sliding-window dimensions, the trip thresholds, the reopening
//! policy and its coefficients, and the optional predicates that classify
//! call errors and results before they are recorded. Configuration is
//! immutable once a breaker is constructed; [`CircuitBreakerConfig::validate`]
//! rejects inconsistent values up front.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants;
use crate::error::{BreakerError, BreakerResult};

/// Predicate over the error a protected call returned.
///
/// Receives the type-erased error and decides whether it should be ignored
/// or recorded as a failure, depending on which slot it is configured in.
pub type ErrorPredicate = Arc<dyn Fn(&(dyn StdError + Send + Sync + 'static)) -> bool + Send + Sync>;

/// Predicate over the value a protected call returned without erroring.
///
/// Returns true when the value should be recorded as a failure anyway.
pub type ResultPredicate = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

/// Coefficients of the weighted health rating.
///
/// The rating is `failure·(1 − failure_rate) + slow·(1 − slow_rate) +
/// success·success_rate + time·(elapsed_open / max_open_duration)`. Weights
/// are not required to sum to 1, so the rating's range depends on the
/// deployment's choice of coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingWeights {
    /// Weight of the inverted failure rate.
    pub failure: f32,
    /// Weight of the inverted slow-call rate.
    pub slow: f32,
    /// Weight of the success rate.
    pub success: f32,
    /// Weight of the elapsed-open fraction.
    pub time: f32,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            failure: constants::DEFAULT_FAILURE_WEIGHT,
            slow: constants::DEFAULT_SLOW_WEIGHT,
            success: constants::DEFAULT_SUCCESS_WEIGHT,
            time: constants::DEFAULT_TIME_WEIGHT,
        }
    }
}

impl RatingWeights {
    fn validate(&self) -> BreakerResult<()> {
        let all = [
            ("failure", self.failure),
            ("slow", self.slow),
            ("success", self.success),
            ("time", self.time),
        ];
        for (label, weight) in all {
            if !weight.is_finite() || weight < 0.0 {
                return Err(BreakerError::invalid_config(format!(
                    "rating weight '{label}' must be finite and non-negative (got {weight})"
                )));
            }
        }
        Ok(())
    }
}

/// How the open state decides whether to admit a call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReopeningPolicy {
    /// Draw a uniform random value per attempt and admit while it falls
    /// below the health rating clamped to [0, 1]. Admission frequency rises
    /// as the dependency looks healthier and as the open period ages.
    Stochastic {
        /// Coefficients of the health rating consumed as a probability.
        weights: RatingWeights,
    },
    /// Admit exactly when the health rating reaches a fixed threshold.
    /// Deterministic for a given snapshot and elapsed time.
    Scored {
        /// Coefficients of the health rating.
        weights: RatingWeights,
        /// Rating at or above which admission is granted. Because weights
        /// need not sum to 1, the meaningful range of this threshold is
        /// deployment-specific.
        decision_threshold: f32,
    },
}

impl ReopeningPolicy {
    /// Stochastic gating with the default coefficients.
    #[must_use]
    pub fn stochastic() -> Self {
        Self::Stochastic {
            weights: RatingWeights::default(),
        }
    }

    /// Scored gating with the default coefficients and decision threshold.
    #[must_use]
    pub fn scored() -> Self {
        Self::Scored {
            weights: RatingWeights::default(),
            decision_threshold: constants::DEFAULT_DECISION_THRESHOLD,
        }
    }

    fn validate(&self) -> BreakerResult<()> {
        match self {
            Self::Stochastic { weights } => weights.validate(),
            Self::Scored {
                weights,
                decision_threshold,
            } => {
                weights.validate()?;
                if !decision_threshold.is_finite() {
                    return Err(BreakerError::invalid_config(format!(
                        "decision_threshold must be finite (got {decision_threshold})"
                    )));
                }
                Ok(())
            }
        }
    }
}

impl Default for ReopeningPolicy {
    fn default() -> Self {
        Self::stochastic()
    }
}

/// Circuit breaker configuration.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    /// Capacity of the sliding window in call outcomes. Must be positive.
    pub window_size: usize,
    /// Buffered calls required before rates are trusted. Values above
    /// `window_size` are clamped down to it; must be at least one.
    pub minimum_number_of_calls: u32,
    /// Failure rate in percent at or above which the closed state trips.
    pub failure_rate_threshold: f32,
    /// Slow-call rate in percent at or above which the closed state trips.
    pub slow_call_rate_threshold: f32,
    /// Duration above which a recorded call counts as slow.
    pub slow_call_duration_threshold: Duration,
    /// Open-state age past which admission is granted unconditionally.
    pub max_open_duration: Duration,
    /// Admission policy used while open.
    pub reopening_policy: ReopeningPolicy,
    /// Errors matching this predicate are neither recorded nor counted;
    /// the permission is released instead.
    pub ignore_predicate: Option<ErrorPredicate>,
    /// Errors matching this predicate are recorded as failures; the rest
    /// are recorded as successes. `None` records every error as a failure.
    pub record_failure_predicate: Option<ErrorPredicate>,
    /// Returned values matching this predicate are recorded as failures
    /// even though the call did not error. `None` records every result as
    /// a success.
    pub record_result_predicate: Option<ResultPredicate>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: constants::DEFAULT_WINDOW_SIZE,
            minimum_number_of_calls: constants::DEFAULT_MINIMUM_CALLS,
            failure_rate_threshold: constants::DEFAULT_FAILURE_RATE_THRESHOLD,
            slow_call_rate_threshold: constants::DEFAULT_SLOW_CALL_RATE_THRESHOLD,
            slow_call_duration_threshold: constants::DEFAULT_SLOW_CALL_DURATION_THRESHOLD,
            max_open_duration: constants::DEFAULT_MAX_OPEN_DURATION,
            reopening_policy: ReopeningPolicy::default(),
            ignore_predicate: None,
            record_failure_predicate: None,
            record_result_predicate: None,
        }
    }
}

impl CircuitBreakerConfig {
    /// Check the configuration for values the engine cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::InvalidConfig`] naming the first offending
    /// field: a zero window, a zero minimum-call floor, a rate threshold
    /// outside (0, 100], a zero duration, or a malformed policy coefficient.
    pub fn validate(&self) -> BreakerResult<()> {
        if self.window_size == 0 {
            return Err(BreakerError::invalid_config(
                "window_size must be greater than zero",
            ));
        }
        if self.minimum_number_of_calls == 0 {
            return Err(BreakerError::invalid_config(
                "minimum_number_of_calls must be at least one",
            ));
        }
        for (label, threshold) in [
            ("failure_rate_threshold", self.failure_rate_threshold),
            ("slow_call_rate_threshold", self.slow_call_rate_threshold),
        ] {
            if !(threshold > 0.0 && threshold <= 100.0) {
                return Err(BreakerError::invalid_config(format!(
                    "{label} must be a percentage in (0, 100] (got {threshold})"
                )));
            }
        }
        if self.slow_call_duration_threshold.is_zero() {
            return Err(BreakerError::invalid_config(
                "slow_call_duration_threshold must be greater than zero",
            ));
        }
        if self.max_open_duration.is_zero() {
            return Err(BreakerError::invalid_config(
                "max_open_duration must be greater than zero",
            ));
        }
        self.reopening_policy.validate()
    }

    /// Minimum-call floor after clamping to the window capacity.
    pub(crate) fn clamped_minimum_calls(&self) -> u32 {
        let capacity = u32::try_from(self.window_size).unwrap_or(u32::MAX);
        self.minimum_number_of_calls.min(capacity)
    }
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("window_size", &self.window_size)
            .field("minimum_number_of_calls", &self.minimum_number_of_calls)
            .field("failure_rate_threshold", &self.failure_rate_threshold)
            .field("slow_call_rate_threshold", &self.slow_call_rate_threshold)
            .field(
                "slow_call_duration_threshold",
                &self.slow_call_duration_threshold,
            )
            .field("max_open_duration", &self.max_open_duration)
            .field("reopening_policy", &self.reopening_policy)
            .field("ignore_predicate", &self.ignore_predicate.is_some())
            .field(
                "record_failure_predicate",
                &self.record_failure_predicate.is_some(),
            )
            .field(
                "record_result_predicate",
                &self.record_result_predicate.is_some(),
            )
            .finish()
    }
}
