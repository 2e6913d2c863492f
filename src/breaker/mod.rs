//! Circuit breaker facade and state machine.
//!
//! [`CircuitBreaker`] wires the sliding-window metrics, the threshold check,
//! and the reopening policy into the two-state admission protocol: closed
//! admits everything and watches for threshold breaches; open asks the
//! policy per attempt and counts what it turns away. The active state lives
//! behind a `parking_lot::RwLock` as one replaceable object: a transition
//! claims the departure guard of the instance it observed, then installs a
//! successor only while that instance is still current, so concurrent
//! transitions and resets never trample each other.

mod state;


pub use state::State;

use parking_lot::RwLock;
use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CircuitBreakerConfig;
use crate::error::{BreakerError, BreakerResult};
use crate::metrics::{CallMetrics, HealthSnapshot};
use crate::policy::AdmissionGate;
use state::{ActiveState, ClosedState, OpenState};

/// Read-only metrics report for one breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerMetrics {
    snapshot: HealthSnapshot,
    not_permitted_calls: u64,
}

impl BreakerMetrics {
    /// Sliding-window aggregates at the time of the read.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot
    }

    /// Calls rejected while open since construction or the last reset.
    #[must_use]
    pub fn not_permitted_calls(&self) -> u64 {
        self.not_permitted_calls
    }
}

/// Two-state adaptive circuit breaker.
///
/// The breaker never invokes the protected operation itself. Callers ask for
/// admission, run the call, measure its duration, and report the outcome
/// back:
///
/// ```
/// use reclose::{CircuitBreaker, CircuitBreakerConfig, State};
/// use std::time::Duration;
///
/// let config = CircuitBreakerConfig {
///     window_size: 10,
///     minimum_number_of_calls: 5,
///     failure_rate_threshold: 50.0,
///     ..Default::default()
/// };
/// let breaker = CircuitBreaker::with_config("payments", config)?;
///
/// if breaker.try_acquire_permission() {
///     // ... invoke the protected call here, measuring its duration ...
///     breaker.on_success(Duration::from_millis(30));
/// }
/// assert_eq!(breaker.state(), State::Closed);
/// # Ok::<(), reclose::BreakerError>(())
/// ```
///
/// All operations are safe under arbitrary concurrency; share the breaker
/// behind an [`Arc`].
pub struct CircuitBreaker {
    /// Name given at construction, carried into every log line.
    name: String,
    /// Immutable configuration.
    config: CircuitBreakerConfig,
    /// Reopening policy evaluator for the open state.
    gate: AdmissionGate,
    /// Time source for open-period ages.
    clock: Arc<dyn Clock>,
    /// Active state; replaced wholesale on every transition.
    state: RwLock<Arc<ActiveState>>,
    /// Completed state replacements, resets included.
    transitions: AtomicU64,
}

impl CircuitBreaker {
    /// A breaker with the default configuration and the process clock.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::assemble(
            name.into(),
            CircuitBreakerConfig::default(),
            Arc::new(SystemClock),
            None,
        )
    }

    /// A breaker with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::InvalidConfig`] when the configuration fails
    /// [`CircuitBreakerConfig::validate`].
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> BreakerResult<Self> {
        config.validate()?;
        Ok(Self::assemble(
            name.into(),
            config,
            Arc::new(SystemClock),
            None,
        ))
    }

    /// A builder for injecting a clock or an RNG seed alongside the config.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
            clock: Arc::new(SystemClock),
            rng_seed: None,
        }
    }

    /// Construction for callers that have already validated the
    /// configuration, such as the registry.
    pub(crate) fn with_validated_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::assemble(name.into(), config, Arc::new(SystemClock), None)
    }

    fn assemble(
        name: String,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        rng_seed: Option<u64>,
    ) -> Self {
        let metrics = Arc::new(CallMetrics::new(&config));
        let gate = AdmissionGate::new(&config.reopening_policy, rng_seed);
        Self {
            name,
            gate,
            clock,
            state: RwLock::new(Arc::new(ActiveState::closed(metrics))),
            transitions: AtomicU64::new(0),
            config,
        }
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Ask for admission without failing.
    ///
    /// Closed admits unconditionally. Open evaluates the reopening policy
    /// against the current snapshot and the age of the open period; a grant
    /// closes the breaker (exactly once across concurrent callers) and
    /// admits, a denial bumps the rejection counter.
    #[must_use]
    pub fn try_acquire_permission(&self) -> bool {
        let current = self.current();
        match &*current {
            ActiveState::Closed(_) => true,
            ActiveState::Open(open) => self.try_acquire_while_open(&current, open),
        }
    }

    /// Ask for admission, failing on denial.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::CallNotPermitted`] when the reopening policy
    /// denies the attempt.
    pub fn acquire_permission(&self) -> BreakerResult<()> {
        if self.try_acquire_permission() {
            Ok(())
        } else {
            Err(BreakerError::call_not_permitted(&self.name))
        }
    }

    /// Hand back a permission without recording an outcome.
    ///
    /// A no-op while closed. While open this is a protocol violation: the
    /// open state never hands out permissions that could be returned.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::UnsupportedOperation`] while open.
    pub fn release_permission(&self) -> BreakerResult<()> {
        match self.state() {
            State::Closed => Ok(()),
            State::Open => Err(BreakerError::unsupported(
                &self.name,
                "releasing a permission in the open state",
            )),
        }
    }

    fn try_acquire_while_open(&self, current: &Arc<ActiveState>, open: &OpenState) -> bool {
        if open.is_departing() {
            // A concurrent caller is mid-transition back to closed; admit.
            return true;
        }
        let snapshot = open.metrics.snapshot();
        let elapsed = self.clock.now().saturating_duration_since(open.opened_at);
        if self
            .gate
            .grants(&snapshot, elapsed, self.config.max_open_duration)
        {
            if open.begin_departure()
                && self.install(current, ActiveState::closed(Arc::clone(&open.metrics)))
            {
                info!(breaker = %self.name, elapsed_open = ?elapsed, "circuit breaker closed");
            }
            true
        } else {
            open.metrics.on_call_rejected();
            debug!(breaker = %self.name, elapsed_open = ?elapsed, "call not permitted");
            false
        }
    }

    // =========================================================================
    // Outcome recording
    // =========================================================================

    /// Record a successful call of the given duration.
    pub fn on_success(&self, duration: Duration) {
        self.record_success(duration);
    }

    /// Record a failed call, classifying `cause` through the configured
    /// predicates first: ignored errors release the permission instead of
    /// recording, errors the record-as-failure predicate declines are
    /// recorded as successes, everything else as a failure.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::UnsupportedOperation`] when an ignored error
    /// tries to release a permission while the breaker is open.
    pub fn on_error(
        &self,
        duration: Duration,
        cause: &(dyn StdError + Send + Sync + 'static),
    ) -> BreakerResult<()> {
        if let Some(ignore) = &self.config.ignore_predicate {
            if ignore(cause) {
                debug!(breaker = %self.name, error = %cause, "error ignored");
                return self.release_permission();
            }
        }
        let record_as_failure = self
            .config
            .record_failure_predicate
            .as_ref()
            .map_or(true, |predicate| predicate(cause));
        if record_as_failure {
            self.record_error(duration);
        } else {
            self.record_success(duration);
        }
        Ok(())
    }

    /// Record a call that completed with `value`, consulting the
    /// record-result predicate to decide whether the value counts as a
    /// failure despite the call not erroring.
    pub fn on_result(&self, duration: Duration, value: &dyn Any) {
        let failure = self
            .config
            .record_result_predicate
            .as_ref()
            .map_or(false, |predicate| predicate(value));
        if failure {
            debug!(breaker = %self.name, "result recorded as failure");
            self.record_error(duration);
        } else {
            self.record_success(duration);
        }
    }

    fn record_success(&self, duration: Duration) {
        let current = self.current();
        match &*current {
            ActiveState::Closed(closed) => {
                let snapshot = closed.metrics.record_success(duration);
                self.trip_if_breached(&current, closed, &snapshot);
            }
            ActiveState::Open(open) => {
                open.metrics.record_success(duration);
            }
        }
    }

    fn record_error(&self, duration: Duration) {
        let current = self.current();
        match &*current {
            ActiveState::Closed(closed) => {
                let snapshot = closed.metrics.record_error(duration);
                self.trip_if_breached(&current, closed, &snapshot);
            }
            ActiveState::Open(open) => {
                open.metrics.record_error(duration);
            }
        }
    }

    /// Closed-path threshold check. The departure guard lets exactly one of
    /// any number of concurrent breaching recorders open the breaker.
    fn trip_if_breached(
        &self,
        current: &Arc<ActiveState>,
        closed: &ClosedState,
        snapshot: &HealthSnapshot,
    ) {
        let check = closed.metrics.classify(snapshot);
        if check.is_breach()
            && closed.begin_departure()
            && self.install(
                current,
                ActiveState::open(Arc::clone(&closed.metrics), self.clock.now()),
            )
        {
            warn!(
                breaker = %self.name,
                check = ?check,
                failure_rate = ?snapshot.failure_rate(),
                slow_call_rate = ?snapshot.slow_call_rate(),
                "circuit breaker opened"
            );
        }
    }

    // =========================================================================
    // Administrative transitions
    // =========================================================================

    /// Force the breaker open, keeping the accumulated metrics.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::IllegalTransition`] when already open.
    pub fn transition_to_open(&self) -> BreakerResult<()> {
        let current = self.current();
        let ActiveState::Closed(closed) = &*current else {
            return Err(BreakerError::illegal_transition(
                &self.name,
                State::Open,
                State::Open,
            ));
        };
        if closed.begin_departure()
            && self.install(
                &current,
                ActiveState::open(Arc::clone(&closed.metrics), self.clock.now()),
            )
        {
            warn!(breaker = %self.name, "circuit breaker opened by request");
        }
        Ok(())
    }

    /// Force the breaker closed, keeping the accumulated metrics.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::IllegalTransition`] when already closed.
    pub fn transition_to_closed(&self) -> BreakerResult<()> {
        let current = self.current();
        let ActiveState::Open(open) = &*current else {
            return Err(BreakerError::illegal_transition(
                &self.name,
                State::Closed,
                State::Closed,
            ));
        };
        if open.begin_departure()
            && self.install(&current, ActiveState::closed(Arc::clone(&open.metrics)))
        {
            info!(breaker = %self.name, "circuit breaker closed by request");
        }
        Ok(())
    }

    /// Discard all history and return to the closed state.
    ///
    /// Unlike the other transitions this replaces the active state
    /// unconditionally, metrics included, and wins over any transition
    /// racing with it.
    pub fn reset(&self) {
        let metrics = Arc::new(CallMetrics::new(&self.config));
        *self.state.write() = Arc::new(ActiveState::closed(metrics));
        self.transitions.fetch_add(1, Ordering::Relaxed);
        info!(breaker = %self.name, "circuit breaker reset");
    }

    // =========================================================================
    // Unsupported state variants
    // =========================================================================

    /// Half-open probing does not exist in this model.
    ///
    /// # Errors
    ///
    /// Always returns [`BreakerError::UnsupportedOperation`].
    pub fn transition_to_half_open(&self) -> BreakerResult<()> {
        Err(BreakerError::unsupported(
            &self.name,
            "transition to half-open state",
        ))
    }

    /// Disabling admission control does not exist in this model.
    ///
    /// # Errors
    ///
    /// Always returns [`BreakerError::UnsupportedOperation`].
    pub fn transition_to_disabled(&self) -> BreakerResult<()> {
        Err(BreakerError::unsupported(
            &self.name,
            "transition to disabled state",
        ))
    }

    /// Pinning the breaker open does not exist in this model.
    ///
    /// # Errors
    ///
    /// Always returns [`BreakerError::UnsupportedOperation`].
    pub fn transition_to_forced_open(&self) -> BreakerResult<()> {
        Err(BreakerError::unsupported(
            &self.name,
            "transition to forced-open state",
        ))
    }

    /// Recording without admission control does not exist in this model.
    ///
    /// # Errors
    ///
    /// Always returns [`BreakerError::UnsupportedOperation`].
    pub fn transition_to_metrics_only(&self) -> BreakerResult<()> {
        Err(BreakerError::unsupported(
            &self.name,
            "transition to metrics-only state",
        ))
    }

    /// Opening for a fixed duration does not exist in this model; the open
    /// state ages out through the reopening policy instead.
    ///
    /// # Errors
    ///
    /// Always returns [`BreakerError::UnsupportedOperation`].
    pub fn transition_to_open_for(&self, _duration: Duration) -> BreakerResult<()> {
        Err(BreakerError::unsupported(
            &self.name,
            "timed open transitions",
        ))
    }

    /// Opening until a deadline does not exist in this model.
    ///
    /// # Errors
    ///
    /// Always returns [`BreakerError::UnsupportedOperation`].
    pub fn transition_to_open_until(&self, _deadline: Instant) -> BreakerResult<()> {
        Err(BreakerError::unsupported(
            &self.name,
            "timed open transitions",
        ))
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Name given at construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Immutable configuration given at construction.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state.read().kind()
    }

    /// Read-only view of the current metrics.
    #[must_use]
    pub fn metrics(&self) -> BreakerMetrics {
        let current = self.current();
        let metrics = current.metrics();
        BreakerMetrics {
            snapshot: metrics.snapshot(),
            not_permitted_calls: metrics.not_permitted_calls(),
        }
    }

    /// Completed state replacements since construction, resets included.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    fn current(&self) -> Arc<ActiveState> {
        Arc::clone(&self.state.read())
    }

    /// Install `next` in place of `departed`. Returns false when the active
    /// state is no longer the instance the caller departed from, such as
    /// after a racing reset; the claimed departure then dies with its
    /// instance.
    fn install(&self, departed: &Arc<ActiveState>, next: ActiveState) -> bool {
        let mut current = self.state.write();
        if Arc::ptr_eq(&current, departed) {
            *current = Arc::new(next);
            drop(current);
            self.transitions.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            drop(current);
            debug!(breaker = %self.name, "state transition superseded");
            false
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`CircuitBreaker`] with injected collaborators.
///
/// Only needed when a deployment wants a non-default clock or a fixed RNG
/// seed; plain construction goes through [`CircuitBreaker::new`] or
/// [`CircuitBreaker::with_config`].
pub struct CircuitBreakerBuilder {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    rng_seed: Option<u64>,
}

impl CircuitBreakerBuilder {
    /// Use this configuration instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Read time from `clock` instead of the process clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seed the stochastic policy's random generator for reproducibility.
    #[must_use]
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Validate the configuration and assemble the breaker.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn build(self) -> BreakerResult<CircuitBreaker> {
        self.config.validate()?;
        Ok(CircuitBreaker::assemble(
            self.name,
            self.config,
            self.clock,
            self.rng_seed,
        ))
    }
}

impl fmt::Debug for CircuitBreakerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("rng_seed", &self.rng_seed)
            .finish_non_exhaustive()
    }
}
