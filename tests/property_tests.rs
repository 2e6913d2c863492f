//! Property-based tests for the admission engine's invariants.
//!
//! These tests use proptest to verify invariants that must always hold,
//! regardless of the input. This catches edge cases that example-based
//! tests might miss.
//!
//! Run with:
//! ```bash
//! cargo test --test property_tests
//! ```

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Import from the library crate
// ============================================================================

use reclose::{
    CircuitBreaker, CircuitBreakerConfig, ManualClock, RatingWeights, ReopeningPolicy, State,
};

const FAST: Duration = Duration::from_millis(10);
const SLOW: Duration = Duration::from_millis(250);

fn io_error(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

fn zero_weights() -> RatingWeights {
    RatingWeights {
        failure: 0.0,
        slow: 0.0,
        success: 0.0,
        time: 0.0,
    }
}

/// Thresholds that classify per record but can never trip: nothing slower
/// than 100ms is sent and the failure threshold sits at 100% while at least
/// one success is always present.
fn never_trips(window: u32, minimum: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        window_size: window as usize,
        minimum_number_of_calls: minimum,
        failure_rate_threshold: 100.0,
        slow_call_rate_threshold: 100.0,
        slow_call_duration_threshold: Duration::from_millis(100),
        ..Default::default()
    }
}

// ============================================================================
// Sliding Window Property Tests
// ============================================================================

proptest! {
    /// Invariant: The window never reports more calls than its capacity
    ///
    /// Recording past capacity evicts the oldest outcome; the total must
    /// plateau at the window size no matter how much traffic flows through.
    #[test]
    fn the_window_never_overfills(
        window in 1u32..=32,
        records in 0u32..=96,
    ) {
        let breaker = CircuitBreaker::with_config("window", never_trips(window, window)).unwrap();
        for _ in 0..records {
            breaker.on_success(FAST);
        }
        let total = breaker.metrics().snapshot().total_calls();
        prop_assert_eq!(
            total,
            records.min(window),
            "window of {} reported {} calls after {} records",
            window, total, records
        );
    }

    /// Invariant: Snapshot counts always decompose
    ///
    /// Every recorded call is exactly one of successful or failed, and every
    /// slow call is exactly one of slow-successful or slow-failed.
    #[test]
    fn snapshot_counts_decompose(
        outcomes in prop::collection::vec((any::<bool>(), any::<bool>()), 0..96),
    ) {
        let breaker = CircuitBreaker::with_config("counts", never_trips(32, 32)).unwrap();
        for (is_error, is_slow) in &outcomes {
            let duration = if *is_slow { SLOW } else { FAST };
            if *is_error {
                breaker.on_error(duration, &io_error("boom")).unwrap();
            } else {
                breaker.on_success(duration);
            }
        }
        let snapshot = breaker.metrics().snapshot();
        prop_assert_eq!(
            snapshot.total_calls(),
            snapshot.successful_calls() + snapshot.failed_calls()
        );
        prop_assert_eq!(
            snapshot.slow_calls(),
            snapshot.slow_successful_calls() + snapshot.slow_failed_calls()
        );
        prop_assert!(snapshot.total_calls() <= 32);
    }

    /// Invariant: Rates appear exactly at the minimum sample count
    ///
    /// Below the configured minimum every rate is absent; at or above it
    /// every rate is present.
    #[test]
    fn rates_appear_at_the_minimum_sample(
        minimum in 1u32..=32,
        records in 0u32..=48,
    ) {
        let breaker = CircuitBreaker::with_config("minimum", never_trips(32, minimum)).unwrap();
        for _ in 0..records {
            breaker.on_success(FAST);
        }
        let snapshot = breaker.metrics().snapshot();
        let expected = records.min(32) >= minimum;
        prop_assert_eq!(snapshot.failure_rate().is_some(), expected);
        prop_assert_eq!(snapshot.slow_call_rate().is_some(), expected);
        prop_assert_eq!(snapshot.success_rate().is_some(), expected);
    }

    /// Invariant: Present rates are fractions that sum to one
    #[test]
    fn present_rates_are_consistent_fractions(
        failures in 0u32..=16,
        successes in 0u32..=16,
    ) {
        prop_assume!(failures + successes > 0);
        let breaker = CircuitBreaker::with_config(
            "fractions",
            CircuitBreakerConfig {
                window_size: 32,
                minimum_number_of_calls: 1,
                failure_rate_threshold: 100.0,
                slow_call_rate_threshold: 100.0,
                slow_call_duration_threshold: Duration::from_millis(100),
                ..Default::default()
            },
        )
        .unwrap();
        for _ in 0..successes {
            breaker.on_success(FAST);
        }
        for _ in 0..failures {
            breaker.on_error(FAST, &io_error("boom")).unwrap();
        }
        let snapshot = breaker.metrics().snapshot();
        let failure = snapshot.failure_rate().unwrap();
        let success = snapshot.success_rate().unwrap();
        prop_assert!((0.0..=1.0).contains(&failure));
        prop_assert!((0.0..=1.0).contains(&success));
        prop_assert!(
            (failure + success - 1.0).abs() < 1e-5,
            "failure {} and success {} rates should sum to one",
            failure, success
        );
    }
}

// ============================================================================
// Threshold Property Tests
// ============================================================================

proptest! {
    /// Invariant: The breaker opens exactly at the failure threshold
    ///
    /// With a full window of 20 calls and a 50% threshold, the tenth
    /// failure is the first state of the world that trips.
    #[test]
    fn the_breaker_opens_exactly_at_the_failure_threshold(failures in 0u32..=20) {
        let breaker = CircuitBreaker::with_config(
            "threshold",
            CircuitBreakerConfig {
                window_size: 20,
                minimum_number_of_calls: 20,
                failure_rate_threshold: 50.0,
                slow_call_rate_threshold: 100.0,
                slow_call_duration_threshold: Duration::from_millis(100),
                ..Default::default()
            },
        )
        .unwrap();
        for _ in 0..(20 - failures) {
            breaker.on_success(FAST);
        }
        for _ in 0..failures {
            breaker.on_error(FAST, &io_error("boom")).unwrap();
        }
        let expected = if failures >= 10 { State::Open } else { State::Closed };
        prop_assert_eq!(
            breaker.state(),
            expected,
            "{} failures out of 20 against a 50% threshold",
            failures
        );
        prop_assert_eq!(breaker.transition_count(), u64::from(failures >= 10));
    }

    /// Invariant: Below the minimum sample the breaker never opens
    ///
    /// Even a window that is 100% failures must not trip before the
    /// minimum number of calls has been observed.
    #[test]
    fn nothing_trips_below_the_minimum_sample(minimum in 1u32..=50) {
        let breaker = CircuitBreaker::with_config(
            "sparse",
            CircuitBreakerConfig {
                window_size: 50,
                minimum_number_of_calls: minimum,
                failure_rate_threshold: 50.0,
                slow_call_rate_threshold: 100.0,
                slow_call_duration_threshold: Duration::from_millis(100),
                ..Default::default()
            },
        )
        .unwrap();
        for _ in 0..(minimum - 1) {
            breaker.on_error(FAST, &io_error("boom")).unwrap();
        }
        prop_assert_eq!(breaker.state(), State::Closed);
        prop_assert_eq!(breaker.transition_count(), 0);
    }

    /// Invariant: Slow successes alone can trip the slow-call threshold
    #[test]
    fn slow_successes_trip_exactly_at_the_slow_threshold(slow in 0u32..=10) {
        let breaker = CircuitBreaker::with_config(
            "sluggish",
            CircuitBreakerConfig {
                window_size: 10,
                minimum_number_of_calls: 10,
                failure_rate_threshold: 100.0,
                slow_call_rate_threshold: 50.0,
                slow_call_duration_threshold: Duration::from_millis(100),
                ..Default::default()
            },
        )
        .unwrap();
        for _ in 0..(10 - slow) {
            breaker.on_success(FAST);
        }
        for _ in 0..slow {
            breaker.on_success(SLOW);
        }
        let expected = if slow >= 5 { State::Open } else { State::Closed };
        prop_assert_eq!(
            breaker.state(),
            expected,
            "{} slow calls out of 10 against a 50% threshold",
            slow
        );
    }
}

// ============================================================================
// Reopening Property Tests
// ============================================================================

proptest! {
    /// Invariant: A scored policy is a pure threshold on the health rating
    ///
    /// A window that recovered to 100% successes rates exactly the success
    /// weight, so admission flips precisely at that decision threshold.
    #[test]
    fn scored_admission_flips_at_the_decision_threshold(
        threshold in prop::sample::select(vec![0.0f32, 0.25, 0.5, 0.75, 1.0, 1.25, 2.0]),
    ) {
        let breaker = CircuitBreaker::with_config(
            "scored",
            CircuitBreakerConfig {
                window_size: 4,
                minimum_number_of_calls: 4,
                failure_rate_threshold: 100.0,
                slow_call_rate_threshold: 50.0,
                slow_call_duration_threshold: Duration::from_millis(100),
                reopening_policy: ReopeningPolicy::Scored {
                    weights: RatingWeights {
                        failure: 0.0,
                        slow: 0.0,
                        success: 1.0,
                        time: 0.0,
                    },
                    decision_threshold: threshold,
                },
                ..Default::default()
            },
        )
        .unwrap();
        // Trip through the slow-call threshold so the window stays
        // all-success and rates exactly 1.0.
        for _ in 0..4 {
            breaker.on_success(SLOW);
        }
        prop_assert_eq!(breaker.state(), State::Open);

        let expected = threshold <= 1.0;
        prop_assert_eq!(
            breaker.try_acquire_permission(),
            expected,
            "rating 1.0 against decision threshold {}",
            threshold
        );
    }

    /// Invariant: Any policy admits once the open period outlives the maximum
    #[test]
    fn an_aged_out_open_period_admits_under_any_policy(
        stochastic in any::<bool>(),
        max_open_ms in 100u64..=10_000,
        overshoot_ms in 1u64..=1_000,
    ) {
        let policy = if stochastic {
            ReopeningPolicy::Stochastic { weights: zero_weights() }
        } else {
            ReopeningPolicy::Scored { weights: zero_weights(), decision_threshold: 99.0 }
        };
        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::builder("valve")
            .config(CircuitBreakerConfig {
                window_size: 4,
                minimum_number_of_calls: 2,
                failure_rate_threshold: 50.0,
                slow_call_rate_threshold: 100.0,
                slow_call_duration_threshold: Duration::from_millis(100),
                max_open_duration: Duration::from_millis(max_open_ms),
                reopening_policy: policy,
                ..Default::default()
            })
            .clock(clock.clone())
            .build()
            .unwrap();
        breaker.on_error(FAST, &io_error("boom")).unwrap();
        breaker.on_error(FAST, &io_error("boom")).unwrap();
        prop_assert_eq!(breaker.state(), State::Open);

        prop_assert!(!breaker.try_acquire_permission());
        clock.advance(Duration::from_millis(max_open_ms + overshoot_ms));
        prop_assert!(breaker.try_acquire_permission());
        prop_assert_eq!(breaker.state(), State::Closed);
    }

    /// Invariant: Denied attempts are counted and never enter the window
    #[test]
    fn denials_are_counted_but_not_recorded(denials in 1u32..=50) {
        let breaker = CircuitBreaker::with_config(
            "denied",
            CircuitBreakerConfig {
                window_size: 4,
                minimum_number_of_calls: 2,
                failure_rate_threshold: 50.0,
                slow_call_rate_threshold: 100.0,
                slow_call_duration_threshold: Duration::from_millis(100),
                reopening_policy: ReopeningPolicy::Scored {
                    weights: zero_weights(),
                    decision_threshold: 0.5,
                },
                ..Default::default()
            },
        )
        .unwrap();
        breaker.on_error(FAST, &io_error("boom")).unwrap();
        breaker.on_error(FAST, &io_error("boom")).unwrap();

        for _ in 0..denials {
            prop_assert!(!breaker.try_acquire_permission());
        }
        let metrics = breaker.metrics();
        prop_assert_eq!(metrics.not_permitted_calls(), u64::from(denials));
        prop_assert_eq!(metrics.snapshot().total_calls(), 2);
    }

    /// Invariant: Equal seeds draw equal admission sequences
    #[test]
    fn equal_seeds_draw_equal_admission_sequences(
        seed in any::<u64>(),
        attempts in 1usize..=20,
    ) {
        let run = |seed: u64| -> Vec<bool> {
            let breaker = CircuitBreaker::builder("seeded")
                .config(CircuitBreakerConfig {
                    window_size: 2,
                    minimum_number_of_calls: 2,
                    failure_rate_threshold: 50.0,
                    slow_call_rate_threshold: 100.0,
                    slow_call_duration_threshold: Duration::from_millis(100),
                    reopening_policy: ReopeningPolicy::Stochastic {
                        weights: RatingWeights {
                            failure: 0.0,
                            slow: 0.0,
                            success: 1.0,
                            time: 0.0,
                        },
                    },
                    ..Default::default()
                })
                .rng_seed(seed)
                .build()
                .unwrap();
            // Half successes: the stochastic gate draws against 0.5.
            breaker.on_success(FAST);
            breaker.on_error(FAST, &io_error("boom")).unwrap();
            assert_eq!(breaker.state(), State::Open);
            (0..attempts).map(|_| breaker.try_acquire_permission()).collect()
        };
        prop_assert_eq!(run(seed), run(seed));
    }
}

// ============================================================================
// Reset Property Tests
// ============================================================================

proptest! {
    /// Invariant: Reset always restores a pristine closed breaker
    #[test]
    fn reset_restores_a_pristine_breaker(
        outcomes in prop::collection::vec(any::<bool>(), 0..40),
        denials in 0u32..=10,
    ) {
        let breaker = CircuitBreaker::with_config(
            "reset",
            CircuitBreakerConfig {
                window_size: 10,
                minimum_number_of_calls: 4,
                failure_rate_threshold: 50.0,
                slow_call_rate_threshold: 100.0,
                slow_call_duration_threshold: Duration::from_millis(100),
                reopening_policy: ReopeningPolicy::Scored {
                    weights: zero_weights(),
                    decision_threshold: 0.5,
                },
                ..Default::default()
            },
        )
        .unwrap();
        for is_error in outcomes {
            if is_error {
                breaker.on_error(FAST, &io_error("boom")).unwrap();
            } else {
                breaker.on_success(FAST);
            }
        }
        if breaker.state() == State::Open {
            for _ in 0..denials {
                let _ = breaker.try_acquire_permission();
            }
        }

        breaker.reset();
        prop_assert_eq!(breaker.state(), State::Closed);
        let metrics = breaker.metrics();
        prop_assert_eq!(metrics.snapshot().total_calls(), 0);
        prop_assert_eq!(metrics.not_permitted_calls(), 0);
        prop_assert!(breaker.try_acquire_permission());
    }
}
