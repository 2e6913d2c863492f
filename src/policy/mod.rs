//! Reopening policies for the open state.
//!
//! Both policies consume the same weighted health rating computed from the
//! current metrics snapshot and the age of the open period. The stochastic
//! gate treats the rating, clamped to [0, 1], as a per-attempt admission
//! probability; the scored gate compares it against a fixed decision
//! threshold. Past the configured maximum open duration the rating is forced
//! to positive infinity, so both gates admit unconditionally.

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

use crate::config::{RatingWeights, ReopeningPolicy};
use crate::metrics::HealthSnapshot;

/// Runtime form of a [`ReopeningPolicy`], owned by one breaker instance.
///
/// The stochastic variant carries its own random generator so breakers stay
/// independent of each other and reproducible under a seed.
#[derive(Debug)]
pub(crate) enum AdmissionGate {
    Stochastic {
        weights: RatingWeights,
        rng: Mutex<SmallRng>,
    },
    Scored {
        weights: RatingWeights,
        decision_threshold: f32,
    },
}

impl AdmissionGate {
    pub(crate) fn new(policy: &ReopeningPolicy, seed: Option<u64>) -> Self {
        match policy {
            ReopeningPolicy::Stochastic { weights } => {
                let rng = match seed {
                    Some(seed) => SmallRng::seed_from_u64(seed),
                    None => SmallRng::from_entropy(),
                };
                Self::Stochastic {
                    weights: *weights,
                    rng: Mutex::new(rng),
                }
            }
            ReopeningPolicy::Scored {
                weights,
                decision_threshold,
            } => Self::Scored {
                weights: *weights,
                decision_threshold: *decision_threshold,
            },
        }
    }

    /// Decide whether one admission attempt passes.
    ///
    /// Pure apart from the stochastic draw; callers may invoke it from any
    /// number of threads.
    pub(crate) fn grants(
        &self,
        snapshot: &HealthSnapshot,
        elapsed_open: Duration,
        max_open: Duration,
    ) -> bool {
        match self {
            Self::Stochastic { weights, rng } => {
                let probability =
                    health_rating(weights, snapshot, elapsed_open, max_open).clamp(0.0, 1.0);
                let draw: f32 = rng.lock().gen();
                let granted = draw < probability;
                debug!(probability, draw, granted, "stochastic admission draw");
                granted
            }
            Self::Scored {
                weights,
                decision_threshold,
            } => {
                let rating = health_rating(weights, snapshot, elapsed_open, max_open);
                let granted = rating >= *decision_threshold;
                debug!(
                    rating,
                    threshold = *decision_threshold,
                    granted,
                    "scored admission check"
                );
                granted
            }
        }
    }
}

/// Weighted health rating of an open breaker.
///
/// `weights.failure` and `weights.slow` reward low failure and slow-call
/// rates, `weights.success` rewards a high success rate, and `weights.time`
/// rewards an aging open period relative to `max_open`. Rates below the
/// minimum-sample floor enter the formula as literal 0.0 per term, so with
/// sparse data the failure and slow terms contribute their full weight and
/// the rating leans toward reopening early; weights should be tuned with
/// that in mind. Past `max_open` the rating is positive infinity regardless
/// of the snapshot.
fn health_rating(
    weights: &RatingWeights,
    snapshot: &HealthSnapshot,
    elapsed_open: Duration,
    max_open: Duration,
) -> f32 {
    if elapsed_open > max_open {
        return f32::INFINITY;
    }
    let failure = snapshot.failure_rate().unwrap_or(0.0);
    let slow = snapshot.slow_call_rate().unwrap_or(0.0);
    let success = snapshot.success_rate().unwrap_or(0.0);
    let open_fraction = elapsed_open.as_secs_f32() / max_open.as_secs_f32();

    weights.failure * (1.0 - failure)
        + weights.slow * (1.0 - slow)
        + weights.success * success
        + weights.time * open_fraction
}
