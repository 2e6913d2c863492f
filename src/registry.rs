//! Named breaker registry.
//!
//! Services usually run one breaker per downstream dependency. The registry
//! owns them by name, creates them on first use, and hands out shared
//! handles, so call sites never coordinate construction themselves.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::breaker::{CircuitBreaker, State};
use crate::config::CircuitBreakerConfig;
use crate::error::BreakerResult;

/// Concurrent map of named [`CircuitBreaker`] instances.
///
/// Lookups and get-or-create go through [`DashMap`], so any number of
/// threads can resolve breakers without an outer lock. Configuration is
/// validated once, when it enters the registry, never per lookup.
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// A registry creating breakers with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_config: CircuitBreakerConfig::default(),
            breakers: DashMap::new(),
        }
    }

    /// A registry creating breakers with `config` unless overridden per
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BreakerError::InvalidConfig`] when `config` fails
    /// validation.
    pub fn with_default_config(config: CircuitBreakerConfig) -> BreakerResult<Self> {
        config.validate()?;
        Ok(Self {
            default_config: config,
            breakers: DashMap::new(),
        })
    }

    /// The breaker registered under `name`, created with the registry's
    /// default configuration on first use.
    #[must_use]
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let entry = self.breakers.entry(name.to_owned()).or_insert_with(|| {
            debug!(breaker = name, "circuit breaker registered");
            Arc::new(CircuitBreaker::with_validated_config(
                name,
                self.default_config.clone(),
            ))
        });
        Arc::clone(&entry)
    }

    /// The breaker registered under `name`, created with `config` on first
    /// use. An already registered breaker keeps its original configuration;
    /// `config` is still validated either way so misconfiguration surfaces
    /// deterministically.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BreakerError::InvalidConfig`] when `config` fails
    /// validation.
    pub fn breaker_with_config(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> BreakerResult<Arc<CircuitBreaker>> {
        config.validate()?;
        let entry = self.breakers.entry(name.to_owned()).or_insert_with(|| {
            debug!(breaker = name, "circuit breaker registered");
            Arc::new(CircuitBreaker::with_validated_config(name, config))
        });
        Ok(Arc::clone(&entry))
    }

    /// The breaker registered under `name`, if any, without creating one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop `name` from the registry, returning the handle so in-flight
    /// holders keep working.
    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        let removed = self.breakers.remove(name).map(|(_, breaker)| breaker);
        if removed.is_some() {
            debug!(breaker = name, "circuit breaker removed");
        }
        removed
    }

    /// Handles to every registered breaker, in no particular order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Name and current state of every registered breaker.
    #[must_use]
    pub fn states(&self) -> Vec<(String, State)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    /// Number of registered breakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// True when no breaker has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
