//! Configuration for the sync engine.

use crate::classifier::ClassifierPolicy;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use zonesync_protocol::DatabaseScope;

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Name of the private-database zone holding lists, todos and shares.
    pub well_known_zone: String,
    /// Databases synced by `fetch_all_updates`.
    pub databases: Vec<DatabaseScope>,
    /// Error classification policy.
    pub classifier: ClassifierPolicy,
    /// Retry behavior of `fetch_all_updates_with_retry`.
    pub retry: RetryConfig,
    /// Buffered `RecordsChanged` events per subscriber.
    pub event_capacity: usize,
}

impl EngineConfig {
    /// Creates a configuration with the given well-known zone name.
    pub fn new(well_known_zone: impl Into<String>) -> Self {
        Self {
            well_known_zone: well_known_zone.into(),
            databases: vec![DatabaseScope::Private, DatabaseScope::Shared],
            classifier: ClassifierPolicy::default(),
            retry: RetryConfig::default(),
            event_capacity: 64,
        }
    }

    /// Sets the synced databases. Repeats are dropped, first position wins.
    pub fn with_databases(mut self, databases: impl IntoIterator<Item = DatabaseScope>) -> Self {
        let mut seen = HashSet::new();
        self.databases = databases
            .into_iter()
            .filter(|database| seen.insert(*database))
            .collect();
        self
    }

    /// Sets the classifier policy.
    pub fn with_classifier(mut self, policy: ClassifierPolicy) -> Self {
        self.classifier = policy;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-subscriber event buffer.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("todos")
    }
}

/// How `fetch_all_updates_with_retry` spaces out its attempts.
///
/// A server-suggested delay always wins when it is longer than the backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Syncs tried per database before giving up, the first one included.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Longest wait before jitter is added.
    pub max_delay: Duration,
    /// Growth of the wait per retry, never below 1.
    pub backoff_multiplier: f64,
    /// Adds up to a quarter of the wait at random.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration allowing `max_attempts` syncs.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Sets the wait before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the longest wait.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth per retry. Values below 1 (and NaN) become 1.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.add_jitter = jitter;
        self
    }

    /// Wait before retry number `retry`, counted from 1. Zero means "no wait".
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let steps = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let growth = self.backoff_multiplier.max(1.0).powi(steps);
        let secs = (self.initial_delay.as_secs_f64() * growth).min(self.max_delay.as_secs_f64());
        let spread = if self.add_jitter {
            rand::thread_rng().gen_range(0.0..=0.25)
        } else {
            0.0
        };
        Duration::try_from_secs_f64(secs * (1.0 + spread)).unwrap_or(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
