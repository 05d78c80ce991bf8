use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TransportError;

/// How the wait between retries grows with the attempt number.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `factor * 2^(attempt - 1)`.
    #[default]
    Exponential,
    /// `factor * attempt`.
    Linear,
    /// Constant `factor`.
    None,
}

/// Side-effect callback invoked before each retry with the upcoming attempt
/// number (1-indexed) and the error that triggered it.
#[derive(Clone)]
pub struct OnRetry(Arc<dyn Fn(u32, &TransportError) + Send + Sync>);

impl OnRetry {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u32, &TransportError) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub(crate) fn call(&self, attempt: u32, error: &TransportError) {
        (self.0)(attempt, error)
    }
}

impl fmt::Debug for OnRetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnRetry(<callback>)")
    }
}

/// Retry behavior applied to one call.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt. `0` disables retry.
    pub max_retries: u32,
    pub backoff_strategy: BackoffStrategy,
    /// Base unit scaled by the backoff strategy. [`Duration::ZERO`] is valid
    /// and retries immediately.
    pub delay_factor: Duration,
    pub on_retry: Option<OnRetry>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_strategy: BackoffStrategy::Exponential,
            delay_factor: Duration::from_millis(500),
            on_retry: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// A zero `delay_factor` retries without waiting.
    pub fn with_backoff(mut self, strategy: BackoffStrategy, delay_factor: Duration) -> Self {
        self.backoff_strategy = strategy;
        self.delay_factor = delay_factor;
        self
    }

    pub fn with_on_retry(mut self, on_retry: OnRetry) -> Self {
        self.on_retry = Some(on_retry);
        self
    }
}

/// Per-call retry override. `None` fields fall back to the client default.
#[derive(Clone, Debug, Default)]
pub struct RetryOverride {
    pub max_retries: Option<u32>,
    pub backoff_strategy: Option<BackoffStrategy>,
    pub delay_factor: Option<Duration>,
    pub on_retry: Option<OnRetry>,
}

impl RetryOverride {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn backoff_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = Some(strategy);
        self
    }

    /// Replaces the default factor; `Duration::ZERO` retries without waiting.
    pub fn delay_factor(mut self, delay_factor: Duration) -> Self {
        self.delay_factor = Some(delay_factor);
        self
    }

    pub fn on_retry(mut self, on_retry: OnRetry) -> Self {
        self.on_retry = Some(on_retry);
        self
    }
}

/// Merges a per-call override onto the client default.
///
/// Fields set on `override_policy` win, including an explicit
/// `max_retries` of `0`. The default policy is never modified.
pub fn resolve(default_policy: &RetryPolicy, override_policy: Option<&RetryOverride>) -> RetryPolicy {
    let Some(overrides) = override_policy else {
        return default_policy.clone();
    };

    RetryPolicy {
        max_retries: overrides.max_retries.unwrap_or(default_policy.max_retries),
        backoff_strategy: overrides
            .backoff_strategy
            .unwrap_or(default_policy.backoff_strategy),
        delay_factor: overrides.delay_factor.unwrap_or(default_policy.delay_factor),
        on_retry: overrides
            .on_retry
            .clone()
            .or_else(|| default_policy.on_retry.clone()),
    }
}
