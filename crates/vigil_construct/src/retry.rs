//! Retry strategies for failed check runs.

use serde::{Deserialize, Serialize};
use vigil_core::{Diagnostic, DiagnosticSink};

/// How retries are spaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryStrategyType {
    /// Constant backoff
    Fixed,
    /// Backoff grows linearly
    Linear,
    /// Backoff doubles
    Exponential,
    /// One immediate retry
    SingleRetry,
    /// Never retry
    NoRetries,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStrategy {
    /// Strategy kind
    #[serde(rename = "type")]
    pub strategy_type: RetryStrategyType,
    /// Seconds before the first retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_backoff_seconds: Option<u32>,
    /// Retry attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Upper bound on time spent retrying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_seconds: Option<u32>,
    /// Retry in the region that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_region: Option<bool>,
}

const MAX_RETRIES: u32 = 10;
const MAX_DURATION_SECONDS: u32 = 600;
const MAX_BACKOFF_SECONDS: u32 = 600;

impl RetryStrategy {
    fn backoff(strategy_type: RetryStrategyType) -> Self {
        Self {
            strategy_type,
            base_backoff_seconds: Some(60),
            max_retries: Some(2),
            max_duration_seconds: Some(MAX_DURATION_SECONDS),
            same_region: Some(true),
        }
    }

    /// Constant backoff with default limits
    #[must_use]
    pub fn fixed() -> Self {
        Self::backoff(RetryStrategyType::Fixed)
    }

    /// Linear backoff with default limits
    #[must_use]
    pub fn linear() -> Self {
        Self::backoff(RetryStrategyType::Linear)
    }

    /// Exponential backoff with default limits
    #[must_use]
    pub fn exponential() -> Self {
        Self::backoff(RetryStrategyType::Exponential)
    }

    /// A single retry
    #[must_use]
    pub fn single_retry() -> Self {
        Self {
            strategy_type: RetryStrategyType::SingleRetry,
            base_backoff_seconds: Some(0),
            max_retries: Some(1),
            max_duration_seconds: None,
            same_region: Some(true),
        }
    }

    /// Disable retries
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            strategy_type: RetryStrategyType::NoRetries,
            base_backoff_seconds: None,
            max_retries: None,
            max_duration_seconds: None,
            same_region: None,
        }
    }

    /// Set retry attempts
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set base backoff
    #[must_use]
    pub fn with_base_backoff_seconds(mut self, seconds: u32) -> Self {
        self.base_backoff_seconds = Some(seconds);
        self
    }

    /// Set the time bound
    #[must_use]
    pub fn with_max_duration_seconds(mut self, seconds: u32) -> Self {
        self.max_duration_seconds = Some(seconds);
        self
    }

    /// Whether this disables retrying
    #[must_use]
    pub fn is_no_retries(&self) -> bool {
        self.strategy_type == RetryStrategyType::NoRetries
    }

    /// Range-check the numeric settings
    pub fn validate(&self, property: &str, diagnostics: &mut dyn DiagnosticSink) {
        if self.is_no_retries() {
            return;
        }
        if let Some(retries) = self.max_retries {
            if !(1..=MAX_RETRIES).contains(&retries) {
                diagnostics.add(Diagnostic::invalid_property_value(
                    property,
                    format!("maxRetries must be between 1 and {}, got {}.", MAX_RETRIES, retries),
                ));
            }
        }
        if let Some(duration) = self.max_duration_seconds {
            if duration > MAX_DURATION_SECONDS {
                diagnostics.add(Diagnostic::invalid_property_value(
                    property,
                    format!(
                        "maxDurationSeconds must be at most {}, got {}.",
                        MAX_DURATION_SECONDS, duration
                    ),
                ));
            }
        }
        if let Some(backoff) = self.base_backoff_seconds {
            if backoff > MAX_BACKOFF_SECONDS {
                diagnostics.add(Diagnostic::invalid_property_value(
                    property,
                    format!(
                        "baseBackoffSeconds must be at most {}, got {}.",
                        MAX_BACKOFF_SECONDS, backoff
                    ),
                ));
            }
        }
    }
}

/// Check the retry strategy and the deprecated `doubleCheck` flag together
pub fn validate_retry_settings(
    retry_strategy: Option<&RetryStrategy>,
    double_check: Option<bool>,
    diagnostics: &mut dyn DiagnosticSink,
) {
    if let Some(strategy) = retry_strategy {
        strategy.validate("retryStrategy", diagnostics);
    }
    let Some(double_check) = double_check else {
        return;
    };
    diagnostics.add(Diagnostic::deprecated_property(
        "doubleCheck",
        "Use a retryStrategy instead.",
    ));
    let retries = retry_strategy.is_some_and(|s| !s.is_no_retries());
    if double_check && retries {
        diagnostics.add(Diagnostic::conflicting_properties(
            "doubleCheck",
            "retryStrategy",
            "doubleCheck cannot be enabled together with a retry strategy.",
        ));
    }
}

/// Wire form of the retry settings
///
/// `NO_RETRIES` is sent as `null`; without an explicit double check it also
/// forces `doubleCheck: false` so the legacy default does not apply.
#[must_use]
pub fn retry_fields(
    retry_strategy: Option<&RetryStrategy>,
    double_check: Option<bool>,
) -> (Option<Option<&RetryStrategy>>, Option<bool>) {
    match retry_strategy {
        Some(strategy) if strategy.is_no_retries() => (Some(None), double_check.or(Some(false))),
        Some(strategy) => (Some(Some(strategy)), double_check),
        None => (None, double_check),
    }
}
