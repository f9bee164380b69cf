//! Defaults cascade.
//!
//! A check's final properties come from the first source that defines each
//! key, nearest first: the check itself, its group's type-specific
//! defaults, the session's type-specific defaults, the group's generic
//! defaults, then the session's generic defaults. Winner takes all per key;
//! `Some(false)`, `Some(0)` and empty lists win like any other value.

use crate::check::{CheckType, EnvironmentVariable};
use crate::retry::RetryStrategy;
use serde::{Deserialize, Serialize};
use vigil_core::Ref;

/// Partial check properties usable as a fallback source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDefaults {
    /// Whether checks run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated: Option<bool>,
    /// Whether alerts are muted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    /// Legacy double check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_check: Option<bool>,
    /// Invert pass/fail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_fail: Option<bool>,
    /// Runtime id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<String>,
    /// Public locations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    /// Private location slugs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_locations: Option<Vec<String>>,
    /// Tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Minutes between runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<Vec<EnvironmentVariable>>,
    /// Alert channels to subscribe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_channels: Option<Vec<Ref>>,
    /// Retry strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_strategy: Option<RetryStrategy>,
    /// Run in all locations at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_parallel: Option<bool>,
}

/// Generic and type-specific defaults at one level (session or group)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultsScope {
    /// Applies to every check kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<ConfigDefaults>,
    /// Applies to browser checks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_checks: Option<ConfigDefaults>,
    /// Applies to multi-step checks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_step_checks: Option<ConfigDefaults>,
}

impl DefaultsScope {
    /// Generic defaults
    #[must_use]
    pub fn generic(&self) -> Option<&ConfigDefaults> {
        self.checks.as_ref()
    }

    /// Defaults for one check type, if that type has its own
    #[must_use]
    pub fn for_type(&self, check_type: CheckType) -> Option<&ConfigDefaults> {
        match check_type {
            CheckType::Browser => self.browser_checks.as_ref(),
            CheckType::MultiStep => self.multi_step_checks.as_ref(),
            _ => None,
        }
    }
}

/// Ordered fallback sources, highest precedence first
#[derive(Debug, Clone, Default)]
pub struct DefaultsCascade<'a> {
    sources: Vec<&'a ConfigDefaults>,
}

impl<'a> DefaultsCascade<'a> {
    /// Build from optional sources, skipping absent ones
    #[must_use]
    pub fn new<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a ConfigDefaults>>,
    {
        Self {
            sources: sources.into_iter().flatten().collect(),
        }
    }

    /// The standard chain for a check of `check_type`
    #[must_use]
    pub fn for_check(
        check_type: CheckType,
        group: Option<&'a DefaultsScope>,
        session: &'a DefaultsScope,
    ) -> Self {
        Self::new([
            group.and_then(|g| g.for_type(check_type)),
            session.for_type(check_type),
            group.and_then(DefaultsScope::generic),
            session.generic(),
        ])
    }

    /// First defined value for the key selected by `key`
    pub fn resolve<T, F>(&self, key: F) -> Option<T>
    where
        T: Clone + 'a,
        F: Fn(&'a ConfigDefaults) -> Option<&'a T>,
    {
        self.sources.iter().find_map(|source| key(source)).cloned()
    }

    /// Number of present sources
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
