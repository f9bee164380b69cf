//! Identifiers for vigil constructs.
//!
//! Logical ids are user-chosen and project-unique. Physical ids name
//! resources that already exist on the remote service. A [`Ref`] is a lazy
//! pointer to another construct's logical id and is only resolved during
//! validation or synthesis.

use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::error::{CoreError, CoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

static LOGICAL_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-/#.]+$").expect("logical id pattern is a valid regex")
});

fn is_allowed_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '#' | '.')
}

/// Project-unique construct identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Validate and wrap a logical id
    ///
    /// # Errors
    ///
    /// Returns `InvalidLogicalId` if the id contains characters outside
    /// `[A-Za-z0-9_\-/#.]` or is empty
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        if !LOGICAL_ID_PATTERN.is_match(&id) {
            return Err(CoreError::InvalidLogicalId { id });
        }
        Ok(Self(id))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create a lazy reference to this id
    #[must_use]
    pub fn to_ref(&self) -> Ref {
        Ref::from(self)
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LogicalId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for LogicalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Strip every character outside the logical id alphabet
///
/// Characters that survive keep their relative order.
#[must_use]
pub fn sanitize_logical_id(input: &str) -> String {
    input.chars().filter(|c| is_allowed_id_char(*c)).collect()
}

/// Lazy pointer to another construct
///
/// Creating a `Ref` has no side effects; the target does not need to exist
/// yet. Serializes as `{"ref": "<logical id>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ref {
    #[serde(rename = "ref")]
    logical_id: String,
}

impl Ref {
    /// Referenced logical id
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl From<&str> for Ref {
    fn from(id: &str) -> Self {
        Self {
            logical_id: id.to_string(),
        }
    }
}

impl From<String> for Ref {
    fn from(logical_id: String) -> Self {
        Self { logical_id }
    }
}

impl From<&LogicalId> for Ref {
    fn from(id: &LogicalId) -> Self {
        Self {
            logical_id: id.0.clone(),
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref({})", self.logical_id)
    }
}

// Config files may spell a reference as a bare string or as `{"ref": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RefRepr {
    Bare(String),
    Object {
        #[serde(rename = "ref")]
        logical_id: String,
    },
}

impl<'de> Deserialize<'de> for Ref {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let logical_id = match RefRepr::deserialize(deserializer)? {
            RefRepr::Bare(id) | RefRepr::Object { logical_id: id } => id,
        };
        Ok(Self { logical_id })
    }
}

/// Identifier of a pre-existing remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhysicalId {
    /// Numeric id (alert channels, check groups)
    Number(i64),
    /// Textual id (UUIDs for private locations, status page services)
    Text(String),
}

impl fmt::Display for PhysicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PhysicalId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for PhysicalId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Uuid> for PhysicalId {
    fn from(id: Uuid) -> Self {
        Self::Text(id.to_string())
    }
}

/// Check that a physical id is a number, not a numeric string
pub fn validate_physical_id_is_numeric(physical_id: &PhysicalId, diagnostics: &mut dyn DiagnosticSink) {
    if let PhysicalId::Text(raw) = physical_id {
        diagnostics.add(Diagnostic::invalid_property_value(
            "physicalId",
            format!("The physical id \"{}\" must be a number.", raw),
        ));
    }
}

/// Check that a physical id is a well-formed UUID
pub fn validate_physical_id_is_uuid(physical_id: &PhysicalId, diagnostics: &mut dyn DiagnosticSink) {
    let valid = match physical_id {
        PhysicalId::Text(raw) => Uuid::parse_str(raw).is_ok(),
        PhysicalId::Number(_) => false,
    };
    if !valid {
        diagnostics.add(Diagnostic::invalid_property_value(
            "physicalId",
            format!("The physical id \"{}\" must be a valid UUID.", physical_id),
        ));
    }
}

/// A logical id derived from external input, kept for operator review
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedId {
    /// Construct kind the id was derived for
    pub construct_type: String,
    /// Raw input (file path, display name)
    pub original: String,
    /// Id after stripping disallowed characters
    pub sanitized: String,
}

/// Records every id that `sanitize` had to alter
///
/// Only used for ids synthesized from external inputs such as file names;
/// never for ids the user declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedIdTracker {
    records: Vec<SanitizedId>,
}

impl SanitizedIdTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `original` and remember the mapping when it changed
    pub fn sanitize(&mut self, construct_type: &str, original: &str) -> String {
        let sanitized = sanitize_logical_id(original);
        if sanitized != original {
            self.records.push(SanitizedId {
                construct_type: construct_type.to_string(),
                original: original.to_string(),
                sanitized: sanitized.clone(),
            });
        }
        sanitized
    }

    /// Altered ids in the order they were produced
    #[must_use]
    pub fn records(&self) -> &[SanitizedId] {
        &self.records
    }

    /// Whether any id was altered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget every record
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
