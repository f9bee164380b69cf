//! Diagnostics engine.
//!
//! A [`Diagnostics`] collection is a typed ledger of observations made while
//! validating constructs. Every observation is classified as an error
//! (always fatal), a warning (never fatal, not benign) or a notice (never
//! fatal, benign). The two derived flags are folded in as observations are
//! added, so they never need to be recomputed.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Underlying cause attached to an error observation
pub type DiagnosticCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks deployment and test runs
    Error,
    /// Surfaced to the user but does not block
    Warning,
    /// Informational, suppressed in quiet modes
    Notice,
}

impl Severity {
    /// Whether observations of this severity block execution
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Whether observations of this severity may be hidden
    #[must_use]
    pub const fn is_benign(self) -> bool {
        matches!(self, Self::Notice)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Notice => write!(f, "notice"),
        }
    }
}

/// A single immutable observation
#[derive(Clone)]
pub struct Diagnostic {
    severity: Severity,
    title: String,
    message: String,
    cause: Option<DiagnosticCause>,
}

impl Diagnostic {
    /// Create a fatal observation
    #[must_use]
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Create a non-fatal, non-benign observation
    #[must_use]
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            title: title.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Create a benign observation
    #[must_use]
    pub fn notice(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Notice,
            title: title.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the error that caused this observation
    #[must_use]
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// A property holds a value outside its allowed range or shape
    #[must_use]
    pub fn invalid_property_value(property: &str, message: impl Into<String>) -> Self {
        Self::error(
            format!("Invalid value for property \"{}\"", property),
            message,
        )
    }

    /// Two properties were set that cannot be used together
    #[must_use]
    pub fn conflicting_properties(a: &str, b: &str, message: impl Into<String>) -> Self {
        Self::error(
            format!("Conflicting properties \"{}\" and \"{}\"", a, b),
            message,
        )
    }

    /// A property was set that this construct does not support
    #[must_use]
    pub fn unsupported_property(construct: &str, property: &str) -> Self {
        Self::error(
            format!("Unsupported property \"{}\"", property),
            format!("{} does not support the \"{}\" property.", construct, property),
        )
    }

    /// A property is still honored but will be removed
    #[must_use]
    pub fn deprecated_property(property: &str, message: impl Into<String>) -> Self {
        Self::warning(format!("Deprecated property \"{}\"", property), message)
    }

    /// A whole construct kind is legacy
    #[must_use]
    pub fn deprecated_construct(construct: &str, message: impl Into<String>) -> Self {
        Self::warning(format!("Deprecated construct \"{}\"", construct), message)
    }

    /// A file referenced by a property could not be loaded
    #[must_use]
    pub fn file_load_error<E>(property: &str, path: &str, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::error(
            format!("Unable to load file for property \"{}\"", property),
            format!("Failed to read \"{}\": {}", path, cause),
        )
        .with_cause(cause)
    }

    /// A `Ref` points at a construct the project does not contain
    #[must_use]
    pub fn unresolved_reference(property: &str, kind: &str, logical_id: &str) -> Self {
        Self::error(
            format!("Unresolved reference in property \"{}\"", property),
            format!(
                "No {} with logical id \"{}\" is registered in this project.",
                kind, logical_id
            ),
        )
    }

    /// Severity of the observation
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Short title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Full message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Underlying cause, if any
    #[must_use]
    pub fn cause(&self) -> Option<&DiagnosticCause> {
        self.cause.as_ref()
    }

    /// Whether this observation blocks execution
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.severity.is_fatal()
    }

    /// Whether this observation may be hidden in quiet modes
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        self.severity.is_benign()
    }

    /// Same observation with the title prefixed by its origin
    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.title = format!("[{}] {}", origin, self.title);
        self
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostic")
            .field("severity", &self.severity)
            .field("title", &self.title)
            .field("message", &self.message)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}\n  {}", self.severity, self.title, self.message)
    }
}

/// Anything that accepts observations
pub trait DiagnosticSink: Send {
    /// Record one observation
    fn add(&mut self, diagnostic: Diagnostic);

    /// Record every observation of another collection
    fn extend(&mut self, other: Diagnostics) {
        for diagnostic in other {
            self.add(diagnostic);
        }
    }

    /// Whether any recorded observation is fatal
    fn is_fatal(&self) -> bool;

    /// Whether every recorded observation is benign
    fn is_benign(&self) -> bool;
}

/// Ordered collection of observations
#[derive(Debug, Clone)]
pub struct Diagnostics {
    observations: Vec<Diagnostic>,
    fatal: bool,
    benign: bool,
}

impl Diagnostics {
    /// Create an empty collection (not fatal, vacuously benign)
    #[must_use]
    pub fn new() -> Self {
        Self {
            observations: Vec::new(),
            fatal: false,
            benign: true,
        }
    }

    /// Observations in insertion order
    #[must_use]
    pub fn observations(&self) -> &[Diagnostic] {
        &self.observations
    }

    /// Iterate observations
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.observations.iter()
    }

    /// Fatal observations only
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.observations.iter().filter(|d| d.is_fatal())
    }

    /// Record one observation, folding it into the derived flags
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.fatal |= diagnostic.is_fatal();
        self.benign &= diagnostic.is_benign();
        self.observations.push(diagnostic);
    }

    /// Move every observation of `other` into this collection
    pub fn extend(&mut self, other: Diagnostics) {
        self.fatal |= other.fatal;
        self.benign &= other.benign;
        self.observations.extend(other.observations);
    }

    /// Whether any observation is fatal
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Whether every observation is benign (true when empty)
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        self.benign
    }

    /// Number of observations
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether nothing was observed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for Diagnostics {
    fn add(&mut self, diagnostic: Diagnostic) {
        Diagnostics::add(self, diagnostic);
    }

    fn extend(&mut self, other: Diagnostics) {
        Diagnostics::extend(self, other);
    }

    fn is_fatal(&self) -> bool {
        self.fatal
    }

    fn is_benign(&self) -> bool {
        self.benign
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.observations {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

/// Collection that tags every observation with the construct it came from
///
/// Used when validating an owned construct so its observations keep their
/// provenance once merged into the parent collection.
#[derive(Debug, Clone)]
pub struct ConstructDiagnostics {
    origin: String,
    inner: Diagnostics,
}

impl ConstructDiagnostics {
    /// Create a collection for the construct `kind:logical_id`
    #[must_use]
    pub fn new(kind: &str, logical_id: &str) -> Self {
        Self {
            origin: format!("{}:{}", kind, logical_id),
            inner: Diagnostics::new(),
        }
    }

    /// The `kind:logical_id` prefix
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Unwrap into the plain collection
    #[must_use]
    pub fn into_inner(self) -> Diagnostics {
        self.inner
    }
}

impl DiagnosticSink for ConstructDiagnostics {
    fn add(&mut self, diagnostic: Diagnostic) {
        self.inner.add(diagnostic.with_origin(&self.origin));
    }

    fn is_fatal(&self) -> bool {
        self.inner.is_fatal()
    }

    fn is_benign(&self) -> bool {
        self.inner.is_benign()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_is_benign_and_not_fatal() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.is_fatal());
        assert!(diagnostics.is_benign());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_error_is_fatal() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add(Diagnostic::error("Broken", "it broke"));
        assert!(diagnostics.is_fatal());
        assert!(!diagnostics.is_benign());
    }

    #[test]
    fn test_warning_is_neither_fatal_nor_benign() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add(Diagnostic::warning("Careful", "heads up"));
        assert!(!diagnostics.is_fatal());
        assert!(!diagnostics.is_benign());
    }

    #[test]
    fn test_notice_keeps_benign() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add(Diagnostic::notice("FYI", "nothing to do"));
        assert!(!diagnostics.is_fatal());
        assert!(diagnostics.is_benign());
    }

    #[test]
    fn test_extend_merges_flags() {
        let mut parent = Diagnostics::new();
        parent.add(Diagnostic::notice("FYI", "ok"));

        let mut child = Diagnostics::new();
        child.add(Diagnostic::error("Broken", "bad"));

        parent.extend(child);
        assert_eq!(parent.len(), 2);
        assert!(parent.is_fatal());
        assert!(!parent.is_benign());
    }

    #[test]
    fn test_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let diagnostic = Diagnostic::file_load_error("code", "checks/home.spec.ts", io);
        assert!(diagnostic.is_fatal());
        assert!(diagnostic.cause().is_some());
        assert!(diagnostic.message().contains("checks/home.spec.ts"));
    }

    #[test]
    fn test_construct_diagnostics_prefixes_origin() {
        let mut nested = ConstructDiagnostics::new("check", "homepage");
        nested.add(Diagnostic::invalid_property_value("frequency", "bad"));
        assert!(nested.is_fatal());

        let mut parent = Diagnostics::new();
        parent.extend(nested.into_inner());
        let first = &parent.observations()[0];
        assert!(first.title().starts_with("[check:homepage]"));
        assert!(parent.is_fatal());
    }

    #[test]
    fn test_display_lists_every_observation() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add(Diagnostic::error("First", "one"));
        diagnostics.add(Diagnostic::warning("Second", "two"));
        let rendered = diagnostics.to_string();
        assert!(rendered.contains("First"));
        assert!(rendered.contains("Second"));
    }

    fn make(severity: u8) -> Diagnostic {
        match severity % 3 {
            0 => Diagnostic::error("e", "e"),
            1 => Diagnostic::warning("w", "w"),
            _ => Diagnostic::notice("n", "n"),
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_flags_match_reduction(severities: Vec<u8>) {
            let mut diagnostics = Diagnostics::new();
            for s in &severities {
                diagnostics.add(make(*s));
            }
            let fatal = severities.iter().any(|s| s % 3 == 0);
            let benign = severities.iter().all(|s| s % 3 == 2);
            prop_assert_eq!(diagnostics.is_fatal(), fatal);
            prop_assert_eq!(diagnostics.is_benign(), benign);
        }

        #[test]
        fn prop_flags_independent_of_order(severities: Vec<u8>) {
            let mut forward = Diagnostics::new();
            for s in &severities {
                forward.add(make(*s));
            }
            let mut backward = Diagnostics::new();
            for s in severities.iter().rev() {
                backward.add(make(*s));
            }
            prop_assert_eq!(forward.is_fatal(), backward.is_fatal());
            prop_assert_eq!(forward.is_benign(), backward.is_benign());
        }
    }
}
