//! Construct capability interface and project entries.

use crate::kind::ResourceKind;
use crate::project::Project;
use crate::resource::Resource;
use crate::synth::LoadedFiles;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use vigil_bundle::Runtime;
use vigil_core::{
    validate_physical_id_is_numeric, validate_physical_id_is_uuid, ConstructDiagnostics, CoreResult,
    Diagnostic, DiagnosticSink, Diagnostics, LogicalId, PhysicalId, Ref, SanitizedIdTracker,
};

/// Shared behavior of every construct kind
#[async_trait]
pub trait Construct: Send + Sync {
    /// Resource kind tag
    fn kind(&self) -> ResourceKind;

    /// Project-unique logical id
    fn logical_id(&self) -> &LogicalId;

    /// Hook run before [`Construct::validate`]; attaches deprecation notices
    fn before_validate(&self, _diagnostics: &mut dyn DiagnosticSink) {}

    /// Check locally-owned invariants and references
    ///
    /// Never fails; every problem becomes an observation in `diagnostics`.
    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink);

    /// Plain serializable record of this construct's own fields
    ///
    /// # Errors
    ///
    /// Returns error if a required file was not loaded or encoding fails
    fn synthesize(&self, files: &LoadedFiles) -> CoreResult<Value>;
}

/// Inline content or a file resolved against the base path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentSource {
    /// Literal content
    Content(String),
    /// Path to a file holding the content
    Entrypoint(PathBuf),
}

impl ContentSource {
    /// Entrypoint path, if the content lives in a file
    #[must_use]
    pub fn entrypoint(&self) -> Option<&Path> {
        match self {
            Self::Content(_) => None,
            Self::Entrypoint(path) => Some(path),
        }
    }
}

/// Read-only view handed to every construct during validation
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Project snapshot used for reference and name lookups
    pub project: &'a Project,
    /// Available runtimes
    pub runtimes: &'a IndexMap<String, Runtime>,
    /// Directory relative paths are resolved against
    pub base_path: &'a Path,
}

impl<'a> ValidationContext<'a> {
    /// Create a context
    #[must_use]
    pub fn new(project: &'a Project, runtimes: &'a IndexMap<String, Runtime>, base_path: &'a Path) -> Self {
        Self {
            project,
            runtimes,
            base_path,
        }
    }

    /// Resolve `path` against the base path unless absolute
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Runtime by id
    #[must_use]
    pub fn runtime(&self, id: &str) -> Option<&'a Runtime> {
        self.runtimes.get(id)
    }

    /// Report `reference` if no construct of `kind` carries its logical id
    pub fn require_ref(
        &self,
        property: &str,
        kind: ResourceKind,
        reference: &Ref,
        diagnostics: &mut dyn DiagnosticSink,
    ) {
        if !self.project.contains(kind, reference.logical_id()) {
            diagnostics.add(Diagnostic::unresolved_reference(
                property,
                kind.as_str(),
                reference.logical_id(),
            ));
        }
    }

    /// Check that a file-backed source exists and is not empty
    pub async fn require_file(
        &self,
        property: &str,
        source: &ContentSource,
        diagnostics: &mut dyn DiagnosticSink,
    ) {
        let path = match source {
            ContentSource::Content(content) => {
                if content.trim().is_empty() {
                    diagnostics.add(Diagnostic::invalid_property_value(
                        property,
                        "Inline content must not be empty.",
                    ));
                }
                return;
            }
            ContentSource::Entrypoint(path) => self.resolve_path(path),
        };

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.len() == 0 => {
                diagnostics.add(Diagnostic::invalid_property_value(
                    property,
                    format!("The file \"{}\" is empty.", path.display()),
                ));
            }
            Ok(_) => {}
            Err(err) => {
                diagnostics.add(Diagnostic::file_load_error(
                    property,
                    &path.display().to_string(),
                    err,
                ));
            }
        }
    }

    /// Validate every entry of the project, keeping provenance per construct
    pub async fn validate_project(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for entry in self.project.entries() {
            let mut scoped = ConstructDiagnostics::new(entry.kind().as_str(), entry.logical_id().as_str());
            entry.before_validate(&mut scoped);
            entry.validate(self, &mut scoped).await;
            diagnostics.extend(scoped.into_inner());
        }
        diagnostics
    }
}

/// A pre-existing remote resource, referenced but not managed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceConstruct {
    kind: ResourceKind,
    logical_id: LogicalId,
    physical_id: PhysicalId,
}

impl ReferenceConstruct {
    /// Reference the remote resource `physical_id` of `kind`
    ///
    /// The logical id is `<kind>-<physical id>`, sanitized and tracked.
    ///
    /// # Errors
    ///
    /// Returns error if no valid logical id can be derived
    pub fn new(
        kind: ResourceKind,
        physical_id: impl Into<PhysicalId>,
        tracker: &mut SanitizedIdTracker,
    ) -> CoreResult<Self> {
        let physical_id = physical_id.into();
        let raw = format!("{}-{}", kind, physical_id);
        let logical_id = LogicalId::new(tracker.sanitize(kind.as_str(), &raw))?;
        Ok(Self {
            kind,
            logical_id,
            physical_id,
        })
    }

    /// Remote identifier
    #[must_use]
    pub fn physical_id(&self) -> &PhysicalId {
        &self.physical_id
    }
}

#[async_trait]
impl Construct for ReferenceConstruct {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        match self.kind {
            ResourceKind::AlertChannel | ResourceKind::CheckGroup => {
                validate_physical_id_is_numeric(&self.physical_id, diagnostics);
            }
            _ => validate_physical_id_is_uuid(&self.physical_id, diagnostics),
        }
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        Ok(Value::Null)
    }
}

/// One slot of a project bucket
#[derive(Debug, Clone)]
pub enum Entry {
    /// Construct owned by this project
    Managed(Resource),
    /// Remote resource referenced by physical id
    Reference(ReferenceConstruct),
}

impl Entry {
    /// Remote id, for references
    #[must_use]
    pub fn physical_id(&self) -> Option<&PhysicalId> {
        match self {
            Self::Managed(_) => None,
            Self::Reference(reference) => Some(reference.physical_id()),
        }
    }

    /// Whether the project owns the resource
    #[must_use]
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Managed(_))
    }

    /// Managed resource, if any
    #[must_use]
    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Self::Managed(resource) => Some(resource),
            Self::Reference(_) => None,
        }
    }

    /// Whether the resource only exists for test runs
    #[must_use]
    pub fn is_test_only(&self) -> bool {
        self.as_resource().is_some_and(Resource::is_test_only)
    }
}

#[async_trait]
impl Construct for Entry {
    fn kind(&self) -> ResourceKind {
        match self {
            Self::Managed(resource) => resource.kind(),
            Self::Reference(reference) => reference.kind(),
        }
    }

    fn logical_id(&self) -> &LogicalId {
        match self {
            Self::Managed(resource) => resource.logical_id(),
            Self::Reference(reference) => reference.logical_id(),
        }
    }

    fn before_validate(&self, diagnostics: &mut dyn DiagnosticSink) {
        if let Self::Managed(resource) = self {
            resource.before_validate(diagnostics);
        }
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        match self {
            Self::Managed(resource) => resource.validate(ctx, diagnostics).await,
            Self::Reference(reference) => reference.validate(ctx, diagnostics).await,
        }
    }

    fn synthesize(&self, files: &LoadedFiles) -> CoreResult<Value> {
        match self {
            Self::Managed(resource) => resource.synthesize(files),
            Self::Reference(reference) => reference.synthesize(files),
        }
    }
}

impl From<Resource> for Entry {
    fn from(resource: Resource) -> Self {
        Self::Managed(resource)
    }
}

impl From<ReferenceConstruct> for Entry {
    fn from(reference: ReferenceConstruct) -> Self {
        Self::Reference(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_bundle::builtin_runtimes;

    #[test]
    fn test_reference_logical_id() {
        let mut tracker = SanitizedIdTracker::new();
        let reference = ReferenceConstruct::new(ResourceKind::AlertChannel, 42_i64, &mut tracker).unwrap();
        assert_eq!(reference.logical_id().as_str(), "alert-channel-42");
        assert!(tracker.is_empty());

        let reference = ReferenceConstruct::new(ResourceKind::CheckGroup, "not a number", &mut tracker).unwrap();
        assert_eq!(reference.logical_id().as_str(), "check-group-notanumber");
        assert_eq!(tracker.records().len(), 1);
    }

    #[tokio::test]
    async fn test_reference_validates_physical_id_shape() {
        let project = Project::new("demo", "Demo").unwrap();
        let runtimes = builtin_runtimes();
        let ctx = ValidationContext::new(&project, &runtimes, Path::new("."));
        let mut tracker = SanitizedIdTracker::new();

        let mut diagnostics = Diagnostics::new();
        ReferenceConstruct::new(ResourceKind::AlertChannel, 123_i64, &mut tracker)
            .unwrap()
            .validate(&ctx, &mut diagnostics)
            .await;
        assert!(!diagnostics.is_fatal());

        let mut diagnostics = Diagnostics::new();
        ReferenceConstruct::new(ResourceKind::AlertChannel, "123", &mut tracker)
            .unwrap()
            .validate(&ctx, &mut diagnostics)
            .await;
        assert!(diagnostics.is_fatal());
        assert!(diagnostics.iter().any(|d| d.message().contains("must be a number")));

        let mut diagnostics = Diagnostics::new();
        ReferenceConstruct::new(ResourceKind::PrivateLocation, "not-a-uuid", &mut tracker)
            .unwrap()
            .validate(&ctx, &mut diagnostics)
            .await;
        assert!(diagnostics.is_fatal());
    }

    #[test]
    fn test_reference_synthesizes_null() {
        let mut tracker = SanitizedIdTracker::new();
        let entry = Entry::from(
            ReferenceConstruct::new(ResourceKind::StatusPageService, "8c2a7d14-7a4e-4d8f-9e0b-6f1c2a3b4c5d", &mut tracker)
                .unwrap(),
        );
        assert!(!entry.is_member());
        assert!(entry.physical_id().is_some());
        assert_eq!(entry.synthesize(&LoadedFiles::default()).unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_require_file_reports_io_cause() {
        let dir = tempfile::TempDir::new().unwrap();
        let project = Project::new("demo", "Demo").unwrap();
        let runtimes = builtin_runtimes();
        let ctx = ValidationContext::new(&project, &runtimes, dir.path());

        let mut diagnostics = Diagnostics::new();
        ctx.require_file(
            "code",
            &ContentSource::Entrypoint(PathBuf::from("missing.spec.ts")),
            &mut diagnostics,
        )
        .await;
        assert!(diagnostics.is_fatal());
        let observation = &diagnostics.observations()[0];
        assert!(observation.title().contains("code"));
        assert!(observation.cause().is_some());

        std::fs::write(dir.path().join("empty.spec.ts"), "").unwrap();
        let mut diagnostics = Diagnostics::new();
        ctx.require_file(
            "code",
            &ContentSource::Entrypoint(PathBuf::from("empty.spec.ts")),
            &mut diagnostics,
        )
        .await;
        assert!(diagnostics.is_fatal());
    }
}
