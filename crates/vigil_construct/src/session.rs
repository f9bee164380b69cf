//! Session: the explicit context every construct is created against.
//!
//! A session holds the active project, session-wide check defaults, the
//! runtime catalog and the base path files are resolved against. Constructs
//! declared while a config file is loading are buffered and flushed into the
//! project once it exists.

use crate::construct::{Construct, Entry, ReferenceConstruct, ValidationContext};
use crate::defaults::DefaultsScope;
use crate::kind::ResourceKind;
use crate::project::Project;
use crate::resource::Resource;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use vigil_bundle::{builtin_runtimes, Bundler, Runtime};
use vigil_core::{CoreError, CoreResult, PhysicalId, Ref, SanitizedIdTracker};

/// Runtime used when neither a check nor its defaults name one
pub const DEFAULT_RUNTIME_ID: &str = "2025.04";

/// Everything a config file may change on a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    defaults: DefaultsScope,
    base_path: PathBuf,
    runtimes: IndexMap<String, Runtime>,
    default_runtime_id: String,
    sanitized_ids: SanitizedIdTracker,
}

/// Context for one command invocation or test case
#[derive(Debug, Clone)]
pub struct Session {
    project: Option<Project>,
    defaults: DefaultsScope,
    base_path: PathBuf,
    runtimes: IndexMap<String, Runtime>,
    default_runtime_id: String,
    loading_config: bool,
    pending: Vec<Entry>,
    sanitized_ids: SanitizedIdTracker,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session with the built-in runtimes and no project
    #[must_use]
    pub fn new() -> Self {
        Self {
            project: None,
            defaults: DefaultsScope::default(),
            base_path: PathBuf::from("."),
            runtimes: builtin_runtimes(),
            default_runtime_id: DEFAULT_RUNTIME_ID.to_string(),
            loading_config: false,
            pending: Vec::new(),
            sanitized_ids: SanitizedIdTracker::new(),
        }
    }

    /// Use `defaults` as session-wide check defaults
    #[must_use]
    pub fn with_defaults(mut self, defaults: DefaultsScope) -> Self {
        self.defaults = defaults;
        self
    }

    /// Resolve relative file paths against `base_path`
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Replace the runtime catalog
    #[must_use]
    pub fn with_runtimes(mut self, runtimes: IndexMap<String, Runtime>) -> Self {
        self.runtimes = runtimes;
        self
    }

    /// Runtime used when nothing else selects one
    #[must_use]
    pub fn with_default_runtime_id(mut self, runtime_id: impl Into<String>) -> Self {
        self.default_runtime_id = runtime_id.into();
        self
    }

    /// Make `project` the active project and flush buffered constructs into it
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a buffered construct collides with one
    /// already in `project`
    pub fn set_project(&mut self, mut project: Project) -> CoreResult<()> {
        let pending = std::mem::take(&mut self.pending);
        let flushed = pending.len();
        for entry in pending {
            project.add(entry)?;
        }
        debug!(project = %project.logical_id(), flushed, "activated project");
        self.project = Some(project);
        Ok(())
    }

    /// Active project
    #[must_use]
    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    /// Detach the active project
    pub fn take_project(&mut self) -> Option<Project> {
        self.project.take()
    }

    /// Session-wide check defaults
    #[must_use]
    pub fn defaults(&self) -> &DefaultsScope {
        &self.defaults
    }

    /// Replace the session-wide check defaults
    pub fn set_defaults(&mut self, defaults: DefaultsScope) {
        self.defaults = defaults;
    }

    /// Directory relative paths are resolved against
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Change the base path
    pub fn set_base_path(&mut self, base_path: impl Into<PathBuf>) {
        self.base_path = base_path.into();
    }

    /// Available runtimes
    #[must_use]
    pub fn runtimes(&self) -> &IndexMap<String, Runtime> {
        &self.runtimes
    }

    /// Add or replace a runtime
    pub fn add_runtime(&mut self, id: &str, runtime: Runtime) {
        self.runtimes.insert(id.to_string(), runtime);
    }

    /// Replace the runtime catalog
    pub fn set_runtimes(&mut self, runtimes: IndexMap<String, Runtime>) {
        self.runtimes = runtimes;
    }

    /// Runtime by id
    ///
    /// # Errors
    ///
    /// Returns `MissingRuntime` if the runtime is not available
    pub fn runtime(&self, id: &str) -> CoreResult<&Runtime> {
        self.runtimes.get(id).ok_or_else(|| CoreError::MissingRuntime { id: id.to_string() })
    }

    /// Fallback runtime id
    #[must_use]
    pub fn default_runtime_id(&self) -> &str {
        &self.default_runtime_id
    }

    /// Change the fallback runtime id
    pub fn set_default_runtime_id(&mut self, runtime_id: impl Into<String>) {
        self.default_runtime_id = runtime_id.into();
    }

    /// Buffer constructs until a project is set
    pub fn begin_config_load(&mut self) {
        self.loading_config = true;
    }

    /// Stop buffering; buffered constructs stay pending until `set_project`
    pub fn end_config_load(&mut self) {
        self.loading_config = false;
    }

    /// Constructs waiting for a project
    #[must_use]
    pub fn pending(&self) -> &[Entry] {
        &self.pending
    }

    /// Drop buffered constructs and stop buffering
    pub fn discard_pending(&mut self) -> usize {
        self.loading_config = false;
        let discarded = self.pending.len();
        self.pending.clear();
        if discarded > 0 {
            debug!(discarded, "discarded buffered constructs");
        }
        discarded
    }

    /// Capture defaults, base path, runtimes and sanitized-id records
    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            defaults: self.defaults.clone(),
            base_path: self.base_path.clone(),
            runtimes: self.runtimes.clone(),
            default_runtime_id: self.default_runtime_id.clone(),
            sanitized_ids: self.sanitized_ids.clone(),
        }
    }

    /// Put back settings captured with [`Session::settings`]
    pub fn restore_settings(&mut self, settings: SessionSettings) {
        self.defaults = settings.defaults;
        self.base_path = settings.base_path;
        self.runtimes = settings.runtimes;
        self.default_runtime_id = settings.default_runtime_id;
        self.sanitized_ids = settings.sanitized_ids;
    }

    /// Register a managed construct and everything it implies
    ///
    /// Derived resources (subscriptions, location assignments) are
    /// registered right after the construct itself.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSession` outside a project or config load, and
    /// `AlreadyExists` if the slot is taken
    pub fn register(&mut self, resource: impl Into<Resource>) -> CoreResult<Ref> {
        let resource = resource.into();
        let reference = resource.logical_id().to_ref();
        let derived = resource.derived()?;

        self.add_entry(Entry::Managed(resource))?;
        for extra in derived {
            self.add_entry(Entry::Managed(extra))?;
        }
        Ok(reference)
    }

    /// Register a reference to an existing remote resource
    ///
    /// Registering the same physical id twice replaces the first reference.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSession` outside a project or config load, and
    /// `AlreadyExists` if a managed construct owns the derived logical id
    pub fn register_reference(
        &mut self,
        kind: ResourceKind,
        physical_id: impl Into<PhysicalId>,
    ) -> CoreResult<Ref> {
        let reference = ReferenceConstruct::new(kind, physical_id, &mut self.sanitized_ids)?;
        let target = reference.logical_id().to_ref();
        self.add_entry(Entry::Reference(reference))?;
        Ok(target)
    }

    fn add_entry(&mut self, entry: Entry) -> CoreResult<()> {
        if let Some(project) = self.project.as_mut() {
            return project.add(entry);
        }
        if !self.loading_config {
            return Err(CoreError::InvalidSession {
                reason: format!(
                    "{} \"{}\" was declared outside a project or config file",
                    entry.kind(),
                    entry.logical_id()
                ),
            });
        }

        let slot = self
            .pending
            .iter()
            .position(|e| e.kind() == entry.kind() && e.logical_id() == entry.logical_id());
        match slot {
            Some(index) => {
                let both_references = matches!(
                    (&self.pending[index], &entry),
                    (Entry::Reference(_), Entry::Reference(_))
                );
                if !both_references {
                    return Err(CoreError::AlreadyExists {
                        kind: entry.kind().to_string(),
                        id: entry.logical_id().to_string(),
                    });
                }
                self.pending[index] = entry;
            }
            None => {
                debug!(kind = %entry.kind(), id = %entry.logical_id(), "buffered construct");
                self.pending.push(entry);
            }
        }
        Ok(())
    }

    /// Look a construct up in the project, then in the config buffer
    #[must_use]
    pub fn find(&self, kind: ResourceKind, logical_id: &str) -> Option<&Entry> {
        self.project
            .as_ref()
            .and_then(|project| project.get(kind, logical_id))
            .or_else(|| {
                self.pending
                    .iter()
                    .find(|entry| entry.kind() == kind && entry.logical_id().as_str() == logical_id)
            })
    }

    /// Derive a logical id from external input, remembering altered ids
    pub fn sanitize_logical_id(&mut self, construct_type: &str, original: &str) -> String {
        self.sanitized_ids.sanitize(construct_type, original)
    }

    /// Ids altered by sanitizing
    #[must_use]
    pub fn sanitized_ids(&self) -> &SanitizedIdTracker {
        &self.sanitized_ids
    }

    /// Read-only view for validating the active project
    ///
    /// # Errors
    ///
    /// Returns `InvalidSession` if no project is active
    pub fn validation_context(&self) -> CoreResult<ValidationContext<'_>> {
        let project = self.project.as_ref().ok_or_else(|| CoreError::InvalidSession {
            reason: "no project is active".to_string(),
        })?;
        Ok(ValidationContext::new(project, &self.runtimes, &self.base_path))
    }

    /// Bundler over this session's base path and runtimes
    #[must_use]
    pub fn bundler(&self) -> Bundler {
        Bundler::new(self.base_path.clone(), self.runtimes.clone())
    }

    /// Drop every piece of state, including sanitized-id records
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_channel::{AlertChannel, AlertChannelConfig, AlertChannelProps};
    use crate::check::{ApiCheckSpec, ApiRequest, Check, CheckProps};
    use crate::check_group::{CheckGroup, CheckGroupProps};
    use crate::status_page::StatusPageService;

    fn project() -> Project {
        Project::new("demo", "Demo").unwrap()
    }

    fn group(id: &str) -> CheckGroup {
        CheckGroup::new(
            id,
            CheckGroupProps {
                name: id.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_register_without_project_is_invalid() {
        let mut session = Session::new();
        let err = session.register(group("g")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSession { .. }));
        assert!(session.validation_context().is_err());
    }

    #[test]
    fn test_config_buffer_flushes_on_set_project() {
        let mut session = Session::new();
        session.begin_config_load();
        session.register(group("g")).unwrap();
        CheckGroup::from_id(&mut session, 7_i64).unwrap();
        session.end_config_load();
        assert_eq!(session.pending().len(), 2);
        assert!(session.find(ResourceKind::CheckGroup, "g").is_some());

        session.set_project(project()).unwrap();
        assert!(session.pending().is_empty());
        let project = session.project().unwrap();
        assert!(project.contains(ResourceKind::CheckGroup, "g"));
        assert!(project.contains(ResourceKind::CheckGroup, "check-group-7"));
    }

    #[test]
    fn test_duplicate_in_buffer_already_exists() {
        let mut session = Session::new();
        session.begin_config_load();
        session.register(group("g")).unwrap();
        let err = session.register(group("g")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_duplicate_registration_already_exists() {
        let mut session = Session::new();
        session.set_project(project()).unwrap();
        session
            .register(StatusPageService::new("api", "API").unwrap())
            .unwrap();
        let err = session
            .register(StatusPageService::new("api", "API again").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_from_id_twice_is_tolerated() {
        let mut session = Session::new();
        session.set_project(project()).unwrap();
        let first = AlertChannel::from_id(&mut session, 123_i64).unwrap();
        let second = AlertChannel::from_id(&mut session, 123_i64).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.project().unwrap().len(), 1);
    }

    #[test]
    fn test_register_adds_derived_subscriptions() {
        let mut session = Session::new();
        session.set_project(project()).unwrap();
        let channel = AlertChannel::new(
            "ops",
            AlertChannelProps::new(AlertChannelConfig::Email {
                address: "ops@example.com".to_string(),
            }),
        )
        .unwrap();
        let channel = session.register(channel).unwrap();

        let props = CheckProps {
            alert_channels: Some(vec![channel]),
            ..CheckProps::named("Home")
        };
        let check = Check::new(
            &session,
            "home",
            props,
            ApiCheckSpec::new(ApiRequest::get("https://example.com")),
        )
        .unwrap();
        let reference = session.register(check).unwrap();
        assert_eq!(reference.logical_id(), "home");

        let project = session.project().unwrap();
        assert!(project.contains(
            ResourceKind::AlertChannelSubscription,
            "check-alert-channel-subscription#home#ops"
        ));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut session = Session::new().with_base_path("/tmp/project");
        session.set_project(project()).unwrap();
        session.sanitize_logical_id("check", "checks/home page.spec.ts");
        assert!(!session.sanitized_ids().is_empty());

        session.reset();
        assert!(session.project().is_none());
        assert!(session.sanitized_ids().is_empty());
        assert_eq!(session.base_path(), Path::new("."));
        assert_eq!(session.default_runtime_id(), DEFAULT_RUNTIME_ID);
    }

    #[test]
    fn test_runtime_lookup() {
        let mut session = Session::new();
        assert!(session.runtime("2024.09").is_ok());
        assert!(matches!(
            session.runtime("1999.01"),
            Err(CoreError::MissingRuntime { .. })
        ));
        session.add_runtime("1999.01", Runtime::new("1999.01"));
        assert!(session.runtime("1999.01").is_ok());
    }
}
