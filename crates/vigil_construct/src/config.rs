//! Project config file (`vigil.config.json`).
//!
//! The file carries project metadata, session-wide check defaults, the
//! runtime catalog and declared resources. Resources are declared while the
//! session buffers constructs; the project is created last and receives them
//! all at once.

use crate::alert_channel::{AlertChannel, AlertChannelProps};
use crate::check::{
    ApiCheckSpec, Check, CheckProps, CheckSpec, DnsSpec, HeartbeatSpec, ScriptCheckSpec, TcpSpec,
};
use crate::check_group::{CheckGroup, CheckGroupProps};
use crate::construct::ContentSource;
use crate::dashboard::{Dashboard, DashboardProps};
use crate::defaults::{ConfigDefaults, DefaultsScope};
use crate::kind::ResourceKind;
use crate::maintenance_window::{MaintenanceWindow, MaintenanceWindowProps};
use crate::private_location::{PrivateLocation, PrivateLocationProps};
use crate::project::Project;
use crate::session::Session;
use crate::status_page::{StatusPage, StatusPageProps, StatusPageService};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vigil_bundle::Runtime;
use vigil_core::{CoreError, CoreResult, PhysicalId, Ref};

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "vigil.config.json";

/// Error loading a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid config
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Config path
        path: String,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// Declaring a construct failed
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Browser check defaults plus the scripts checks are derived from
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserChecksConfig {
    /// Defaults for browser checks
    #[serde(flatten)]
    pub defaults: ConfigDefaults,
    /// One browser check is derived per file
    #[serde(default)]
    pub test_files: Vec<PathBuf>,
}

/// `checks` section: generic defaults and type-specific overrides
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDefaultsConfig {
    /// Defaults for every check
    #[serde(flatten)]
    pub defaults: ConfigDefaults,
    /// Browser check section
    #[serde(default)]
    pub browser_checks: Option<BrowserChecksConfig>,
    /// Defaults for multi-step checks
    #[serde(default)]
    pub multi_step_checks: Option<ConfigDefaults>,
}

impl CheckDefaultsConfig {
    fn scope(&self) -> DefaultsScope {
        DefaultsScope {
            checks: Some(self.defaults.clone()),
            browser_checks: self.browser_checks.as_ref().map(|browser| browser.defaults.clone()),
            multi_step_checks: self.multi_step_checks.clone(),
        }
    }

    fn test_files(&self) -> &[PathBuf] {
        self.browser_checks
            .as_ref()
            .map(|browser| browser.test_files.as_slice())
            .unwrap_or_default()
    }
}

/// A declared construct with its logical id
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decl<P> {
    /// Logical id
    pub logical_id: String,
    /// Construct properties
    #[serde(flatten)]
    pub props: P,
}

/// A declared check: common properties plus type-specific details
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDecl<S> {
    /// Logical id
    pub logical_id: String,
    /// Common check properties
    #[serde(flatten)]
    pub props: CheckProps,
    /// Type-specific details
    #[serde(flatten)]
    pub spec: S,
}

impl<S> CheckDecl<S> {
    fn register(self, session: &mut Session, wrap: fn(S) -> CheckSpec) -> CoreResult<Ref> {
        let check = Check::new(session, &self.logical_id, self.props, wrap(self.spec))?;
        session.register(check)
    }
}

/// Declared status page service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDecl {
    /// Logical id
    pub logical_id: String,
    /// Display name
    pub name: String,
}

/// One entry of the `resources` list, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResourceDecl {
    /// API check
    ApiCheck(CheckDecl<ApiCheckSpec>),
    /// Browser check
    BrowserCheck(CheckDecl<ScriptCheckSpec>),
    /// Multi-step check
    MultiStepCheck(CheckDecl<ScriptCheckSpec>),
    /// Heartbeat monitor
    HeartbeatMonitor(CheckDecl<HeartbeatSpec>),
    /// TCP monitor
    TcpMonitor(CheckDecl<TcpSpec>),
    /// DNS monitor
    DnsMonitor(CheckDecl<DnsSpec>),
    /// Check group
    CheckGroup(Decl<CheckGroupProps>),
    /// First-generation check group
    #[serde(rename = "check-group-v1")]
    CheckGroupV1(Decl<CheckGroupProps>),
    /// Alert channel
    AlertChannel(Decl<AlertChannelProps>),
    /// Private location
    PrivateLocation(Decl<PrivateLocationProps>),
    /// Dashboard
    Dashboard(Decl<DashboardProps>),
    /// Status page
    StatusPage(Decl<StatusPageProps>),
    /// Status page service
    StatusPageService(ServiceDecl),
    /// Maintenance window
    MaintenanceWindow(Decl<MaintenanceWindowProps>),
    /// Existing remote resource
    #[serde(rename_all = "camelCase")]
    Reference {
        /// Kind of the remote resource
        kind: ResourceKind,
        /// Remote id
        physical_id: PhysicalId,
    },
}

impl ResourceDecl {
    /// Create the construct and register it with `session`
    ///
    /// # Errors
    ///
    /// Returns error if the logical id is invalid, taken, or the reference
    /// kind cannot be referenced by physical id
    pub fn declare(self, session: &mut Session) -> CoreResult<Ref> {
        match self {
            Self::ApiCheck(decl) => decl.register(session, CheckSpec::Api),
            Self::BrowserCheck(decl) => decl.register(session, CheckSpec::Browser),
            Self::MultiStepCheck(decl) => decl.register(session, CheckSpec::MultiStep),
            Self::HeartbeatMonitor(decl) => decl.register(session, CheckSpec::Heartbeat),
            Self::TcpMonitor(decl) => decl.register(session, CheckSpec::Tcp),
            Self::DnsMonitor(decl) => decl.register(session, CheckSpec::Dns),
            Self::CheckGroup(decl) => session.register(CheckGroup::new(&decl.logical_id, decl.props)?),
            Self::CheckGroupV1(decl) => session.register(CheckGroup::legacy(&decl.logical_id, decl.props)?),
            Self::AlertChannel(decl) => session.register(AlertChannel::new(&decl.logical_id, decl.props)?),
            Self::PrivateLocation(decl) => {
                session.register(PrivateLocation::new(&decl.logical_id, decl.props)?)
            }
            Self::Dashboard(decl) => session.register(Dashboard::new(&decl.logical_id, decl.props)?),
            Self::StatusPage(decl) => session.register(StatusPage::new(&decl.logical_id, decl.props)?),
            Self::StatusPageService(decl) => {
                session.register(StatusPageService::new(&decl.logical_id, decl.name)?)
            }
            Self::MaintenanceWindow(decl) => {
                session.register(MaintenanceWindow::new(&decl.logical_id, decl.props)?)
            }
            Self::Reference { kind, physical_id } => match kind {
                ResourceKind::AlertChannel
                | ResourceKind::CheckGroup
                | ResourceKind::PrivateLocation
                | ResourceKind::StatusPageService => session.register_reference(kind, physical_id),
                other => Err(CoreError::Validation {
                    field: "kind".to_string(),
                    reason: format!("{} cannot be referenced by physical id", other),
                }),
            },
        }
    }
}

/// Parsed `vigil.config.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project logical id
    #[serde(default)]
    pub logical_id: Option<String>,
    /// Project display name
    #[serde(default)]
    pub project_name: Option<String>,
    /// Source repository
    #[serde(default)]
    pub repo_url: Option<String>,
    /// Session-wide check defaults
    #[serde(default)]
    pub checks: CheckDefaultsConfig,
    /// Runtime catalog; the built-in one when empty
    #[serde(default)]
    pub runtimes: Vec<Runtime>,
    /// Fallback runtime id
    #[serde(default)]
    pub default_runtime_id: Option<String>,
    /// Base path for file references; the config directory when absent
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    /// Declared resources
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
    #[serde(skip)]
    source_dir: Option<PathBuf>,
}

impl ProjectConfig {
    /// Read and parse a config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.source_dir = path.parent().map(Path::to_path_buf);
        debug!(path = %path.display(), resources = config.resources.len(), "loaded config");
        Ok(config)
    }

    /// Parse a config from a string; relative paths resolve against the
    /// working directory
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the source is not a valid config
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(source).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Directory file references resolve against
    #[must_use]
    pub fn resolved_base_path(&self) -> PathBuf {
        let source_dir = self.source_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        match &self.base_path {
            Some(base) if base.is_absolute() => base.clone(),
            Some(base) => source_dir.join(base),
            None => source_dir,
        }
    }

    /// Configure `session`, declare every resource and activate the project
    ///
    /// On failure the session is left as it was before the call: buffered
    /// constructs are dropped and its settings are restored.
    ///
    /// # Errors
    ///
    /// Returns `MissingProjectMetadata` if `logicalId` or `projectName` is
    /// absent, and any error raised while declaring resources
    pub fn apply(self, session: &mut Session) -> Result<(), ConfigError> {
        let logical_id = self.logical_id.clone().ok_or_else(|| CoreError::MissingProjectMetadata {
            field: "logicalId".to_string(),
        })?;
        let project_name = self.project_name.clone().ok_or_else(|| CoreError::MissingProjectMetadata {
            field: "projectName".to_string(),
        })?;
        let mut project = Project::new(&logical_id, project_name)?;
        if let Some(repo_url) = &self.repo_url {
            project = project.with_repo_url(repo_url.clone());
        }

        let previous = session.settings();
        session.set_defaults(self.checks.scope());
        session.set_base_path(self.resolved_base_path());
        if !self.runtimes.is_empty() {
            session.set_runtimes(
                self.runtimes
                    .iter()
                    .map(|runtime| (runtime.name.clone(), runtime.clone()))
                    .collect(),
            );
        }
        if let Some(runtime_id) = &self.default_runtime_id {
            session.set_default_runtime_id(runtime_id.clone());
        }

        session.begin_config_load();
        let declared = self.declare_all(session);
        session.end_config_load();
        let activated = declared.and_then(|declared| session.set_project(project).map(|()| declared));

        match activated {
            Ok(declared) => {
                info!(project = %logical_id, declared, "applied config");
                Ok(())
            }
            Err(err) => {
                let discarded = session.discard_pending();
                session.restore_settings(previous);
                warn!(project = %logical_id, discarded, error = %err, "config not applied");
                Err(err.into())
            }
        }
    }

    fn declare_all(self, session: &mut Session) -> CoreResult<usize> {
        let test_files = self.checks.test_files().to_vec();
        let mut declared = 0;
        for resource in self.resources {
            resource.declare(session)?;
            declared += 1;
        }
        for file in test_files {
            declare_test_file(session, &file)?;
            declared += 1;
        }
        Ok(declared)
    }
}

fn declare_test_file(session: &mut Session, file: &Path) -> CoreResult<Ref> {
    let display = file.display().to_string().replace('\\', "/");
    let logical_id = session.sanitize_logical_id("browser-check", &display);
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| display.clone());
    let spec = CheckSpec::Browser(ScriptCheckSpec {
        code: ContentSource::Entrypoint(file.to_path_buf()),
    });
    let check = Check::new(session, &logical_id, CheckProps::named(name), spec)?;
    session.register(check)
}
