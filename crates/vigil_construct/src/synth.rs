//! Synthesis pipeline: validate, load files, emit the ordered payload.

use crate::construct::Construct;
use crate::project::{Project, ProjectPayload};
use crate::session::Session;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vigil_bundle::{upload_bundle, BundleError, BundleUploader, CheckBundle};
use vigil_core::{ConstructDiagnostics, CoreError, CoreResult, Diagnostic, DiagnosticSink, Diagnostics};

/// A file a construct needs before it can synthesize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    /// Property that referenced the file
    pub property: &'static str,
    /// Path as declared, relative to the base path unless absolute
    pub path: PathBuf,
    /// Runtime to bundle for; plain text files have none
    pub runtime_id: Option<String>,
}

impl FileInput {
    /// A check script bundled with its local dependencies
    #[must_use]
    pub fn bundle(property: &'static str, path: impl Into<PathBuf>, runtime_id: impl Into<String>) -> Self {
        Self {
            property,
            path: path.into(),
            runtime_id: Some(runtime_id.into()),
        }
    }

    /// A file read verbatim
    #[must_use]
    pub fn text(property: &'static str, path: impl Into<PathBuf>) -> Self {
        Self {
            property,
            path: path.into(),
            runtime_id: None,
        }
    }
}

/// Content loaded for one [`FileInput`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedFile {
    /// Bundled script, plus its storage key when uploaded
    Bundle {
        /// The bundle
        bundle: CheckBundle,
        /// Key returned by the uploader
        storage_key: Option<String>,
    },
    /// Plain file content
    Text(String),
}

/// Loaded files keyed by logical id, then property
#[derive(Debug, Clone, Default)]
pub struct LoadedFiles {
    files: IndexMap<String, IndexMap<&'static str, LoadedFile>>,
}

impl LoadedFiles {
    /// Store the content loaded for `property` of `logical_id`
    pub fn insert(&mut self, logical_id: &str, property: &'static str, file: LoadedFile) {
        self.files
            .entry(logical_id.to_string())
            .or_default()
            .insert(property, file);
    }

    /// Content loaded for `property` of `logical_id`
    #[must_use]
    pub fn get(&self, logical_id: &str, property: &str) -> Option<&LoadedFile> {
        self.files.get(logical_id).and_then(|files| files.get(property))
    }

    /// Number of loaded files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.values().map(IndexMap::len).sum()
    }

    /// Whether nothing was loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a full synthesis run
#[derive(Debug, Clone)]
pub struct SynthOutcome {
    /// Every observation made on the way
    pub diagnostics: Diagnostics,
    /// Payload, absent when a fatal observation stopped the run
    pub payload: Option<ProjectPayload>,
}

/// Drives validation, file loading and payload emission for a session
pub struct Synthesizer<'a> {
    session: &'a Session,
    add_test_only: bool,
    uploader: Option<&'a dyn BundleUploader>,
}

impl<'a> Synthesizer<'a> {
    /// Synthesizer over the session's active project
    #[must_use]
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            add_test_only: true,
            uploader: None,
        }
    }

    /// Include or exclude test-only checks
    #[must_use]
    pub fn with_test_only(mut self, add_test_only: bool) -> Self {
        self.add_test_only = add_test_only;
        self
    }

    /// Upload bundles and emit their storage keys
    #[must_use]
    pub fn with_uploader(mut self, uploader: &'a dyn BundleUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    fn project(&self) -> CoreResult<&'a Project> {
        self.session.project().ok_or_else(|| CoreError::InvalidSession {
            reason: "no project is active".to_string(),
        })
    }

    /// Validate every construct of the project
    ///
    /// # Errors
    ///
    /// Returns `InvalidSession` if no project is active
    pub async fn validate(&self) -> CoreResult<Diagnostics> {
        let ctx = self.session.validation_context()?;
        let diagnostics = ctx.validate_project().await;
        debug!(
            observations = diagnostics.len(),
            fatal = diagnostics.is_fatal(),
            "validated project"
        );
        Ok(diagnostics)
    }

    /// Bundle scripts and read files referenced by synthesizable constructs
    ///
    /// Unreadable files become `Error` observations on the referencing
    /// property. Bundles are uploaded when an uploader is set.
    ///
    /// # Errors
    ///
    /// Returns `MissingRuntime` for an unknown runtime and `Bundle` when an
    /// upload fails
    pub async fn load_files(&self, diagnostics: &mut Diagnostics) -> CoreResult<LoadedFiles> {
        let project = self.project()?;
        let bundler = self.session.bundler();
        let mut files = LoadedFiles::default();

        for entry in project.synthesizable(self.add_test_only) {
            let Some(resource) = entry.as_resource() else {
                continue;
            };
            let inputs = resource.file_inputs();
            if inputs.is_empty() {
                continue;
            }

            let mut scoped = ConstructDiagnostics::new(entry.kind().as_str(), entry.logical_id().as_str());
            for input in inputs {
                let path = self.resolve(&input.path);
                let loaded = match &input.runtime_id {
                    Some(runtime_id) => match bundler.bundle(&path, runtime_id).await {
                        Ok(bundle) => {
                            let storage_key = match self.uploader {
                                Some(uploader) => Some(upload_bundle(uploader, &bundle).await?),
                                None => None,
                            };
                            Some(LoadedFile::Bundle { bundle, storage_key })
                        }
                        Err(BundleError::UnknownRuntime(id)) => return Err(CoreError::MissingRuntime { id }),
                        Err(err) => {
                            scoped.add(Diagnostic::file_load_error(
                                input.property,
                                &path.display().to_string(),
                                err,
                            ));
                            None
                        }
                    },
                    None => match tokio::fs::read_to_string(&path).await {
                        Ok(content) => Some(LoadedFile::Text(content)),
                        Err(err) => {
                            scoped.add(Diagnostic::file_load_error(
                                input.property,
                                &path.display().to_string(),
                                err,
                            ));
                            None
                        }
                    },
                };

                if let Some(file) = loaded {
                    debug!(id = %entry.logical_id(), property = input.property, "loaded file");
                    files.insert(entry.logical_id().as_str(), input.property, file);
                }
            }
            diagnostics.extend(scoped.into_inner());
        }

        Ok(files)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.session.base_path().join(path)
        }
    }

    /// Emit the ordered payload
    ///
    /// # Errors
    ///
    /// Returns error if no project is active or a construct cannot be synthesized
    pub fn synthesize(&self, files: &LoadedFiles) -> CoreResult<ProjectPayload> {
        self.project()?.synthesize(self.add_test_only, files)
    }

    /// Validate, load files and synthesize, stopping at the first fatal stage
    ///
    /// # Errors
    ///
    /// Returns thrown errors from any stage; fatal observations are not errors
    pub async fn run(&self) -> CoreResult<SynthOutcome> {
        let mut diagnostics = self.validate().await?;
        if diagnostics.is_fatal() {
            warn!(errors = diagnostics.errors().count(), "validation failed, skipping synthesis");
            return Ok(SynthOutcome {
                diagnostics,
                payload: None,
            });
        }

        let files = self.load_files(&mut diagnostics).await?;
        if diagnostics.is_fatal() {
            warn!(errors = diagnostics.errors().count(), "file loading failed, skipping synthesis");
            return Ok(SynthOutcome {
                diagnostics,
                payload: None,
            });
        }

        let payload = self.synthesize(&files)?;
        info!(
            project = %payload.project.logical_id,
            resources = payload.resources.len(),
            files = files.len(),
            "synthesized project"
        );
        Ok(SynthOutcome {
            diagnostics,
            payload: Some(payload),
        })
    }
}
