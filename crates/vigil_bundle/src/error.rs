//! Bundler error type.

use vigil_core::CoreError;

/// Error raised while parsing or bundling a check script
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// No runtime with this id is available
    #[error("Runtime '{0}' is not available")]
    UnknownRuntime(String),

    /// Entrypoint exists but has no content
    #[error("Entrypoint {path} is empty")]
    EmptyEntrypoint {
        /// Entrypoint path
        path: String,
    },

    /// A file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A local import does not point at any file
    #[error("Cannot resolve import '{specifier}' from {importer}")]
    MissingDependency {
        /// File containing the import
        importer: String,
        /// Import specifier as written
        specifier: String,
    },

    /// External packages the runtime does not provide
    #[error("Unsupported dependencies in {path}: {}", packages.join(", "))]
    UnsupportedDependencies {
        /// Entrypoint path
        path: String,
        /// Package names
        packages: Vec<String>,
    },

    /// Storage upload failed
    #[error("Failed to upload code bundle: {0}")]
    Upload(String),

    /// Bundle could not be serialized
    #[error("Failed to encode bundle: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl BundleError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<BundleError> for CoreError {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::UnknownRuntime(id) => CoreError::MissingRuntime { id },
            BundleError::Io { path, source } => CoreError::Io {
                path,
                message: source.to_string(),
            },
            other => CoreError::Bundle {
                message: other.to_string(),
            },
        }
    }
}
