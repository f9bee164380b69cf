//! Core error types for vigil.
//!
//! These are thrown errors: programmer or environment mistakes that make
//! further processing meaningless. User-input problems are reported through
//! [`crate::Diagnostics`] instead.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Logical id does not match `^[A-Za-z0-9_\-/#.]+$`
    InvalidLogicalId {
        /// The rejected id
        id: String,
    },

    /// A construct of this kind already owns the logical id
    AlreadyExists {
        /// Resource kind tag
        kind: String,
        /// Logical id
        id: String,
    },

    /// Construct created or looked up without a usable session context
    InvalidSession {
        /// What was missing
        reason: String,
    },

    /// Runtime id not present in the available runtimes
    MissingRuntime {
        /// Requested runtime id
        id: String,
    },

    /// Project metadata required for synthesis is absent
    MissingProjectMetadata {
        /// Missing field
        field: String,
    },

    /// Validation error outside the diagnostics pass
    Validation {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Not found
    NotFound {
        /// Resource kind tag
        kind: String,
        /// Logical id
        id: String,
    },

    /// File system error
    Io {
        /// Path involved
        path: String,
        /// Underlying error message
        message: String,
    },

    /// Payload encoding failed
    Encoding {
        /// Underlying error message
        message: String,
    },

    /// Bundling a check script failed
    Bundle {
        /// Underlying error message
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLogicalId { id } => write!(
                f,
                "Invalid logical id '{}': only A-Z, a-z, 0-9, '_', '-', '/', '#' and '.' are allowed",
                id
            ),
            Self::AlreadyExists { kind, id } => write!(
                f,
                "Resource of type '{}' with logical id '{}' already exists",
                kind, id
            ),
            Self::InvalidSession { reason } => write!(f, "Invalid session: {}", reason),
            Self::MissingRuntime { id } => write!(f, "Runtime '{}' is not available", id),
            Self::MissingProjectMetadata { field } => {
                write!(f, "Missing project metadata: {}", field)
            }
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::Io { path, message } => write!(f, "I/O error for {}: {}", path, message),
            Self::Encoding { message } => write!(f, "Encoding error: {}", message),
            Self::Bundle { message } => write!(f, "Bundle error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::NotFound {
            kind: "check".to_string(),
            id: "homepage".to_string(),
        };
        assert_eq!(format!("{}", err), "check not found: homepage");
    }

    #[test]
    fn test_already_exists_display() {
        let err = CoreError::AlreadyExists {
            kind: "check".to_string(),
            id: "homepage".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("already exists"));
        assert!(s.contains("homepage"));
    }

    #[test]
    fn test_invalid_logical_id_display() {
        let err = CoreError::InvalidLogicalId {
            id: "bad id!".to_string(),
        };
        assert!(err.to_string().contains("bad id!"));
    }

    #[test]
    fn test_from_serde_error() {
        let err: CoreError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, CoreError::Encoding { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::MissingRuntime { id: "2024.09".to_string() };
        let err2 = CoreError::MissingRuntime { id: "2024.09".to_string() };
        assert_eq!(err1, err2);

        let err3 = CoreError::MissingRuntime { id: "2025.04".to_string() };
        assert_ne!(err1, err3);
    }
}
