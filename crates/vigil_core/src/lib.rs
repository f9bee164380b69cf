//! Vigil Core Types
//!
//! Identifiers, lazy references, the thrown-error type and the diagnostics
//! engine shared by every construct. Pure types, no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diagnostic;
pub mod error;
pub mod id;

// Re-exports
pub use diagnostic::{
    ConstructDiagnostics, Diagnostic, DiagnosticCause, DiagnosticSink, Diagnostics, Severity,
};
pub use error::{CoreError, CoreResult};
pub use id::{
    sanitize_logical_id, validate_physical_id_is_numeric, validate_physical_id_is_uuid,
    LogicalId, PhysicalId, Ref, SanitizedId, SanitizedIdTracker,
};
