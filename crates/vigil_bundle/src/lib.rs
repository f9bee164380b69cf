//! Vigil Bundler
//!
//! Resolves a check script and the transitive closure of its local imports
//! into a self-contained bundle. External packages are never packaged; they
//! are checked against the selected runtime and resolved remotely.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundler;
pub mod error;
pub mod parser;
pub mod path;
pub mod runtime;
pub mod upload;

pub use bundler::{Bundler, CheckBundle, SharedFileRef};
pub use error::BundleError;
pub use parser::{ImportScanner, ParsedFile, ScriptParser, SourceFile};
pub use path::{normalize_separators, relative_path};
pub use runtime::{builtin_runtimes, Runtime};
pub use upload::{upload_bundle, BundleUploader, UploadBody};
