//! Dependency-closure bundler.

use crate::error::BundleError;
use crate::parser::{ImportScanner, ScriptParser};
use crate::path::relative_path;
use crate::runtime::Runtime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A bundled file, path relative to the project base path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFileRef {
    /// Forward-slash path relative to the base path
    pub path: String,
    /// File content
    pub content: String,
}

/// A check script and its local dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckBundle {
    /// Entrypoint content
    pub script: String,
    /// Entrypoint path relative to the base path
    pub script_path: String,
    /// Local dependencies, unique by path
    pub dependencies: Vec<SharedFileRef>,
    /// blake3 digest over paths and contents
    pub checksum: String,
}

/// Builds [`CheckBundle`]s
///
/// Holds no mutable state; concurrent calls are safe.
#[derive(Debug, Clone)]
pub struct Bundler {
    base_path: PathBuf,
    runtimes: IndexMap<String, Runtime>,
}

impl Bundler {
    /// Create a bundler resolving paths against `base_path`
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>, runtimes: IndexMap<String, Runtime>) -> Self {
        Self {
            base_path: base_path.into(),
            runtimes,
        }
    }

    /// Base path bundle entries are relative to
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Select the parser for a runtime
    ///
    /// # Errors
    ///
    /// Returns `UnknownRuntime` if the runtime is not available
    pub fn parser_for(&self, runtime_id: &str) -> Result<ImportScanner, BundleError> {
        self.runtimes
            .get(runtime_id)
            .cloned()
            .map(ImportScanner::new)
            .ok_or_else(|| BundleError::UnknownRuntime(runtime_id.to_string()))
    }

    /// Bundle `entrypoint` for the given runtime
    ///
    /// The runtime is checked before any file is touched.
    ///
    /// # Errors
    ///
    /// Returns error if the runtime is unknown, the entrypoint is missing or
    /// empty, or parsing fails
    pub async fn bundle(&self, entrypoint: &Path, runtime_id: &str) -> Result<CheckBundle, BundleError> {
        let parser = self.parser_for(runtime_id)?;

        let metadata = tokio::fs::metadata(entrypoint)
            .await
            .map_err(|e| BundleError::io(entrypoint, e))?;
        if metadata.len() == 0 {
            return Err(BundleError::EmptyEntrypoint {
                path: entrypoint.display().to_string(),
            });
        }

        self.bundle_with(&parser, entrypoint).await
    }

    /// Bundle `entrypoint` with an explicit parser
    ///
    /// # Errors
    ///
    /// Returns error if parsing fails
    pub async fn bundle_with(
        &self,
        parser: &dyn ScriptParser,
        entrypoint: &Path,
    ) -> Result<CheckBundle, BundleError> {
        let parsed = parser.parse(entrypoint).await?;

        // Parsers hand back canonical paths; compare against a canonical base.
        let base = tokio::fs::canonicalize(&self.base_path)
            .await
            .unwrap_or_else(|_| self.base_path.clone());

        let mut dependencies: IndexMap<String, SharedFileRef> = IndexMap::new();
        for dep in parsed.dependencies {
            let path = relative_path(&base, &dep.file_path);
            dependencies.entry(path.clone()).or_insert(SharedFileRef {
                path,
                content: dep.content,
            });
        }

        let script_path = relative_path(&base, &parsed.entrypoint.file_path);
        let dependencies: Vec<SharedFileRef> = dependencies.into_values().collect();
        let checksum = checksum(&script_path, &parsed.entrypoint.content, &dependencies);

        debug!(
            entrypoint = %script_path,
            dependencies = dependencies.len(),
            "bundled check script"
        );

        Ok(CheckBundle {
            script: parsed.entrypoint.content,
            script_path,
            dependencies,
            checksum,
        })
    }
}

fn checksum(script_path: &str, script: &str, dependencies: &[SharedFileRef]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(script_path.as_bytes());
    hasher.update(&[0]);
    hasher.update(script.as_bytes());
    for dep in dependencies {
        hasher.update(&[0]);
        hasher.update(dep.path.as_bytes());
        hasher.update(&[0]);
        hasher.update(dep.content.as_bytes());
    }
    hex::encode(hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParsedFile, SourceFile};
    use crate::runtime::builtin_runtimes;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_bundle_three_dependencies() {
        let dir = TempDir::new().unwrap();
        let entry = write(
            dir.path(),
            "checks/home.spec.ts",
            "import { test } from '@playwright/test'\nimport './a'\nimport './nested/b'\n",
        );
        write(dir.path(), "checks/a.ts", "export const a = 1\n");
        write(dir.path(), "checks/nested/b.ts", "import '../../lib/c'\n");
        write(dir.path(), "lib/c.ts", "export const c = 3\n");

        let bundler = Bundler::new(dir.path(), builtin_runtimes());
        let bundle = bundler.bundle(&entry, "2025.04").await.unwrap();

        assert_eq!(bundle.script_path, "checks/home.spec.ts");
        let paths: Vec<&str> = bundle.dependencies.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["checks/a.ts", "checks/nested/b.ts", "lib/c.ts"]);
    }

    #[tokio::test]
    async fn test_bundle_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "main.ts", "import './dep'\n");
        write(dir.path(), "dep.ts", "export {}\n");

        let bundler = Bundler::new(dir.path(), builtin_runtimes());
        let first = bundler.bundle(&entry, "2024.09").await.unwrap();
        let second = bundler.bundle(&entry, "2024.09").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.checksum.len(), 64);
    }

    #[tokio::test]
    async fn test_bundle_unknown_runtime_before_io() {
        let bundler = Bundler::new("/nonexistent", builtin_runtimes());
        let err = bundler
            .bundle(Path::new("/nonexistent/main.ts"), "1999.01")
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::UnknownRuntime(_)));
    }

    #[tokio::test]
    async fn test_bundle_empty_entrypoint() {
        let dir = TempDir::new().unwrap();
        let entry = write(dir.path(), "empty.spec.ts", "");

        let bundler = Bundler::new(dir.path(), builtin_runtimes());
        let err = bundler.bundle(&entry, "2025.04").await.unwrap_err();
        assert!(matches!(err, BundleError::EmptyEntrypoint { .. }));
    }

    #[tokio::test]
    async fn test_bundle_missing_entrypoint() {
        let dir = TempDir::new().unwrap();
        let bundler = Bundler::new(dir.path(), builtin_runtimes());
        let err = bundler
            .bundle(&dir.path().join("missing.spec.ts"), "2025.04")
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Io { .. }));
    }

    struct DuplicatingParser {
        root: PathBuf,
    }

    #[async_trait]
    impl ScriptParser for DuplicatingParser {
        async fn parse(&self, _entrypoint: &Path) -> Result<ParsedFile, BundleError> {
            let dep = SourceFile {
                file_path: self.root.join("shared").join("util.ts"),
                content: "first".to_string(),
            };
            let dup = SourceFile {
                content: "second".to_string(),
                ..dep.clone()
            };
            Ok(ParsedFile {
                entrypoint: SourceFile {
                    file_path: self.root.join("main.ts"),
                    content: "main".to_string(),
                },
                dependencies: vec![dep, dup],
            })
        }
    }

    #[tokio::test]
    async fn test_bundle_dedupes_within_one_parse() {
        let dir = TempDir::new().unwrap();
        let root = tokio::fs::canonicalize(dir.path()).await.unwrap();
        let bundler = Bundler::new(&root, builtin_runtimes());
        let parser = DuplicatingParser { root: root.clone() };

        let bundle = bundler.bundle_with(&parser, &root.join("main.ts")).await.unwrap();
        assert_eq!(bundle.dependencies.len(), 1);
        assert_eq!(bundle.dependencies[0].path, "shared/util.ts");
        assert_eq!(bundle.dependencies[0].content, "first");
    }
}
