//! Execution runtimes.
//!
//! A runtime fixes which external packages a check script may import. The
//! bundler selects its parser from the runtime a check runs on.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Node built-in modules, importable with or without the `node:` scheme
pub const NODE_BUILTINS: &[&str] = &[
    "_http_agent",
    "_http_client",
    "_http_common",
    "_http_incoming",
    "_http_outgoing",
    "_http_server",
    "_stream_duplex",
    "_stream_passthrough",
    "_stream_readable",
    "_stream_transform",
    "_stream_wrap",
    "_stream_writable",
    "_tls_common",
    "_tls_wrap",
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Built-ins only reachable through the `node:` scheme
pub const NODE_SCHEME_BUILTINS: &[&str] = &["sea", "sqlite", "test"];

/// A remote execution runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runtime {
    /// Runtime id, e.g. `2025.04`
    pub name: String,
    /// Whether multi-step checks may run on it
    #[serde(default)]
    pub multi_step_support: bool,
    /// Packages provided by the runtime, name to version
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
}

impl Runtime {
    /// Create a runtime without packages
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multi_step_support: false,
            dependencies: IndexMap::new(),
        }
    }

    /// Add a provided package
    #[must_use]
    pub fn with_dependency(mut self, name: &str, version: &str) -> Self {
        self.dependencies.insert(name.to_string(), version.to_string());
        self
    }

    /// Set multi-step support
    #[must_use]
    pub fn with_multi_step_support(mut self, supported: bool) -> Self {
        self.multi_step_support = supported;
        self
    }

    /// Whether a package may be imported by scripts on this runtime
    #[must_use]
    pub fn provides(&self, package: &str) -> bool {
        if let Some(builtin) = package.strip_prefix("node:") {
            return NODE_BUILTINS.contains(&builtin) || NODE_SCHEME_BUILTINS.contains(&builtin);
        }
        NODE_BUILTINS.contains(&package) || self.dependencies.contains_key(package)
    }
}

/// Runtimes available when no catalog is configured
#[must_use]
pub fn builtin_runtimes() -> IndexMap<String, Runtime> {
    let base = |name: &str| {
        Runtime::new(name)
            .with_dependency("@playwright/test", "1.45.3")
            .with_dependency("axios", "1.7.2")
            .with_dependency("chai", "4.3.7")
            .with_dependency("date-fns", "2.30.0")
            .with_dependency("form-data", "4.0.0")
            .with_dependency("jsonwebtoken", "9.0.2")
            .with_dependency("lodash", "4.17.21")
            .with_dependency("moment", "2.30.1")
            .with_dependency("uuid", "9.0.1")
    };

    let runtimes = [
        base("2024.09").with_multi_step_support(true),
        base("2025.04")
            .with_dependency("@playwright/test", "1.51.1")
            .with_dependency("otpauth", "9.3.6")
            .with_multi_step_support(true),
    ];

    runtimes
        .into_iter()
        .map(|runtime| (runtime.name.clone(), runtime))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_provides_builtins() {
        let runtime = Runtime::new("bare");
        assert!(runtime.provides("fs"));
        assert!(runtime.provides("node:path"));
        assert!(!runtime.provides("axios"));
    }

    #[test]
    fn test_runtime_provides_less_common_builtins() {
        let runtime = Runtime::new("bare");
        for builtin in ["perf_hooks", "vm", "v8", "async_hooks", "http2", "diagnostics_channel"] {
            assert!(runtime.provides(builtin), "{builtin}");
            assert!(runtime.provides(&format!("node:{builtin}")), "node:{builtin}");
        }
        assert!(runtime.provides("node:test"));
        assert!(!runtime.provides("test"));
        assert!(!runtime.provides("node:left-pad"));
    }

    #[test]
    fn test_runtime_with_dependency() {
        let runtime = Runtime::new("custom").with_dependency("axios", "1.0.0");
        assert!(runtime.provides("axios"));
        assert_eq!(runtime.dependencies.get("axios"), Some(&"1.0.0".to_string()));
    }

    #[test]
    fn test_builtin_catalog() {
        let runtimes = builtin_runtimes();
        assert_eq!(runtimes.len(), 2);
        let latest = &runtimes["2025.04"];
        assert!(latest.multi_step_support);
        assert_eq!(latest.dependencies["@playwright/test"], "1.51.1");
        assert!(latest.provides("otpauth"));
        assert!(!runtimes["2024.09"].provides("otpauth"));
    }

    #[test]
    fn test_runtime_deserialize_defaults() {
        let runtime: Runtime = serde_json::from_str(r#"{"name":"edge"}"#).unwrap();
        assert!(!runtime.multi_step_support);
        assert!(runtime.dependencies.is_empty());
    }
}
