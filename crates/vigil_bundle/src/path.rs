//! Path helpers for bundle entries.

use std::path::{Component, Path, PathBuf};

/// Rewrite every directory separator to `/`
#[must_use]
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Path of `target` relative to `base`, with forward slashes
///
/// Targets outside `base` are expressed with leading `..` segments.
#[must_use]
pub fn relative_path(base: &Path, target: &Path) -> String {
    let relative = match target.strip_prefix(base) {
        Ok(stripped) => stripped.to_path_buf(),
        Err(_) => diff_paths(base, target),
    };
    normalize_separators(&relative.to_string_lossy())
}

fn diff_paths(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component<'_>> = base.components().collect();
    let target: Vec<Component<'_>> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target[common..] {
        out.push(component.as_os_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_separators(r"checks\utils\login.ts"), "checks/utils/login.ts");
        assert_eq!(normalize_separators("already/fine.ts"), "already/fine.ts");
    }

    #[test]
    fn test_relative_inside_base() {
        let rel = relative_path(Path::new("/repo"), Path::new("/repo/checks/home.spec.ts"));
        assert_eq!(rel, "checks/home.spec.ts");
    }

    #[test]
    fn test_relative_outside_base() {
        let rel = relative_path(Path::new("/repo/app"), Path::new("/repo/shared/util.ts"));
        assert_eq!(rel, "../shared/util.ts");
    }
}
