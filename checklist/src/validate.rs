//! Allow-listed character validation for check paths and patterns, plus
//! path resolution that refuses to escape the project root. Nothing here
//! ever reaches a shell — checks that fail validation resolve to a
//! `pending` result with an explanatory message, never a panic.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static SAFE_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-./*\[\]{}?]+$").expect("valid regex"));
static SAFE_PATTERN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^[a-zA-Z0-9_\-./*\[\]{}?|\\()+^$\s:=<>@#"'`,;!&%]+$"#).expect("valid regex"));

pub fn is_safe_path(path: &str) -> bool {
    !path.is_empty() && SAFE_PATH_RE.is_match(path)
}

pub fn is_safe_pattern(pattern: &str) -> bool {
    !pattern.is_empty() && SAFE_PATTERN_RE.is_match(pattern)
}

/// Resolves `path` under `project_dir`, rejecting unsafe characters and
/// any resolution that lands outside the project root (symlink escapes
/// included, since resolution follows them before the prefix check).
pub fn validate_path(path: &str, project_dir: &Path) -> Result<PathBuf, String> {
    if !is_safe_path(path) {
        return Err(format!("invalid path characters: {path:?}"));
    }
    let candidate = project_dir.join(path);
    let project_real = dunce_canonicalize(project_dir);
    let resolved = dunce_canonicalize(&candidate);
    if resolved != project_real && !resolved.starts_with(&project_real) {
        return Err(format!("path traversal blocked: {path:?}"));
    }
    Ok(resolved)
}

/// Canonicalizes a path, falling back to a lexical join when the path
/// (or one of its ancestors) does not yet exist — `std::fs::canonicalize`
/// fails on missing paths, but a `file_exists` check on a not-yet-created
/// file is exactly the case this validates.
fn dunce_canonicalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        let mut result = PathBuf::new();
        for component in path.components() {
            match component {
                std::path::Component::ParentDir => {
                    result.pop();
                }
                std::path::Component::CurDir => {}
                other => result.push(other.as_os_str()),
            }
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsafe_characters() {
        assert!(!is_safe_path("foo; rm -rf /"));
        assert!(is_safe_path("src/main.rs"));
    }

    #[test]
    fn blocks_traversal_outside_project_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_path("../../etc/passwd", dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn resolves_path_within_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();
        let resolved = validate_path("README.md", dir.path()).unwrap();
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }
}
