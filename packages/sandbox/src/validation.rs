// ABOUTME: Input validation applied before any process or filesystem access
// ABOUTME: Package-name allow-pattern and session path confinement

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SandboxError};

/// Strict allow-pattern for package names: ASCII alphanumerics plus `.`,
/// `_`, and `-`. Anything else is rejected before it can reach a shell.
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Resolve a caller-supplied relative path against the session root.
///
/// Absolute paths and any `..` component are rejected up front, so every
/// resolved path stays confined under `root`. An empty path resolves to the
/// root itself (used for directory listings).
pub fn resolve_session_path(root: &Path, relative: &str) -> Result<PathBuf> {
    if relative.starts_with('/') || relative.starts_with('\\') {
        return Err(SandboxError::InvalidPath);
    }

    let path = Path::new(relative);
    if path.is_absolute() {
        return Err(SandboxError::InvalidPath);
    }

    for component in path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SandboxError::InvalidPath)
            }
            Component::Normal(_) | Component::CurDir => {}
        }
    }

    Ok(root.join(path))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("requests")]
    #[case("good-name_1.2")]
    #[case("numpy")]
    #[case("left-pad")]
    fn test_valid_package_names(#[case] name: &str) {
        assert!(is_valid_package_name(name));
    }

    #[rstest]
    #[case("")]
    #[case("rm -rf /")]
    #[case("pkg;echo pwned")]
    #[case("pkg&&curl evil")]
    #[case("pkg`id`")]
    #[case("pkg$(id)")]
    #[case("pkg name")]
    fn test_invalid_package_names(#[case] name: &str) {
        assert!(!is_valid_package_name(name));
    }

    #[rstest]
    #[case("data.txt")]
    #[case("nested/dir/file.py")]
    #[case("./relative.txt")]
    #[case("")]
    fn test_confined_paths_resolve(#[case] relative: &str) {
        let root = Path::new("/tmp/session-abc");
        let resolved = resolve_session_path(root, relative).unwrap();
        assert!(resolved.starts_with(root));
    }

    #[rstest]
    #[case("../outside.txt")]
    #[case("nested/../../outside.txt")]
    #[case("/etc/passwd")]
    #[case("..")]
    #[case("\\windows\\style")]
    fn test_escaping_paths_rejected(#[case] relative: &str) {
        let root = Path::new("/tmp/session-abc");
        let err = resolve_session_path(root, relative).unwrap_err();
        assert!(matches!(err, SandboxError::InvalidPath));
        assert_eq!(err.to_string(), "Path escapes session workspace");
    }
}
