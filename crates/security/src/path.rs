//! Path validation for file tools.
//!
//! Paths are resolved to an absolute form (symlinks followed when the path
//! exists, `.`/`..` folded lexically otherwise) and then compared
//! component-wise against forbidden prefixes and optional allowed roots.
//! Forbidden prefixes win over allowed roots.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Cannot resolve '{path}': {reason}")]
    Unresolvable { path: String, reason: String },
}

/// Validate that a path is safe to access and return its resolved form.
pub fn validate_path(
    path: &str,
    allowed_roots: &[String],
    forbidden_paths: &[String],
) -> Result<PathBuf, PathValidationError> {
    let resolved = resolve(Path::new(&expand_tilde(path))).map_err(|reason| {
        PathValidationError::Unresolvable {
            path: path.into(),
            reason,
        }
    })?;

    for pattern in forbidden_paths {
        let prefix = lexical_normalize(Path::new(&expand_tilde(pattern)));
        if resolved.starts_with(&prefix) {
            return Err(PathValidationError::ForbiddenPath {
                path: path.into(),
                pattern: pattern.clone(),
            });
        }
    }

    if !allowed_roots.is_empty()
        && !allowed_roots
            .iter()
            .any(|root| resolved.starts_with(lexical_normalize(Path::new(&expand_tilde(root)))))
    {
        return Err(PathValidationError::OutsideAllowedRoots { path: path.into() });
    }

    Ok(resolved)
}

/// Absolute, symlink-free when possible.
fn resolve(path: &Path) -> Result<PathBuf, String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| e.to_string())?
            .join(path)
    };

    if let Ok(canonical) = absolute.canonicalize() {
        return Ok(canonical);
    }

    // Not there yet (e.g. a file about to be created): canonicalize the parent.
    let normalized = lexical_normalize(&absolute);
    if let (Some(parent), Some(name)) = (normalized.parent(), normalized.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return Ok(parent.join(name));
    }
    Ok(normalized)
}

/// Fold `.` and `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn expand_tilde(path: &str) -> String {
    let home = std::env::var(if cfg!(windows) { "USERPROFILE" } else { "HOME" });
    match (path.strip_prefix('~'), home) {
        (Some(rest), Ok(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{home}{rest}")
        }
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_path_passes() {
        assert!(validate_path("/home/user/project/file.txt", &[], &[]).is_ok());
    }

    #[test]
    fn forbidden_prefix_blocked() {
        let forbidden = vec!["/etc/shadow".into()];
        match validate_path("/etc/shadow", &[], &forbidden).unwrap_err() {
            PathValidationError::ForbiddenPath { pattern, .. } => assert_eq!(pattern, "/etc/shadow"),
            other => panic!("Expected ForbiddenPath, got: {other}"),
        }
    }

    #[test]
    fn traversal_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let allowed = vec![root.to_string_lossy().to_string()];

        let inside = root.join("notes.txt");
        assert!(validate_path(inside.to_str().unwrap(), &allowed, &[]).is_ok());

        let escape = format!("{}/../../etc/passwd", root.display());
        assert!(matches!(
            validate_path(&escape, &allowed, &[]),
            Err(PathValidationError::OutsideAllowedRoots { .. })
        ));
    }

    #[test]
    fn prefix_match_is_per_component() {
        let allowed = vec!["/srv/data".into()];
        assert!(validate_path("/srv/data/a.txt", &allowed, &[]).is_ok());
        assert!(validate_path("/srv/database/a.txt", &allowed, &[]).is_err());
    }

    #[test]
    fn forbidden_takes_precedence_over_allowed() {
        let allowed = vec!["/home/user".into()];
        let forbidden = vec!["/home/user/.ssh".into()];
        assert!(validate_path("/home/user/.ssh/id_rsa", &allowed, &forbidden).is_err());
    }

    #[test]
    fn tilde_patterns_expand() {
        if let Ok(home) = std::env::var("HOME") {
            let forbidden = vec!["~/.ssh".into()];
            let target = format!("{home}/.ssh/id_rsa");
            assert!(validate_path(&target, &[], &forbidden).is_err());
        }
    }

    #[test]
    fn lexical_normalize_folds_dots() {
        assert_eq!(
            lexical_normalize(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
    }
}
