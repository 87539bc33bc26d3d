// src/cli/handlers/commons.rs

//! Shared helpers for the handlers.

use crate::core::paths::absolute_lexical;
use std::path::{Path, PathBuf};

/// Resolves a path given on the command line against the current directory.
pub fn resolve_target(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        return PathBuf::new();
    }
    absolute_lexical(path)
}

/// [`resolve_target`] for each path.
pub fn resolve_targets(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths.iter().map(|p| resolve_target(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target_is_absolute() {
        let resolved = resolve_target(Path::new("src/main.cs"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("src/main.cs"));
    }

    #[test]
    fn test_empty_target_stays_empty() {
        assert_eq!(resolve_target(Path::new("")), PathBuf::new());
    }
}
