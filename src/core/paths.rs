// src/core/paths.rs

//! Where the settings live, and path helpers.

use crate::constants::{CONFIG_DIR_NAME, SETTINGS_ENV_VAR, SETTINGS_FILENAME};
use lazy_static::lazy_static;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use super::commons::lock_unpoisoned;

lazy_static! {
    static ref NIFTY_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Errors locating or expanding paths.
#[derive(Error, Debug)]
pub enum PathError {
    /// The platform has no config directory.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// The config directory could not be created.
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        /// Directory that was being created.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// `~` or a variable in a path could not be expanded.
    #[error("Failed to expand path template '{template}': {message}")]
    Expansion {
        /// The path as written in the settings.
        template: String,
        /// What `shellexpand` reported.
        message: String,
    },
}

/// Returns the nifty configuration directory (`~/.config/nifty-p4` on Linux),
/// creating it on first use. The result is memoized for the process lifetime.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = lock_unpoisoned(&NIFTY_CONFIG_DIR);

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Returns the settings file path. `NIFTY_CONFIG` wins over the config directory.
pub fn get_settings_path() -> Result<PathBuf, PathError> {
    if let Some(explicit) = env::var_os(SETTINGS_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(explicit));
    }
    get_config_dir().map(|dir| dir.join(SETTINGS_FILENAME))
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a user-supplied path.
pub fn expand_path_template(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Makes `path` absolute against the current directory and removes `.` and `..`
/// components lexically. Symbolic links are not resolved.
pub fn absolute_lexical(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut cleaned = PathBuf::new();
    for component in dunce::simplified(&absolute).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(component);
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

/// The directory commands for `path` run in. Bare file names run in the current directory.
pub fn directory_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_lexical_removes_dot_components() {
        let base = std::env::current_dir().unwrap();
        let resolved = absolute_lexical(Path::new("./a/../b/./c.txt"));
        assert_eq!(resolved, absolute_lexical(&base.join("b").join("c.txt")));
        assert!(resolved.is_absolute());
    }

    #[test]
    fn test_directory_of_bare_file_is_current_dir() {
        assert_eq!(directory_of(Path::new("main.cs")), PathBuf::from("."));
        assert_eq!(
            directory_of(Path::new("/work/src/main.cs")),
            PathBuf::from("/work/src")
        );
    }

    #[test]
    fn test_expand_path_template_plain_path_is_unchanged() {
        let expanded = expand_path_template("/opt/perforce/bin").unwrap();
        assert_eq!(expanded, PathBuf::from("/opt/perforce/bin"));
    }

    #[test]
    fn test_expand_path_template_unknown_variable_fails() {
        let result = expand_path_template("$NIFTY_SURELY_UNDEFINED_VARIABLE/bin");
        assert!(matches!(result, Err(PathError::Expansion { .. })));
    }
}
