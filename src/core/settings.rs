// src/core/settings.rs

//! The user settings file.

use crate::constants::{
    DEFAULT_IMMEDIATE_TIMEOUT, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_SCHEDULED_TIMEOUT,
};
use crate::core::paths::{PathError, expand_path_template};
use crate::models::ConnectionParams;
use crate::system::dispatch::DispatchTimeouts;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading or saving the settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("Failed to read settings file '{path}': {source}")]
    Read {
        /// The file involved.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file or its directory could not be written.
    #[error("Failed to write settings file '{path}': {source}")]
    Write {
        /// The file involved.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid settings TOML.
    #[error("Failed to parse settings file '{path}': {source}")]
    Parse {
        /// The file involved.
        path: String,
        /// The underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// The settings could not be turned into TOML.
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The settings location could not be determined.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Which query runs first when discovering connection parameters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    /// `p4 set`, falling back to `p4 info`.
    #[default]
    Set,
    /// `p4 info`, falling back to `p4 set`.
    Info,
}

/// How Perforce commands pick their server, user and client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Let `p4` use its own environment (`P4PORT`, `P4CONFIG`, ...) instead of the
    /// static values below.
    pub use_system_env: bool,
    /// `P4PORT` used when `use_system_env` is off.
    pub port: String,
    /// `P4CLIENT` used when `use_system_env` is off.
    pub client: String,
    /// `P4USER` used when `use_system_env` is off.
    pub username: String,
    /// Which query GUI connection discovery tries first.
    pub lookup: LookupSource,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            use_system_env: true,
            port: String::new(),
            client: String::new(),
            username: String::new(),
            lookup: LookupSource::Set,
        }
    }
}

impl ConnectionSettings {
    /// The configured server, user and client.
    pub fn static_params(&self) -> ConnectionParams {
        ConnectionParams {
            server: self.port.trim().to_string(),
            user: self.username.trim().to_string(),
            client: self.client.trim().to_string(),
        }
    }
}

/// Where to look for the Perforce executables.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ToolSettings {
    /// Perforce installation directory. Supports `~` and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_root: Option<String>,
}

impl ToolSettings {
    /// `install_root` with `~` and variables expanded. `None` when unset or blank.
    pub fn expanded_install_root(&self) -> Result<Option<PathBuf>, PathError> {
        self.install_root
            .as_deref()
            .map(str::trim)
            .filter(|root| !root.is_empty())
            .map(expand_path_template)
            .transpose()
    }
}

/// Command timeouts, in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Queued operations.
    pub scheduled_ms: u64,
    /// The synchronous attempt of an immediate edit.
    pub immediate_ms: u64,
    /// Each lookup query (`p4 set`, `p4 info`, `p4vc help`, ...).
    pub lookup_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            scheduled_ms: millis(DEFAULT_SCHEDULED_TIMEOUT),
            immediate_ms: millis(DEFAULT_IMMEDIATE_TIMEOUT),
            lookup_ms: millis(DEFAULT_LOOKUP_TIMEOUT),
        }
    }
}

impl TimeoutSettings {
    /// Timeouts for the dispatcher.
    pub fn dispatch(&self) -> DispatchTimeouts {
        DispatchTimeouts {
            scheduled: Duration::from_millis(self.scheduled_ms),
            immediate: Duration::from_millis(self.immediate_ms),
        }
    }

    /// Timeout of each lookup query.
    pub fn lookup(&self) -> Duration {
        Duration::from_millis(self.lookup_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// User settings, stored as TOML.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Check out a file on its first edit.
    pub auto_checkout_on_edit: bool,
    /// Check out the project file when its properties change.
    pub auto_checkout_project: bool,
    /// Check out a file right before it is saved.
    pub auto_checkout_on_save: bool,
    /// Mark files added to a project for add.
    pub auto_add: bool,
    /// Mark files removed from a project for delete.
    pub auto_delete: bool,
    /// Check out files that are already writable.
    pub ignore_read_only_on_edit: bool,
    /// Depot path prefix of the mainline branch, e.g. `//depot/main/`.
    pub mainline_path: String,
    /// `[connection]` table.
    pub connection: ConnectionSettings,
    /// `[tools]` table.
    pub tools: ToolSettings,
    /// `[timeouts]` table.
    pub timeouts: TimeoutSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_checkout_on_edit: false,
            auto_checkout_project: false,
            auto_checkout_on_save: true,
            auto_add: false,
            auto_delete: false,
            ignore_read_only_on_edit: false,
            mainline_path: String::new(),
            connection: ConnectionSettings::default(),
            tools: ToolSettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

impl Settings {
    /// Loads the settings at `path`, writing the defaults there first if the file is missing.
    pub fn load_or_create(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            let defaults = Self::default();
            defaults.save(path)?;
            log::info!("Created default settings at '{}'", path.display());
            return Ok(defaults);
        }
        let content = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Writes the settings to `path`, creating its directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        fs::write(path, toml_string).map_err(|e| SettingsError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// The settings as pretty-printed TOML.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let settings = Settings::load_or_create(&path).unwrap();

        assert_eq!(settings, Settings::default());
        assert!(settings.auto_checkout_on_save);
        assert!(settings.connection.use_system_env);
        assert!(path.is_file());
        // The written file loads back to the same values.
        assert_eq!(Settings::load_or_create(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
auto_add = true
mainline_path = "//depot/main/"

[connection]
use_system_env = false
port = "ssl:perforce:1666"
lookup = "info"

[timeouts]
immediate_ms = 250
"#,
        )
        .unwrap();

        let settings = Settings::load_or_create(&path).unwrap();

        assert!(settings.auto_add);
        assert!(!settings.auto_delete);
        assert_eq!(settings.mainline_path, "//depot/main/");
        assert_eq!(settings.connection.lookup, LookupSource::Info);
        assert_eq!(settings.connection.static_params().server, "ssl:perforce:1666");
        assert_eq!(settings.timeouts.dispatch().immediate, Duration::from_millis(250));
        assert_eq!(settings.timeouts.dispatch().scheduled, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_toml_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "auto_add = maybe").unwrap();

        let err = Settings::load_or_create(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_blank_install_root_is_ignored() {
        let tools = ToolSettings {
            install_root: Some("   ".to_string()),
        };
        assert_eq!(tools.expanded_install_root().unwrap(), None);
    }
}
