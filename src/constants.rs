// src/constants.rs

//! Names, locations and default timeouts.

use std::time::Duration;

/// The name of the directory holding nifty's configuration (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "nifty-p4";

/// The name of the settings file (inside the configuration directory).
pub const SETTINGS_FILENAME: &str = "config.toml";

/// Environment variable that overrides the settings file location.
pub const SETTINGS_ENV_VAR: &str = "NIFTY_CONFIG";

/// Default wait for a scheduled command before it is killed.
pub const DEFAULT_SCHEDULED_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default wait for the synchronous attempt of an immediate command.
pub const DEFAULT_IMMEDIATE_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Default wait for captured lookups (`p4 set`, `p4 info`, `p4 integrated`, `p4vc help`).
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(10_000);

/// A zero timeout launches the process and does not wait for it.
pub const FIRE_AND_FORGET: Duration = Duration::ZERO;

/// Interval between two exit polls of a running child.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Extra time given to the output readers after a child exits at its deadline.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Marker printed by `p4vc help <cmd>` when the subcommand does not exist.
pub const P4VC_INVALID_COMMAND_MARKER: &str = "Invalid help command request...";

/// Conventional 64-bit install location of the Perforce tools on Windows.
pub const WINDOWS_INSTALL_ROOT: &str = r"C:\Program Files\Perforce";

/// Registry key holding the Perforce environment (`P4INSTROOT`, `P4DIFF`).
pub const REGISTRY_ENVIRONMENT_KEY: &str = r"SOFTWARE\Perforce\Environment";

/// Legacy registry key under which older installers registered `p4.exe`.
pub const REGISTRY_APP_PATHS_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths";

/// Name of the command-line client.
pub const P4_EXE: &str = if cfg!(windows) { "p4.exe" } else { "p4" };

/// Name of the visual client.
pub const P4V_EXE: &str = if cfg!(windows) { "p4v.exe" } else { "p4v" };

/// Candidate names of the visual client launcher, in lookup order.
/// Windows installers since 2021.1 only ship the `.bat` script.
#[cfg(windows)]
pub const P4VC_CANDIDATES: &[&str] = &["p4vc.bat", "p4vc.exe"];

/// Candidate names of the visual client launcher, in lookup order.
#[cfg(not(windows))]
pub const P4VC_CANDIDATES: &[&str] = &["p4vc"];
