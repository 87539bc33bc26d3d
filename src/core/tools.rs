// src/core/tools.rs

//! Detects the installed Perforce tools and the `p4vc` subcommands they support.

use crate::constants::{
    P4_EXE, P4V_EXE, P4VC_CANDIDATES, P4VC_INVALID_COMMAND_MARKER, REGISTRY_APP_PATHS_KEY,
    REGISTRY_ENVIRONMENT_KEY, WINDOWS_INSTALL_ROOT,
};
use crate::core::paths::PathError;
use crate::core::settings::ToolSettings;
use crate::models::CommandLine;
use crate::system::process_runner::CommandRunner;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// `p4vc` subcommands whose presence changes how operations are launched.
const PROBED_P4VC_COMMANDS: [&str; 3] = ["history", "diffhave", "workspacewindow"];

/// `p4vc` subcommands the installed version knows.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct P4vcFeatures {
    /// `p4vc history`.
    pub history: bool,
    /// `p4vc diffhave`.
    pub diffhave: bool,
    /// `p4vc workspacewindow`.
    pub workspacewindow: bool,
}

/// Where a `P4DIFF` setting was found.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiffSource {
    /// `HKEY_LOCAL_MACHINE`.
    RegistryMachine,
    /// `HKEY_CURRENT_USER`.
    RegistryUser,
    /// The process environment.
    Environment,
}

/// A user-configured diff tool (`P4DIFF`).
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CustomDiff {
    /// Where it was set.
    pub source: DiffSource,
    /// The diff program.
    pub command: String,
}

/// What discovery found. Replaced as a whole on refresh, never mutated.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolAvailability {
    /// The Perforce installation directory, if one was found.
    pub install_root: Option<PathBuf>,
    /// Path of `p4`, when found.
    pub p4: Option<PathBuf>,
    /// Path of `p4v`, when found.
    pub p4v: Option<PathBuf>,
    /// Path of `p4vc`, when found.
    pub p4vc: Option<PathBuf>,
    /// User-configured diff tool.
    pub custom_diff: Option<CustomDiff>,
    /// Empty when `p4vc` is missing.
    pub p4vc_features: P4vcFeatures,
}

impl ToolAvailability {
    /// `(found, description)` pairs for the discovery report.
    pub fn report(&self) -> Vec<(bool, String)> {
        let tool = |name: &str, path: &Option<PathBuf>| match path {
            Some(p) => (true, format!("{} ({})", name, p.display())),
            None => (false, name.to_string()),
        };
        let mut lines = vec![
            tool("p4", &self.p4),
            tool("p4v", &self.p4v),
            tool("p4vc", &self.p4vc),
            (
                self.custom_diff.is_some(),
                match &self.custom_diff {
                    Some(diff) => format!("custom diff tool ({})", diff.command),
                    None => "custom diff tool".to_string(),
                },
            ),
        ];
        lines.push((self.p4vc_features.history, "p4vc history".to_string()));
        lines.push((self.p4vc_features.diffhave, "p4vc diffhave".to_string()));
        lines.push((
            self.p4vc_features.workspacewindow,
            "p4vc workspacewindow".to_string(),
        ));
        lines
    }
}

/// Process environment inputs of discovery, captured up front so discovery itself is
/// a pure function of its arguments and the filesystem.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryEnvironment {
    /// `install_root` from the settings, already expanded.
    pub install_root_override: Option<PathBuf>,
    /// `PATH`.
    pub path_var: Option<OsString>,
    /// `P4DIFF`.
    pub p4diff_var: Option<String>,
    /// Query the Windows registry with `reg query`.
    pub use_registry: bool,
}

impl DiscoveryEnvironment {
    /// Reads the environment of the current process.
    pub fn from_process(settings: &ToolSettings) -> Result<Self, PathError> {
        Ok(Self {
            install_root_override: settings.expanded_install_root()?,
            path_var: env::var_os("PATH"),
            p4diff_var: env::var("P4DIFF").ok().filter(|v| !v.trim().is_empty()),
            use_registry: cfg!(windows),
        })
    }
}

/// Finds the Perforce tools and probes `p4vc`.
pub fn discover(environment: &DiscoveryEnvironment, runner: &dyn CommandRunner) -> ToolAvailability {
    let mut tools = ToolAvailability {
        install_root: find_install_root(environment, runner),
        ..ToolAvailability::default()
    };

    match &tools.install_root {
        Some(root) => {
            log::info!("Found Perforce installation at '{}'", root.display());
            tools.p4 = Some(root.join(P4_EXE)).filter(|p| p.is_file());
            tools.p4v = Some(root.join(P4V_EXE)).filter(|p| p.is_file());
            tools.p4vc = P4VC_CANDIDATES
                .iter()
                .map(|name| root.join(name))
                .find(|p| p.is_file());
        }
        None => {
            log::warn!("Could not find any Perforce installation; searching PATH.");
            let path_var = environment.path_var.as_deref();
            tools.p4 = find_in_path(P4_EXE, path_var);
            tools.p4v = find_in_path(P4V_EXE, path_var);
            tools.p4vc = P4VC_CANDIDATES
                .iter()
                .find_map(|name| find_in_path(name, path_var));
        }
    }

    tools.custom_diff = find_custom_diff(environment, runner);
    tools.p4vc_features = probe_p4vc_features(runner, tools.p4vc.as_deref());

    for (found, description) in tools.report() {
        log::info!("[{}] {}", if found { "X" } else { " " }, description);
    }
    tools
}

fn find_install_root(
    environment: &DiscoveryEnvironment,
    runner: &dyn CommandRunner,
) -> Option<PathBuf> {
    if let Some(root) = &environment.install_root_override {
        if root.is_dir() {
            return Some(root.clone());
        }
        log::warn!(
            "Configured install_root '{}' is not a directory; ignoring it.",
            root.display()
        );
    }
    if !environment.use_registry {
        return None;
    }

    let conventional = PathBuf::from(WINDOWS_INSTALL_ROOT);
    if conventional.join(P4_EXE).is_file() {
        return Some(conventional);
    }
    if let Some(root) = registry_value(runner, "HKLM", REGISTRY_ENVIRONMENT_KEY, "P4INSTROOT") {
        return Some(PathBuf::from(root)).filter(|p| p.is_dir());
    }
    registry_value(runner, "HKLM", REGISTRY_APP_PATHS_KEY, P4_EXE).map(|value| {
        let path = PathBuf::from(value);
        // The legacy key points at p4.exe itself.
        if path.is_file() {
            path.parent().map(Path::to_path_buf).unwrap_or(path)
        } else {
            path
        }
    })
}

fn find_custom_diff(
    environment: &DiscoveryEnvironment,
    runner: &dyn CommandRunner,
) -> Option<CustomDiff> {
    let mut found = None;
    if environment.use_registry {
        for (hive, source) in [
            ("HKLM", DiffSource::RegistryMachine),
            ("HKCU", DiffSource::RegistryUser),
        ] {
            if let Some(command) = registry_value(runner, hive, REGISTRY_ENVIRONMENT_KEY, "P4DIFF") {
                found = Some(CustomDiff { source, command });
            }
        }
    }
    if let Some(command) = &environment.p4diff_var {
        found = Some(CustomDiff {
            source: DiffSource::Environment,
            command: command.clone(),
        });
    }
    found
}

/// Reads a string value with `reg query <hive>\<key> /v <name>`.
fn registry_value(
    runner: &dyn CommandRunner,
    hive: &str,
    key: &str,
    name: &str,
) -> Option<String> {
    let command = CommandLine::new("reg")
        .arg("query")
        .arg(format!("{}\\{}", hive, key))
        .args(["/v", name]);
    match runner.capture(&command, true) {
        Ok(output) => parse_reg_query(&output, name),
        Err(e) => {
            log::debug!("Registry value {}\\{}\\{} not found: {}", hive, key, name, e);
            None
        }
    }
}

/// Extracts `name`'s data from `reg query` output (`    NAME    REG_SZ    data`).
pub fn parse_reg_query(output: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"(?mi)^\s*{}\s+REG_(?:EXPAND_)?SZ\s+(.*?)\s*$",
        regex::escape(name)
    );
    let line = Regex::new(&pattern).ok()?;
    line.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|data| data.as_str().to_string())
        .filter(|data| !data.is_empty())
}

/// Searches each directory of `path_var` for `file`.
pub fn find_in_path(file: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    env::split_paths(path_var?)
        .map(|dir| dir.join(file))
        .find(|candidate| candidate.is_file())
}

/// Asks `p4vc help <cmd>` about each probed subcommand, in parallel.
fn probe_p4vc_features(runner: &dyn CommandRunner, p4vc: Option<&Path>) -> P4vcFeatures {
    let Some(p4vc) = p4vc else {
        return P4vcFeatures::default();
    };
    let supported: Vec<(&str, bool)> = PROBED_P4VC_COMMANDS
        .par_iter()
        .map(|name| (*name, p4vc_supports(runner, p4vc, name)))
        .collect();

    let is_supported = |name: &str| supported.iter().any(|(n, ok)| *n == name && *ok);
    P4vcFeatures {
        history: is_supported("history"),
        diffhave: is_supported("diffhave"),
        workspacewindow: is_supported("workspacewindow"),
    }
}

fn p4vc_supports(runner: &dyn CommandRunner, p4vc: &Path, subcommand: &str) -> bool {
    let command = CommandLine::new(p4vc).args(["help", subcommand]);
    match runner.capture(&command, false) {
        Ok(output) => !output.contains(P4VC_INVALID_COMMAND_MARKER),
        Err(e) => {
            log::debug!("Probing 'p4vc help {}' failed: {}", subcommand, e);
            false
        }
    }
}
