// src/models.rs

//! Plain data types shared by the core and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The Perforce operations. All but `Show` are guarded by the token lock.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// `p4 edit`.
    Edit,
    /// `p4 add`.
    Add,
    /// `p4 delete`.
    Delete,
    /// `p4 revert`.
    Revert,
    /// Diff against the have revision.
    Diff,
    /// Revision history viewer.
    History,
    /// Time-lapse view.
    TimeLapse,
    /// Revision graph.
    RevisionGraph,
    /// Select the file in the workspace view.
    Show,
}

impl OperationKind {
    /// The name used as the token prefix and in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Revert => "revert",
            Self::Diff => "diff",
            Self::History => "history",
            Self::TimeLapse => "timelapse",
            Self::RevisionGraph => "revisiongraph",
            Self::Show => "show",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully formatted external command: program, argument vector and working directory.
///
/// Commands are never run through a shell; the arguments reach the child verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Working directory; the caller's when `None`.
    pub cwd: Option<PathBuf>,
}

impl CommandLine {
    /// A command with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The argument vector rendered with POSIX quoting, for logs and reports.
    pub fn quoted_args(&self) -> String {
        shlex::try_join(self.args.iter().map(String::as_str))
            .unwrap_or_else(|_| self.args.join(" "))
    }

    /// The working directory, if one was set.
    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program.display())
        } else {
            write!(f, "{} {}", self.program.display(), self.quoted_args())
        }
    }
}

/// Server, user and client a command should connect with.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    /// `-p`, e.g. `ssl:perforce:1666`.
    pub server: String,
    /// `-u`.
    pub user: String,
    /// `-c`, the workspace.
    pub client: String,
}

impl ConnectionParams {
    /// `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        self.server.is_empty() && self.user.is_empty() && self.client.is_empty()
    }

    /// Global `p4` options for these parameters; empty fields are left out.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(6);
        for (flag, value) in [("-p", &self.server), ("-u", &self.user), ("-c", &self.client)] {
            if !value.is_empty() {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args
    }
}

/// Renders as `-p <server> -u <user> -c <client>`.
impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}
