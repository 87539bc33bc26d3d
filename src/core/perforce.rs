// src/core/perforce.rs

//! Turns high-level Perforce operations into dispatched command lines.

use crate::constants::FIRE_AND_FORGET;
use crate::core::companions::existing_companions;
use crate::core::connection;
use crate::core::notify::Notifier;
use crate::core::paths::directory_of;
use crate::core::remap::{RemapError, remap_from_integrated};
use crate::core::settings::Settings;
use crate::core::token_lock::{OperationToken, TokenLock};
use crate::core::tools::{DiscoveryEnvironment, ToolAvailability, discover};
use crate::models::{CommandLine, ConnectionParams, OperationKind};
use crate::system::dispatch::{Completion, Dispatcher, Outcome, Status};
use crate::system::process_runner::CommandRunner;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, mpsc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Why an operation was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No path was given.
    EmptyPath,
    /// The file does not exist.
    NotFound,
    /// The file is writable, so it is probably checked out already.
    NotReadOnly,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmptyPath => t!("skip.empty_path"),
            Self::NotFound => t!("skip.not_found"),
            Self::NotReadOnly => t!("skip.not_read_only"),
        })
    }
}

/// Why an operation was not submitted.
#[derive(Error, Debug)]
pub enum OperationError {
    /// A required Perforce executable is missing. Holds the notice shown.
    #[error("{0}")]
    ToolMissing(&'static str),
    /// A precondition did not hold; there was nothing to do.
    #[error("Skipped '{}': {reason}", .path.display())]
    Skipped {
        /// The file that was skipped.
        path: PathBuf,
        /// Which precondition failed.
        reason: SkipReason,
    },
    /// The same operation on the same file is still running.
    #[error("'{0}' is already in progress")]
    InFlight(OperationToken),
    /// The mainline version could not be found.
    #[error(transparent)]
    Remap(#[from] RemapError),
}

impl OperationError {
    /// Skips are expected outcomes (nothing to do), not failures.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Result of submitting one operation.
pub type OperationResult = Result<Submission, OperationError>;

/// A dispatched operation. The receiver yields its outcome once it finished.
#[derive(Debug)]
pub struct Submission {
    /// What was submitted.
    pub kind: OperationKind,
    /// File or depot path the command acts on.
    pub target: String,
    /// The command as dispatched.
    pub command: CommandLine,
    /// Dispatcher request id, for matching log lines.
    pub request_id: Uuid,
    receiver: mpsc::Receiver<Outcome>,
}

impl Submission {
    /// Blocks until the operation finished.
    pub fn wait(&self) -> Status {
        self.receiver
            .recv()
            .map(|outcome| outcome.status)
            .unwrap_or(Status::Abandoned)
    }

    /// Like [`Submission::wait`], giving up after `timeout` with `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Status> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome.status),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Status::Abandoned),
        }
    }
}

/// Result of an edit: the file itself plus its companion files that exist.
#[derive(Debug)]
pub struct EditResult {
    /// The file that was asked for.
    pub primary: OperationResult,
    /// Companion files, in the order they were found.
    pub companions: Vec<OperationResult>,
}

impl EditResult {
    /// The primary result followed by the companions.
    pub fn into_results(self) -> Vec<OperationResult> {
        let mut results = Vec::with_capacity(1 + self.companions.len());
        results.push(self.primary);
        results.extend(self.companions);
        results
    }
}

/// How [`P4Operations::edit_file`] submits its edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditOptions {
    /// Try synchronously first (used on save).
    pub immediate: bool,
    /// Edit even when the file is already writable.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Launch {
    /// Queued with the default timeout.
    Scheduled,
    /// Synchronous attempt first, queued on failure.
    Immediate,
    /// Queued, fire and forget.
    Gui,
}

/// Perforce operations on local files.
pub struct P4Operations {
    settings: Settings,
    tools: RwLock<Arc<ToolAvailability>>,
    locks: Arc<TokenLock>,
    dispatcher: Dispatcher,
    runner: Arc<dyn CommandRunner>,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for P4Operations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P4Operations")
            .field("settings", &self.settings)
            .field("tools", &self.tools())
            .field("in_flight", &self.locks.len())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl P4Operations {
    /// Starts the dispatcher. Fails only when its thread cannot be spawned.
    pub fn new(
        settings: Settings,
        tools: ToolAvailability,
        runner: Arc<dyn CommandRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> io::Result<Self> {
        let dispatcher = Dispatcher::start(Arc::clone(&runner), settings.timeouts.dispatch())?;
        Ok(Self {
            settings,
            tools: RwLock::new(Arc::new(tools)),
            locks: Arc::new(TokenLock::new()),
            dispatcher,
            runner,
            notifier,
        })
    }

    /// The settings these operations run with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Snapshot of the tools found by the last discovery.
    pub fn tools(&self) -> Arc<ToolAvailability> {
        let guard = self
            .tools
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Re-runs tool discovery and swaps in the result.
    pub fn refresh_tools(&self, environment: &DiscoveryEnvironment) -> Arc<ToolAvailability> {
        let fresh = Arc::new(discover(environment, self.runner.as_ref()));
        *self
            .tools
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::clone(&fresh);
        fresh
    }

    /// Operations currently in flight.
    pub fn token_lock(&self) -> &Arc<TokenLock> {
        &self.locks
    }

    /// The runner used for commands and lookups.
    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// `p4 edit` on `path` and its companion files.
    pub fn edit_file(&self, path: &Path, options: EditOptions) -> EditResult {
        log::debug!("Edit '{}'", path.display());
        let primary = self.edit_single(path, options);
        let companions = existing_companions(path)
            .iter()
            .map(|companion| self.edit_single(companion, options))
            .collect();
        EditResult {
            primary,
            companions,
        }
    }

    /// Edit tried synchronously first, for the save path.
    pub fn edit_file_immediate(&self, path: &Path) -> EditResult {
        self.edit_file(
            path,
            EditOptions {
                immediate: true,
                force: false,
            },
        )
    }

    /// Non-forced edit of every path in `paths`, e.g. the editor's dirty documents.
    pub fn edit_modified(&self, paths: &[PathBuf]) -> Vec<EditResult> {
        paths
            .iter()
            .map(|path| self.edit_file(path, EditOptions::default()))
            .collect()
    }

    fn edit_single(&self, path: &Path, options: EditOptions) -> OperationResult {
        let skip = |reason: SkipReason| {
            log::debug!("Edit of '{}' skipped: {}", path.display(), reason);
            Err(OperationError::Skipped {
                path: path.to_path_buf(),
                reason,
            })
        };
        if path.as_os_str().is_empty() {
            return skip(SkipReason::EmptyPath);
        }
        let Ok(metadata) = path.metadata() else {
            return skip(SkipReason::NotFound);
        };
        if !metadata.is_file() {
            return skip(SkipReason::NotFound);
        }
        let must_be_read_only = !(self.settings.ignore_read_only_on_edit || options.force);
        if must_be_read_only && !metadata.permissions().readonly() {
            return skip(SkipReason::NotReadOnly);
        }
        let p4 = self.require_p4()?;

        let command = self.p4_command(&p4, path).arg("edit").arg(path_arg(path));
        let launch = if options.immediate {
            Launch::Immediate
        } else {
            Launch::Scheduled
        };
        self.submit(OperationKind::Edit, path_arg(path), command, launch, true)
    }

    /// `p4 add`.
    pub fn add_file(&self, path: &Path) -> OperationResult {
        self.simple_p4(OperationKind::Add, path, &[])
    }

    /// `p4 delete`.
    pub fn delete_file(&self, path: &Path) -> OperationResult {
        self.simple_p4(OperationKind::Delete, path, &[])
    }

    /// `p4 revert`, or `p4 revert -a` to only revert unchanged files.
    pub fn revert_file(&self, path: &Path, only_unchanged: bool) -> OperationResult {
        let flags: &[&str] = if only_unchanged { &["-a"] } else { &[] };
        self.simple_p4(OperationKind::Revert, path, flags)
    }

    fn simple_p4(&self, kind: OperationKind, path: &Path, flags: &[&str]) -> OperationResult {
        self.check_path(path)?;
        let p4 = self.require_p4()?;
        let command = self
            .p4_command(&p4, path)
            .arg(kind.as_str())
            .args(flags.iter().copied())
            .arg(path_arg(path));
        self.submit(kind, path_arg(path), command, Launch::Scheduled, true)
    }

    /// Diff against the have revision: the user's `P4DIFF` tool, else `p4vc diffhave`,
    /// else a unified diff in the log.
    pub fn diff_file(&self, path: &Path) -> OperationResult {
        self.check_path(path)?;
        let p4 = self.require_p4()?;
        let tools = self.tools();
        let have = format!("{}#have", path_arg(path));

        if tools.custom_diff.is_some() {
            let command = self.p4_command(&p4, path).arg("diff").arg(have);
            return self.submit(OperationKind::Diff, path_arg(path), command, Launch::Scheduled, true);
        }
        if let (Some(p4vc), true) = (&tools.p4vc, tools.p4vc_features.diffhave) {
            let dir = directory_of(path);
            let command = self
                .gui_command(p4vc, &dir)
                .arg("diffhave")
                .arg(path_arg(path));
            return self.submit(OperationKind::Diff, path_arg(path), command, Launch::Gui, true);
        }
        let command = self.p4_command(&p4, path).args(["diff", "-du"]).arg(have);
        self.submit(OperationKind::Diff, path_arg(path), command, Launch::Scheduled, true)
    }

    /// Revision history of `path`, or of its mainline counterpart with `mainline`.
    pub fn revision_history(&self, path: &Path, mainline: bool) -> OperationResult {
        let (dir, target) = self.view_target(path, mainline)?;
        let tools = self.tools();
        let command = match (&tools.p4vc, tools.p4vc_features.history, &tools.p4v) {
            (Some(p4vc), true, _) => self.gui_command(p4vc, &dir).arg("history").arg(&target),
            (_, _, Some(p4v)) => CommandLine::new(p4v)
                .args(["-win", "0"])
                .args(self.full_connection_args(&dir).to_args())
                .arg("-cmd")
                .arg(format!("history {}", target))
                .current_dir(&dir),
            _ => return Err(self.tool_missing(t!("notice.history_tool_missing"))),
        };
        self.submit(OperationKind::History, target, command, Launch::Gui, true)
    }

    /// `p4vc tlv`.
    pub fn time_lapse(&self, path: &Path, mainline: bool) -> OperationResult {
        self.p4vc_view(OperationKind::TimeLapse, "tlv", path, mainline)
    }

    /// `p4vc revisiongraph`.
    pub fn revision_graph(&self, path: &Path, mainline: bool) -> OperationResult {
        self.p4vc_view(OperationKind::RevisionGraph, "revisiongraph", path, mainline)
    }

    fn p4vc_view(
        &self,
        kind: OperationKind,
        subcommand: &str,
        path: &Path,
        mainline: bool,
    ) -> OperationResult {
        let Some(p4vc) = self.tools().p4vc.clone() else {
            return Err(self.tool_missing(t!("notice.p4vc_missing")));
        };
        let (dir, target) = self.view_target(path, mainline)?;
        let command = self.gui_command(&p4vc, &dir).arg(subcommand).arg(&target);
        self.submit(kind, target, command, Launch::Gui, true)
    }

    /// Selects `path` in the workspace tree of the visual client. Not token-locked.
    pub fn show_in_workspace(&self, path: &Path) -> OperationResult {
        self.check_path(path)?;
        let tools = self.tools();
        let dir = directory_of(path);
        let command = match (&tools.p4vc, tools.p4vc_features.workspacewindow, &tools.p4v) {
            (Some(p4vc), true, _) => self
                .gui_command(p4vc, &dir)
                .args(["workspacewindow", "-s"])
                .arg(path_arg(path)),
            (_, _, Some(p4v)) => CommandLine::new(p4v)
                .args(["-win", "0"])
                .args(self.full_connection_args(&dir).to_args())
                .arg("-s")
                .arg(path_arg(path))
                .current_dir(&dir),
            _ => return Err(self.tool_missing(t!("notice.show_tool_missing"))),
        };
        self.submit(OperationKind::Show, path_arg(path), command, Launch::Gui, false)
    }

    /// Depot path of `path` on the mainline (`mainline` or the configured `mainline_path`).
    /// Returns `path` unchanged when it was never integrated from the mainline.
    pub fn remap_to_main(&self, path: &Path, mainline: Option<&str>) -> Result<String, RemapError> {
        let filename = path_arg(path);
        let mainline = mainline.unwrap_or(&self.settings.mainline_path);
        log::debug!("Remap '{}' to mainline '{}'", filename, mainline);
        if mainline.is_empty() {
            log::error!(
                "Tried to find the mainline version of {}, but the mainline path setting is empty",
                filename
            );
            return Err(RemapError::EmptyMainline(filename));
        }
        let Some(p4) = self.tools().p4.clone() else {
            self.notifier.notify(t!("notice.p4_missing"));
            return Err(RemapError::P4Missing(filename));
        };
        let command = self.p4_command(&p4, path).arg("integrated").arg(&filename);
        let output = self
            .runner
            .capture(&command, true)
            .map_err(|source| RemapError::Query {
                path: filename.clone(),
                source,
            })?;
        remap_from_integrated(&output, &filename, mainline)
    }

    /// Connection parameters GUI tools get for files in `dir`.
    ///
    /// With `use_system_env` they are looked up again on every call, so a changed
    /// `P4CONFIG`, `P4PORT` or `P4CLIENT` is picked up by the next launch.
    pub fn full_connection_args(&self, dir: &Path) -> ConnectionParams {
        let connection = &self.settings.connection;
        if !connection.use_system_env {
            return connection.static_params();
        }
        let Some(p4) = self.tools().p4.clone() else {
            return ConnectionParams::default();
        };
        connection::discover(self.runner.as_ref(), &p4, dir, connection.lookup)
    }

    /// Connection parameters for `p4` itself. Empty when `p4` reads its own environment.
    fn connection_args(&self) -> ConnectionParams {
        let connection = &self.settings.connection;
        if connection.use_system_env {
            ConnectionParams::default()
        } else {
            connection.static_params()
        }
    }

    fn p4_command(&self, p4: &Path, path: &Path) -> CommandLine {
        CommandLine::new(p4)
            .args(self.connection_args().to_args())
            .current_dir(directory_of(path))
    }

    fn gui_command(&self, program: &Path, dir: &Path) -> CommandLine {
        CommandLine::new(program)
            .args(self.full_connection_args(dir).to_args())
            .current_dir(dir)
    }

    /// Working directory and command target for the view operations.
    fn view_target(&self, path: &Path, mainline: bool) -> Result<(PathBuf, String), OperationError> {
        self.check_path(path)?;
        let dir = directory_of(path);
        let target = if mainline {
            self.remap_to_main(path, None)?
        } else {
            path_arg(path)
        };
        Ok((dir, target))
    }

    fn check_path(&self, path: &Path) -> Result<(), OperationError> {
        if path.as_os_str().is_empty() {
            return Err(OperationError::Skipped {
                path: path.to_path_buf(),
                reason: SkipReason::EmptyPath,
            });
        }
        Ok(())
    }

    fn require_p4(&self) -> Result<PathBuf, OperationError> {
        self.tools()
            .p4
            .clone()
            .ok_or_else(|| self.tool_missing(t!("notice.p4_missing")))
    }

    fn tool_missing(&self, message: &'static str) -> OperationError {
        self.notifier.notify(message);
        OperationError::ToolMissing(message)
    }

    /// Reserves the token (when `locked`) and hands the command to the dispatcher.
    /// The reservation travels with the completion and is released when it fires.
    fn submit(
        &self,
        kind: OperationKind,
        target: String,
        command: CommandLine,
        launch: Launch,
        locked: bool,
    ) -> OperationResult {
        let reservation = if locked {
            let token = OperationToken::new(kind, &target);
            match self.locks.try_reserve(token.clone()) {
                Some(reservation) => Some(reservation),
                None => return Err(OperationError::InFlight(token)),
            }
        } else {
            None
        };

        let (tx, receiver) = mpsc::channel();
        let completion = Completion::new(move |outcome| {
            drop(reservation);
            let _ = tx.send(outcome);
        });
        let request_id = match launch {
            Launch::Scheduled => self.dispatcher.schedule(command.clone(), completion),
            Launch::Immediate => self.dispatcher.run_immediate(command.clone(), completion),
            Launch::Gui => {
                self.dispatcher
                    .schedule_with_timeout(command.clone(), FIRE_AND_FORGET, completion)
            }
        };
        Ok(Submission {
            kind,
            target,
            command,
            request_id,
            receiver,
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::notify::tests::RecordingNotifier;
    use crate::core::settings::ConnectionSettings;
    use crate::core::tools::{CustomDiff, DiffSource, P4vcFeatures};
    use crate::system::fake::FakeRunner;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const WAIT: Duration = Duration::from_secs(5);

    fn all_tools() -> ToolAvailability {
        ToolAvailability {
            install_root: Some(PathBuf::from("/opt/perforce")),
            p4: Some(PathBuf::from("p4")),
            p4v: Some(PathBuf::from("p4v")),
            p4vc: Some(PathBuf::from("p4vc")),
            custom_diff: None,
            p4vc_features: P4vcFeatures {
                history: true,
                diffhave: true,
                workspacewindow: true,
            },
        }
    }

    fn writable_settings() -> Settings {
        Settings {
            ignore_read_only_on_edit: true,
            ..Settings::default()
        }
    }

    fn operations(
        settings: Settings,
        tools: ToolAvailability,
        runner: Arc<FakeRunner>,
    ) -> (P4Operations, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let ops = P4Operations::new(settings, tools, runner, Arc::new(notifier.clone())).unwrap();
        (ops, notifier)
    }

    fn file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, "").unwrap();
        path
    }

    fn finished(result: OperationResult) -> Submission {
        let submission = result.unwrap();
        assert_eq!(submission.wait_timeout(WAIT), Some(Status::Succeeded));
        submission
    }

    #[test]
    fn test_edit_schedules_companions() {
        let dir = tempdir().unwrap();
        let form = file(&dir, "Form1.cs");
        file(&dir, "Form1.Designer.cs");
        file(&dir, "Form1.resx");
        let runner = Arc::new(FakeRunner::new());
        let (ops, _) = operations(writable_settings(), all_tools(), runner.clone());

        let result = ops.edit_file(&form, EditOptions::default());

        let submissions: Vec<Submission> = result
            .into_results()
            .into_iter()
            .map(finished)
            .collect();
        assert_eq!(submissions.len(), 3);
        assert!(submissions.iter().all(|s| s.kind == OperationKind::Edit));
        assert_eq!(runner.runs().len(), 3);
    }

    #[test]
    fn test_edit_without_companions_schedules_one() {
        let dir = tempdir().unwrap();
        let form = file(&dir, "Form1.cs");
        let runner = Arc::new(FakeRunner::new());
        let (ops, _) = operations(writable_settings(), all_tools(), runner.clone());

        let result = ops.edit_file(&form, EditOptions::default());

        assert!(result.companions.is_empty());
        let submission = finished(result.primary);
        assert_eq!(
            submission.command.args,
            vec!["edit".to_string(), path_arg(&form)]
        );
        assert_eq!(submission.command.working_dir(), Some(dir.path()));
    }

    #[test]
    fn test_edit_preconditions() {
        let dir = tempdir().unwrap();
        let writable = file(&dir, "main.cpp");
        let runner = Arc::new(FakeRunner::new());
        let (ops, _) = operations(Settings::default(), all_tools(), runner.clone());

        let empty = ops.edit_file(Path::new(""), EditOptions::default()).primary;
        assert!(matches!(
            empty,
            Err(OperationError::Skipped { reason: SkipReason::EmptyPath, .. })
        ));

        let missing = ops
            .edit_file(&dir.path().join("gone.cpp"), EditOptions::default())
            .primary;
        assert!(matches!(
            missing,
            Err(OperationError::Skipped { reason: SkipReason::NotFound, .. })
        ));

        let not_read_only = ops.edit_file(&writable, EditOptions::default()).primary;
        assert!(matches!(
            not_read_only,
            Err(OperationError::Skipped { reason: SkipReason::NotReadOnly, .. })
        ));
        assert!(not_read_only.unwrap_err().is_skip());

        let forced = ops.edit_file(
            &writable,
            EditOptions {
                force: true,
                ..EditOptions::default()
            },
        );
        finished(forced.primary);
        assert_eq!(runner.runs().len(), 1);
    }

    #[test]
    fn test_read_only_file_is_edited() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "locked.h");
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();
        let runner = Arc::new(FakeRunner::new());
        let (ops, _) = operations(Settings::default(), all_tools(), runner);

        finished(ops.edit_file(&path, EditOptions::default()).primary);
    }

    #[test]
    fn test_missing_p4_notifies_once() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "a.cs");
        let runner = Arc::new(FakeRunner::new());
        let notifier = RecordingNotifier::default();
        let ops = P4Operations::new(
            writable_settings(),
            ToolAvailability::default(),
            runner.clone(),
            Arc::new(crate::core::notify::OnceNotifier::new(notifier.clone())),
        )
        .unwrap();

        assert!(matches!(
            ops.edit_file(&path, EditOptions::default()).primary,
            Err(OperationError::ToolMissing(_))
        ));
        assert!(matches!(ops.add_file(&path), Err(OperationError::ToolMissing(_))));
        assert_eq!(notifier.messages().len(), 1);
        assert!(runner.runs().is_empty());
    }

    #[test]
    fn test_duplicate_operation_is_rejected_while_in_flight() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "a.cs");
        let runner = Arc::new(FakeRunner::gated());
        let (ops, _) = operations(writable_settings(), all_tools(), runner.clone());

        let first = ops.add_file(&path).unwrap();
        assert!(matches!(ops.add_file(&path), Err(OperationError::InFlight(_))));
        // A different kind on the same file is independent.
        let revert = ops.revert_file(&path, true).unwrap();

        runner.open_gate();
        assert_eq!(first.wait_timeout(WAIT), Some(Status::Succeeded));
        assert_eq!(revert.wait_timeout(WAIT), Some(Status::Succeeded));
        assert_eq!(revert.command.args, vec!["revert".to_string(), "-a".to_string(), path_arg(&path)]);
        // Released after completion.
        finished(ops.add_file(&path));
        assert!(ops.token_lock().is_empty());
    }

    #[test]
    fn test_token_released_after_failure() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "a.cs");
        let runner = Arc::new(FakeRunner::failing_first(1));
        let (ops, _) = operations(writable_settings(), all_tools(), runner);

        let failed = ops.delete_file(&path).unwrap();
        assert_eq!(failed.wait_timeout(WAIT), Some(Status::Failed));
        finished(ops.delete_file(&path));
    }

    #[test]
    fn test_static_connection_is_passed_to_p4() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "a.cs");
        let settings = Settings {
            connection: ConnectionSettings {
                use_system_env: false,
                port: "ssl:perforce:1666".to_string(),
                username: "alice".to_string(),
                client: "alice_ws".to_string(),
                ..ConnectionSettings::default()
            },
            ..Settings::default()
        };
        let runner = Arc::new(FakeRunner::new());
        let (ops, _) = operations(settings, all_tools(), runner);

        let submission = finished(ops.add_file(&path));
        assert_eq!(
            submission.command.args,
            vec!["-p", "ssl:perforce:1666", "-u", "alice", "-c", "alice_ws", "add"]
                .into_iter()
                .map(String::from)
                .chain([path_arg(&path)])
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_system_connection_is_looked_up_on_every_call() {
        let runner = Arc::new(
            FakeRunner::new().respond("p4 set", "P4PORT=perforce:1666 (set)\nP4USER=bob (set)\n"),
        );
        let (ops, _) = operations(Settings::default(), all_tools(), runner.clone());
        let dir = Path::new("/w");

        let first = ops.full_connection_args(dir);
        let second = ops.full_connection_args(dir);

        assert_eq!(first.to_string(), "-p perforce:1666 -u bob");
        assert_eq!(first, second);
        let lookups = runner
            .captures()
            .iter()
            .filter(|cmd| cmd.args == ["set"])
            .count();
        assert_eq!(lookups, 2);
    }

    #[test]
    fn test_diff_tool_selection() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "a.cs");
        let have = format!("{}#have", path_arg(&path));

        let mut custom = all_tools();
        custom.custom_diff = Some(CustomDiff {
            source: DiffSource::Environment,
            command: "meld".to_string(),
        });
        let (ops, _) = operations(Settings::default(), custom, Arc::new(FakeRunner::new()));
        let submission = finished(ops.diff_file(&path));
        assert_eq!(submission.command.args, vec!["diff".to_string(), have.clone()]);

        let runner = Arc::new(FakeRunner::new().respond("p4 set", "P4PORT=perforce:1666\n"));
        let (ops, _) = operations(Settings::default(), all_tools(), runner.clone());
        let submission = finished(ops.diff_file(&path));
        assert_eq!(submission.command.program, PathBuf::from("p4vc"));
        assert_eq!(
            submission.command.args,
            vec!["-p".to_string(), "perforce:1666".to_string(), "diffhave".to_string(), path_arg(&path)]
        );
        assert_eq!(runner.runs().first().map(|(_, t)| *t), Some(FIRE_AND_FORGET));

        let mut plain = all_tools();
        plain.p4vc_features.diffhave = false;
        let (ops, _) = operations(Settings::default(), plain, Arc::new(FakeRunner::new()));
        let submission = finished(ops.diff_file(&path));
        assert_eq!(
            submission.command.args,
            vec!["diff".to_string(), "-du".to_string(), have]
        );
    }

    #[test]
    fn test_history_falls_back_to_p4v_then_notifies() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "a.cs");

        let mut p4v_only = all_tools();
        p4v_only.p4vc_features.history = false;
        let (ops, _) = operations(Settings::default(), p4v_only, Arc::new(FakeRunner::new()));
        let submission = finished(ops.revision_history(&path, false));
        assert_eq!(submission.command.program, PathBuf::from("p4v"));
        assert_eq!(
            submission.command.args,
            vec!["-win".to_string(), "0".to_string(), "-cmd".to_string(), format!("history {}", path_arg(&path))]
        );

        let tools = ToolAvailability {
            p4: Some(PathBuf::from("p4")),
            ..ToolAvailability::default()
        };
        let (ops, notifier) = operations(Settings::default(), tools, Arc::new(FakeRunner::new()));
        assert!(matches!(
            ops.revision_history(&path, false),
            Err(OperationError::ToolMissing(_))
        ));
        assert!(matches!(ops.time_lapse(&path, false), Err(OperationError::ToolMissing(_))));
        assert_eq!(notifier.messages().len(), 2);
        assert!(ops.token_lock().is_empty());
    }

    #[test]
    fn test_time_lapse_of_mainline_version() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "foo.cs");
        let settings = Settings {
            mainline_path: "//depot/main/".to_string(),
            ..Settings::default()
        };
        let runner = Arc::new(FakeRunner::new().respond(
            "integrated",
            "//depot/branch/foo.cs#3 - branch from //depot/main/foo.cs#1\n",
        ));
        let (ops, _) = operations(settings, all_tools(), runner);

        let submission = finished(ops.time_lapse(&path, true));
        assert_eq!(submission.target, "//depot/main/foo.cs");
        assert_eq!(
            submission.command.args.last().map(String::as_str),
            Some("//depot/main/foo.cs")
        );
        assert_eq!(submission.command.working_dir(), Some(dir.path()));
    }

    #[test]
    fn test_remap_requires_mainline() {
        let (ops, _) = operations(Settings::default(), all_tools(), Arc::new(FakeRunner::new()));
        assert!(matches!(
            ops.remap_to_main(Path::new("/w/foo.cs"), None),
            Err(RemapError::EmptyMainline(_))
        ));
        assert!(matches!(
            ops.revision_graph(Path::new("/w/foo.cs"), true),
            Err(OperationError::Remap(RemapError::EmptyMainline(_)))
        ));
    }

    #[test]
    fn test_show_is_not_token_locked() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "a.cs");
        let runner = Arc::new(FakeRunner::gated());
        let (ops, _) = operations(Settings::default(), all_tools(), runner.clone());

        let first = ops.show_in_workspace(&path).unwrap();
        let second = ops.show_in_workspace(&path).unwrap();
        assert!(ops.token_lock().is_empty());
        assert!(first.command.args.ends_with(&["workspacewindow".to_string(), "-s".to_string(), path_arg(&path)]));

        runner.open_gate();
        assert_eq!(first.wait_timeout(WAIT), Some(Status::Succeeded));
        assert_eq!(second.wait_timeout(WAIT), Some(Status::Succeeded));
    }

    #[test]
    fn test_edit_modified_does_not_force() {
        let dir = tempdir().unwrap();
        let a = file(&dir, "a.txt");
        let b = file(&dir, "b.txt");
        let (ops, _) = operations(Settings::default(), all_tools(), Arc::new(FakeRunner::new()));

        let results = ops.edit_modified(&[a, b]);
        assert_eq!(results.len(), 2);
        assert!(results.into_iter().all(|r| matches!(
            r.primary,
            Err(OperationError::Skipped { reason: SkipReason::NotReadOnly, .. })
        )));
    }

    #[test]
    fn test_immediate_edit_uses_immediate_timeout() {
        let dir = tempdir().unwrap();
        let path = file(&dir, "saved.cs");
        let runner = Arc::new(FakeRunner::new());
        let (ops, _) = operations(writable_settings(), all_tools(), runner.clone());

        let result = ops.edit_file_immediate(&path);
        // The synchronous attempt succeeded, so the outcome is already there.
        assert_eq!(result.primary.unwrap().wait_timeout(Duration::ZERO), Some(Status::Succeeded));
        assert_eq!(
            runner.runs().first().map(|(_, t)| *t),
            Some(Settings::default().timeouts.dispatch().immediate)
        );
    }
}
