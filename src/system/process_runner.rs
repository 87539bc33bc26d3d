// src/system/process_runner.rs

//! Spawns external commands with a timeout.

use crate::constants::{DEFAULT_LOOKUP_TIMEOUT, EXIT_POLL_INTERVAL, OUTPUT_DRAIN_GRACE};
use crate::core::commons::lock_unpoisoned;
use crate::models::CommandLine;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a command did not run to a successful end.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The program could not be started.
    #[error("Command '{0}' could not be started: {1}. Is Perforce installed and on the PATH?")]
    Spawn(String, #[source] std::io::Error),
    /// The command outlived its timeout and was killed.
    #[error("Command '{command}' did not finish within {timeout_ms} ms and was killed.")]
    TimedOut {
        /// The rendered command line.
        command: String,
        /// The timeout that was exceeded.
        timeout_ms: u128,
    },
    /// The command exited with a code other than 0. `output` is what it printed.
    #[error("Command '{command}' exited with code {code}.")]
    NonZeroExit {
        /// The rendered command line.
        command: String,
        /// The exit code.
        code: i32,
        /// Standard output, a newline, then standard error.
        output: String,
    },
    /// The command was ended by a signal.
    #[error("Command '{command}' was terminated before it could report an exit code.")]
    Terminated {
        /// The rendered command line.
        command: String,
        /// Whatever was printed before the signal.
        output: String,
    },
    /// Polling the child for its exit status failed.
    #[error("Could not wait for command '{0}': {1}")]
    Wait(String, #[source] std::io::Error),
}

/// Runs external commands on behalf of the dispatcher and the command formatter.
///
/// `run` is the fire-and-report path used by scheduled operations. `capture` is the
/// synchronous path used for lookups (`p4 set`, `p4 info`, `p4 integrated`, `p4vc help`).
pub trait CommandRunner: Send + Sync {
    /// Runs `command`. A zero `timeout` launches the program and returns as soon as it
    /// started; otherwise waits up to `timeout`, killing the process when it is exceeded.
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<(), ExecutionError>;

    /// Runs `command` to completion and returns `stdout + "\n" + stderr`.
    /// With `check_exit`, a non-zero exit code is an error.
    fn capture(&self, command: &CommandLine, check_exit: bool) -> Result<String, ExecutionError>;
}

/// [`CommandRunner`] backed by real OS processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    capture_timeout: Duration,
}

impl ProcessRunner {
    /// `capture_timeout` bounds every [`CommandRunner::capture`] call.
    pub fn new(capture_timeout: Duration) -> Self {
        Self { capture_timeout }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_TIMEOUT)
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<(), ExecutionError> {
        let rendered = command.to_string();
        log::debug!("executable: {}", command.program.display());
        log::debug!(
            "working directory: {}",
            command
                .working_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| ".".to_string())
        );
        log::debug!("command: {}", command.quoted_args());

        if timeout.is_zero() {
            let mut cmd = build(command);
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            let child = cmd.spawn().map_err(|e| {
                log::error!("{}: failed to start: {}", rendered, e);
                ExecutionError::Spawn(rendered.clone(), e)
            })?;
            log::info!("Launched '{}' (PID {}).", rendered, child.id());
            return Ok(());
        }

        let finished = wait_with_output(command, &rendered, timeout)?;
        log::info!("{}", rendered);
        if !finished.output.trim().is_empty() {
            log::info!("{}", finished.output.trim_end());
        }
        check_status(&rendered, finished).map(|_| ())
    }

    fn capture(&self, command: &CommandLine, check_exit: bool) -> Result<String, ExecutionError> {
        let rendered = command.to_string();
        log::debug!("capturing: {}", rendered);
        let finished = wait_with_output(command, &rendered, self.capture_timeout)?;
        if check_exit {
            return check_status(&rendered, finished);
        }
        Ok(finished.output)
    }
}

#[derive(Debug)]
struct Finished {
    status: ExitStatus,
    output: String,
}

fn build(command: &CommandLine) -> StdCommand {
    let mut cmd = StdCommand::new(&command.program);
    cmd.args(&command.args).stdin(Stdio::null());
    if let Some(dir) = command.working_dir() {
        cmd.current_dir(dunce::simplified(dir));
    }
    cmd
}

/// Spawns `command` with piped output and polls it until it exits or `timeout` elapses.
fn wait_with_output(
    command: &CommandLine,
    rendered: &str,
    timeout: Duration,
) -> Result<Finished, ExecutionError> {
    let mut cmd = build(command);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| {
        log::error!("{}: failed to start: {}", rendered, e);
        ExecutionError::Spawn(rendered.to_string(), e)
    })?;

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    // Any early return below kills and reaps the child.
    let mut child = scopeguard::guard(child, |mut child: Child| {
        if let Err(e) = child.kill() {
            log::debug!("Failed to kill child process {}: {}", child.id(), e);
        }
        child.wait().ok();
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    log::error!(
                        "{}: timed out after {} ms, killing PID {}.",
                        rendered,
                        timeout.as_millis(),
                        child.id()
                    );
                    // Reader threads are left to finish on their own once the pipes close.
                    return Err(ExecutionError::TimedOut {
                        command: rendered.to_string(),
                        timeout_ms: timeout.as_millis(),
                    });
                }
                thread::sleep(EXIT_POLL_INTERVAL);
            }
            Err(e) => return Err(ExecutionError::Wait(rendered.to_string(), e)),
        }
    };
    let _exited = scopeguard::ScopeGuard::into_inner(child);

    // A background grandchild can keep the pipes open long after the child exited.
    let drain_until = deadline.max(Instant::now() + OUTPUT_DRAIN_GRACE);
    let output = format!(
        "{}\n{}",
        drain(stdout_reader, drain_until, rendered),
        drain(stderr_reader, drain_until, rendered)
    );
    Ok(Finished { status, output })
}

/// Output collected by a reader thread, and a signal sent once the stream hit EOF.
#[derive(Debug)]
struct OutputReader {
    collected: Arc<Mutex<String>>,
    done: mpsc::Receiver<()>,
}

fn spawn_reader<R: Read + Send + 'static>(stream: R) -> OutputReader {
    let collected = Arc::new(Mutex::new(String::new()));
    let (done_tx, done) = mpsc::channel();
    let sink = Arc::clone(&collected);
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => lock_unpoisoned(&sink).push_str(&String::from_utf8_lossy(&line)),
                Err(e) => {
                    log::debug!("Stopped reading child output: {}", e);
                    break;
                }
            }
        }
        done_tx.send(()).ok();
    });
    OutputReader { collected, done }
}

/// Waits for `reader` to reach EOF, but not past `until`. Returns what was read so far.
fn drain(reader: Option<OutputReader>, until: Instant, rendered: &str) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let remaining = until.saturating_duration_since(Instant::now());
    if let Err(RecvTimeoutError::Timeout) = reader.done.recv_timeout(remaining) {
        log::warn!(
            "{}: exited but its output is still held open by another process; keeping the partial output.",
            rendered
        );
    }
    lock_unpoisoned(&reader.collected).clone()
}

fn check_status(rendered: &str, finished: Finished) -> Result<String, ExecutionError> {
    if finished.status.success() {
        return Ok(finished.output);
    }
    match finished.status.code() {
        Some(code) => {
            log::error!("{}: exit code {}", rendered, code);
            Err(ExecutionError::NonZeroExit {
                command: rendered.to_string(),
                code,
                output: finished.output,
            })
        }
        None => {
            log::error!("{}: terminated by a signal", rendered);
            Err(ExecutionError::Terminated {
                command: rendered.to_string(),
                output: finished.output,
            })
        }
    }
}
