// src/system/fake.rs

//! In-process [`CommandRunner`] used by unit tests.

use crate::core::commons::lock_unpoisoned;
use crate::models::CommandLine;
use crate::system::process_runner::{CommandRunner, ExecutionError};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct FakeRunner {
    runs: Mutex<Vec<(CommandLine, Duration)>>,
    captures: Mutex<Vec<CommandLine>>,
    failures_left: AtomicUsize,
    panics: bool,
    gate: Option<(Mutex<bool>, Condvar)>,
    responses: Vec<(String, String)>,
    failed_captures: Vec<String>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails the first `n` calls to `run`.
    pub(crate) fn failing_first(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub(crate) fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    /// `run` blocks until [`FakeRunner::open_gate`] is called.
    pub(crate) fn gated() -> Self {
        Self {
            gate: Some((Mutex::new(false), Condvar::new())),
            ..Self::default()
        }
    }

    /// `capture` returns `output` for commands whose rendered form contains `needle`.
    pub(crate) fn respond(mut self, needle: &str, output: &str) -> Self {
        self.responses.push((needle.to_string(), output.to_string()));
        self
    }

    /// `capture` fails for commands whose rendered form contains `needle`.
    pub(crate) fn fail_capture(mut self, needle: &str) -> Self {
        self.failed_captures.push(needle.to_string());
        self
    }

    pub(crate) fn open_gate(&self) {
        if let Some((open, ready)) = &self.gate {
            *lock_unpoisoned(open) = true;
            ready.notify_all();
        }
    }

    pub(crate) fn runs(&self) -> Vec<(CommandLine, Duration)> {
        lock_unpoisoned(&self.runs).clone()
    }

    pub(crate) fn captures(&self) -> Vec<CommandLine> {
        lock_unpoisoned(&self.captures).clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<(), ExecutionError> {
        lock_unpoisoned(&self.runs).push((command.clone(), timeout));
        if let Some((open, ready)) = &self.gate {
            let mut is_open = lock_unpoisoned(open);
            while !*is_open {
                is_open = ready
                    .wait(is_open)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            }
        }
        if self.panics {
            panic!("fake runner panic");
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ExecutionError::TimedOut {
                command: command.to_string(),
                timeout_ms: timeout.as_millis(),
            });
        }
        Ok(())
    }

    fn capture(&self, command: &CommandLine, _check_exit: bool) -> Result<String, ExecutionError> {
        lock_unpoisoned(&self.captures).push(command.clone());
        let rendered = command.to_string();
        if self.failed_captures.iter().any(|n| rendered.contains(n.as_str())) {
            return Err(ExecutionError::NonZeroExit {
                command: rendered,
                code: 1,
                output: String::new(),
            });
        }
        self.responses
            .iter()
            .find(|(needle, _)| rendered.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .ok_or_else(|| ExecutionError::Spawn(rendered, io::Error::from(io::ErrorKind::NotFound)))
    }
}
