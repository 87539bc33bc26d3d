// src/cli/session.rs

//! The state of one CLI invocation and its console output.

use crate::core::notify::{Notifier, OnceNotifier};
use crate::core::paths;
use crate::core::perforce::{OperationError, OperationResult, P4Operations, Submission};
use crate::core::settings::Settings;
use crate::core::tools::{self, DiscoveryEnvironment};
use crate::system::dispatch::Status;
use crate::system::process_runner::{CommandRunner, ProcessRunner};
use anyhow::{Context, Result};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::commons::lock_unpoisoned;

/// Prints notices on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        eprintln!("{} {}", t!("notice.prefix").yellow().bold(), message);
    }
}

/// Totals reported once every submitted operation has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Operations that finished with exit code 0.
    pub succeeded: usize,
    /// Operations that did not succeed, rejected ones included.
    pub failed: usize,
    /// Operations with nothing to do.
    pub skipped: usize,
}

/// State shared by the handlers of one CLI invocation.
#[derive(Debug)]
pub struct Session {
    settings_path: PathBuf,
    ops: P4Operations,
    submissions: Mutex<Vec<Submission>>,
    rejected: AtomicUsize,
    skipped: AtomicUsize,
}

impl Session {
    /// Loads the settings, discovers the Perforce tools and starts the dispatcher.
    pub fn open(config_override: Option<PathBuf>) -> Result<Self> {
        let settings_path = match config_override {
            Some(path) => path,
            None => paths::get_settings_path()?,
        };
        let settings = Settings::load_or_create(&settings_path)?;

        let runner: Arc<dyn CommandRunner> =
            Arc::new(ProcessRunner::new(settings.timeouts.lookup()));
        let environment = DiscoveryEnvironment::from_process(&settings.tools)?;
        let tools = tools::discover(&environment, runner.as_ref());
        let notifier = Arc::new(OnceNotifier::new(ConsoleNotifier));

        let ops = P4Operations::new(settings, tools, runner, notifier)
            .context(t!("session.error.dispatcher"))?;
        Ok(Self {
            settings_path,
            ops,
            submissions: Mutex::new(Vec::new()),
            rejected: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        })
    }

    /// The settings file in use.
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// The loaded settings.
    pub fn settings(&self) -> &Settings {
        self.ops.settings()
    }

    /// The Perforce operations of this session.
    pub fn ops(&self) -> &P4Operations {
        &self.ops
    }

    /// Reports a submitted operation and keeps it for [`Session::wait_all`].
    pub fn record(&self, result: OperationResult) {
        match result {
            Ok(submission) => {
                println!(
                    "{} {} {}",
                    "→".cyan(),
                    submission.kind.as_str().bold(),
                    submission.target
                );
                lock_unpoisoned(&self.submissions).push(submission);
            }
            Err(e @ OperationError::Skipped { .. }) => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
                println!("{} {}", "-".dimmed(), e.to_string().dimmed());
            }
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::SeqCst);
                eprintln!("{} {}", "✗".red(), e);
            }
        }
    }

    /// [`Session::record`] for each result.
    pub fn record_all(&self, results: impl IntoIterator<Item = OperationResult>) {
        results.into_iter().for_each(|result| self.record(result));
    }

    /// Blocks until every recorded operation finished and prints its result.
    pub fn wait_all(&self) -> Summary {
        let submissions = std::mem::take(&mut *lock_unpoisoned(&self.submissions));
        let mut summary = Summary {
            failed: self.rejected.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            ..Summary::default()
        };
        for submission in submissions {
            let status = submission.wait();
            let label = format!("{} {}", submission.kind.as_str(), submission.target);
            match status {
                Status::Succeeded => {
                    summary.succeeded += 1;
                    println!("{} {}", "✓".green(), label);
                }
                Status::Failed => {
                    summary.failed += 1;
                    println!("{} {}", "✗".red(), label);
                }
                Status::Abandoned => {
                    summary.failed += 1;
                    println!("{} {} ({})", "✗".red(), label, t!("session.abandoned"));
                }
            }
        }
        summary
    }
}
