// src/system/dispatch.rs

//! Background queue for Perforce commands.
//!
//! Requests are taken off the queue in order by one dispatch thread, and each one runs on
//! a thread of its own, so completions arrive in any order.

use crate::constants::{DEFAULT_IMMEDIATE_TIMEOUT, DEFAULT_SCHEDULED_TIMEOUT};
use crate::core::commons::lock_unpoisoned;
use crate::models::CommandLine;
use crate::system::process_runner::CommandRunner;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Final state of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The command exited with code 0.
    Succeeded,
    /// The command did not get to exit code 0.
    Failed,
    /// The request was dropped before it ran (dispatcher shut down, thread spawn failed).
    Abandoned,
}

impl Status {
    /// `true` only for [`Status::Succeeded`].
    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }
}

/// What a [`Completion`] receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Id returned when the request was queued.
    pub request_id: Uuid,
    /// How the request ended.
    pub status: Status,
}

type Callback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Callback invoked exactly once with the request's [`Outcome`].
pub struct Completion(Option<Callback>);

impl Completion {
    /// Wraps `callback`.
    pub fn new(callback: impl FnOnce(Outcome) + Send + 'static) -> Self {
        Self(Some(Box::new(callback)))
    }

    /// A completion that discards the outcome.
    pub fn none() -> Self {
        Self(None)
    }

    /// A completion that forwards the outcome to the returned receiver.
    pub fn channel() -> (Self, mpsc::Receiver<Outcome>) {
        let (tx, rx) = mpsc::channel();
        let completion = Self::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        (completion, rx)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Completion")
            .field(&self.0.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// A queued unit of work. Its completion fires with `Abandoned` if it is dropped unfinished.
#[derive(Debug)]
struct PendingRequest {
    id: Uuid,
    command: CommandLine,
    timeout: Duration,
    completion: Completion,
}

impl PendingRequest {
    fn new(command: CommandLine, timeout: Duration, completion: Completion) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            timeout,
            completion,
        }
    }

    fn finish(mut self, status: Status) {
        self.complete(status);
    }

    fn complete(&mut self, status: Status) {
        if let Some(callback) = self.completion.0.take() {
            callback(Outcome {
                request_id: self.id,
                status,
            });
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.completion.0.is_some() {
            log::debug!("Request {} abandoned: {}", self.id, self.command);
            self.complete(Status::Abandoned);
        }
    }
}

/// Timeouts applied by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTimeouts {
    /// Default for queued requests.
    pub scheduled: Duration,
    /// Synchronous attempt of [`Dispatcher::run_immediate`].
    pub immediate: Duration,
}

impl Default for DispatchTimeouts {
    fn default() -> Self {
        Self {
            scheduled: DEFAULT_SCHEDULED_TIMEOUT,
            immediate: DEFAULT_IMMEDIATE_TIMEOUT,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<PendingRequest>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<QueueState>,
    ready: Condvar,
}

/// FIFO command queue drained by a single dispatch thread.
///
/// Dispatch is serialized; execution is not. Each dequeued request runs on its own
/// thread so a hung GUI tool never holds up the requests behind it.
pub struct Dispatcher {
    shared: Arc<Shared>,
    runner: Arc<dyn CommandRunner>,
    timeouts: DispatchTimeouts,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queued", &self.queued())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Starts the dispatch thread.
    pub fn start(runner: Arc<dyn CommandRunner>, timeouts: DispatchTimeouts) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker_runner = Arc::clone(&runner);
        thread::Builder::new()
            .name("nifty-dispatch".to_string())
            .spawn(move || dispatch_loop(&worker_shared, &worker_runner))?;
        Ok(Self {
            shared,
            runner,
            timeouts,
        })
    }

    /// The timeouts this dispatcher was started with.
    pub fn timeouts(&self) -> DispatchTimeouts {
        self.timeouts
    }

    /// Queues `command` with the default scheduled timeout.
    pub fn schedule(&self, command: CommandLine, completion: Completion) -> Uuid {
        self.schedule_with_timeout(command, self.timeouts.scheduled, completion)
    }

    /// Queues `command` and returns its request id without waiting for it to run.
    /// A zero `timeout` means fire and forget.
    pub fn schedule_with_timeout(
        &self,
        command: CommandLine,
        timeout: Duration,
        completion: Completion,
    ) -> Uuid {
        self.enqueue(PendingRequest::new(command, timeout, completion))
    }

    /// Tries `command` synchronously with the immediate timeout. If that attempt fails
    /// the same command is queued once with the default scheduled timeout.
    pub fn run_immediate(&self, command: CommandLine, completion: Completion) -> Uuid {
        let mut request = PendingRequest::new(command, self.timeouts.immediate, completion);
        let id = request.id;
        match run_guarded(self.runner.as_ref(), &request.command, request.timeout) {
            Status::Succeeded => {
                request.finish(Status::Succeeded);
                id
            }
            _ => {
                log::debug!(
                    "Failed to run immediate (process hung?), trying again on a background thread: {}",
                    request.command
                );
                request.timeout = self.timeouts.scheduled;
                self.enqueue(request)
            }
        }
    }

    /// Number of requests waiting for the dispatch thread.
    pub fn queued(&self) -> usize {
        lock_unpoisoned(&self.shared.state).pending.len()
    }

    fn enqueue(&self, request: PendingRequest) -> Uuid {
        let id = request.id;
        log::info!("Scheduled [{}] {}", id, request.command);
        lock_unpoisoned(&self.shared.state)
            .pending
            .push_back(request);
        self.shared.ready.notify_one();
        id
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        lock_unpoisoned(&self.shared.state).closed = true;
        self.shared.ready.notify_all();
    }
}

fn dispatch_loop(shared: &Shared, runner: &Arc<dyn CommandRunner>) {
    loop {
        let request = {
            let mut state = lock_unpoisoned(&shared.state);
            while state.pending.is_empty() && !state.closed {
                state = shared
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.closed {
                log::debug!(
                    "Dispatcher closed with {} request(s) still queued.",
                    state.pending.len()
                );
                // Dropping the leftovers fires their completions with `Abandoned`.
                state.pending.clear();
                return;
            }
            match state.pending.pop_front() {
                Some(request) => request,
                None => continue,
            }
        };

        let id = request.id;
        let runner = Arc::clone(runner);
        let spawned = thread::Builder::new()
            .name(format!("nifty-exec-{}", id.simple()))
            .spawn(move || {
                let status = run_guarded(runner.as_ref(), &request.command, request.timeout);
                request.finish(status);
            });
        if let Err(e) = spawned {
            // The closure, and the request with it, was dropped: its completion reports Abandoned.
            log::error!("Could not start an execution thread for request {}: {}", id, e);
        }
    }
}

/// Runs one command, turning errors and panics into a [`Status`].
fn run_guarded(runner: &dyn CommandRunner, command: &CommandLine, timeout: Duration) -> Status {
    match panic::catch_unwind(AssertUnwindSafe(|| runner.run(command, timeout))) {
        Ok(Ok(())) => Status::Succeeded,
        Ok(Err(e)) => {
            log::debug!("{}", e);
            Status::Failed
        }
        Err(_) => {
            log::error!("Caught a panic while running '{}'.", command);
            Status::Failed
        }
    }
}
