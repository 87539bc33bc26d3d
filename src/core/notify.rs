// src/core/notify.rs

//! User-facing notices, such as a missing Perforce installation.

use crate::core::commons::lock_unpoisoned;
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

/// Shows a message to the user.
pub trait Notifier: Send + Sync {
    /// Shows `message`.
    fn notify(&self, message: &str);
}

/// Sends notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Shows each distinct message at most once per process.
pub struct OnceNotifier<N> {
    inner: N,
    shown: Mutex<HashSet<String>>,
}

impl<N: Notifier> OnceNotifier<N> {
    /// Forwards first occurrences to `inner`.
    pub fn new(inner: N) -> Self {
        Self {
            inner,
            shown: Mutex::new(HashSet::new()),
        }
    }
}

impl<N> fmt::Debug for OnceNotifier<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceNotifier")
            .field("shown", &lock_unpoisoned(&self.shown).len())
            .finish_non_exhaustive()
    }
}

impl<N: Notifier> Notifier for OnceNotifier<N> {
    fn notify(&self, message: &str) {
        let first_time = lock_unpoisoned(&self.shown).insert(message.to_string());
        if first_time {
            self.inner.notify(message);
        } else {
            log::debug!("Suppressed repeated notice: {}", message);
        }
    }
}
