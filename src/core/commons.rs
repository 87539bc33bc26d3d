// src/core/commons.rs

//! Small helpers shared across the crate.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the data if a previous holder panicked.
///
/// Every mutex in the crate guards a plain collection that is never left half-updated,
/// so a poisoned lock is still safe to use.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
