// SPDX-License-Identifier: GPL-3.0-only

//! Small shared helpers

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// State guarded this way stays consistent across a panic (plain flags and
/// counters), so continuing is preferable to cascading the panic.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
