use std::sync::{Mutex, MutexGuard, PoisonError};

/// Acquire a mutex, recovering the guard if a previous holder panicked.
///
/// Every writer in this crate leaves its state consistent between
/// individual mutations, so a poisoned lock carries usable data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
