// SPDX-License-Identifier: GPL-3.0-only

//! Exclusive permit for opening camera hardware
//!
//! Camera hardware is shared across every recorder in the process, so a
//! device may only be opened by whoever holds the single permit. Waiting is
//! bounded; a timeout is reported, never retried.

use crate::errors::{CaptureError, CaptureResult};
use crate::utils::lock_or_recover;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Single-slot permit with a bounded wait
#[derive(Debug, Default)]
pub struct DeviceAcquisitionGuard {
    held: Mutex<bool>,
    released: Condvar,
}

impl DeviceAcquisitionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard ready to be shared between recorders
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Wait up to `timeout` for the permit
    ///
    /// On timeout nothing changes and [`CaptureError::AcquisitionTimeout`] is
    /// returned. The permit is released when the returned [`Permit`] is
    /// released or dropped.
    pub fn acquire(self: &Arc<Self>, timeout: Duration) -> CaptureResult<Permit> {
        let held = lock_or_recover(&self.held);
        let (mut held, _) = self
            .released
            .wait_timeout_while(held, timeout, |held| *held)
            .unwrap_or_else(PoisonError::into_inner);

        if *held {
            warn!(timeout_ms = timeout.as_millis() as u64, "Camera permit still held");
            return Err(CaptureError::AcquisitionTimeout(timeout));
        }

        *held = true;
        debug!("Camera permit acquired");
        Ok(Permit {
            guard: Arc::clone(self),
        })
    }

    /// Whether someone currently holds the permit
    pub fn is_held(&self) -> bool {
        *lock_or_recover(&self.held)
    }

    fn release(&self) {
        let mut held = lock_or_recover(&self.held);
        *held = false;
        drop(held);
        self.released.notify_one();
        debug!("Camera permit released");
    }
}

/// Proof of holding the camera permit
///
/// Dropping it releases the permit, so no early return can leak it.
#[derive(Debug)]
#[must_use = "dropping the permit releases it immediately"]
pub struct Permit {
    guard: Arc<DeviceAcquisitionGuard>,
}

impl Permit {
    /// Give the permit back
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.guard.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_acquire_and_release() {
        let guard = DeviceAcquisitionGuard::shared();
        let permit = guard.acquire(Duration::from_millis(10)).unwrap();
        assert!(guard.is_held());
        permit.release();
        assert!(!guard.is_held());
        let _again = guard.acquire(Duration::from_millis(10)).unwrap();
    }

    #[test]
    fn test_second_acquire_times_out() {
        let guard = DeviceAcquisitionGuard::shared();
        let _permit = guard.acquire(Duration::from_millis(10)).unwrap();

        let start = Instant::now();
        let err = guard.acquire(Duration::from_millis(50)).unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(err, CaptureError::AcquisitionTimeout(Duration::from_millis(50)));
        assert!(guard.is_held());
    }

    #[test]
    fn test_waiter_gets_permit_after_release() {
        let guard = DeviceAcquisitionGuard::shared();
        let permit = guard.acquire(Duration::from_millis(10)).unwrap();

        let waiter = {
            let guard = Arc::clone(&guard);
            thread::spawn(move || guard.acquire(Duration::from_secs(2)).map(|_| ()))
        };
        thread::sleep(Duration::from_millis(30));
        drop(permit);

        assert!(waiter.join().unwrap().is_ok());
        assert!(!guard.is_held());
    }
}
