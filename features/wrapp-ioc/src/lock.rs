use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::LockedError;

/// Guard for structures which are usable until they are explicitly locked, once.
///
/// After [OneShotLock::lock] every [OneShotLock::check] fails.
#[derive(Debug)]
pub struct OneShotLock {
    what: &'static str,
    locked: AtomicBool,
}
impl OneShotLock {
    pub const fn new(what: &'static str) -> Self {
        OneShotLock {
            what,
            locked: AtomicBool::new(false),
        }
    }

    /// Fails if the lock has already been set
    pub fn check(&self) -> Result<(), LockedError> {
        match self.locked.load(Ordering::Acquire) {
            true => Err(LockedError(self.what)),
            false => Ok(()),
        }
    }

    /// Sets the lock, fails if it was already set
    pub fn lock(&self) -> Result<(), LockedError> {
        match self.locked.swap(true, Ordering::AcqRel) {
            true => Err(LockedError(self.what)),
            false => Ok(()),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}
