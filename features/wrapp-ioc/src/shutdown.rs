use parking_lot::Mutex;

use crate::{errors::LockedError, lock::OneShotLock, types::DynError};

type Listener = Box<dyn FnOnce() -> Result<(), DynError> + Send>;

/// Notifies listeners once the registry shuts down
///
/// Will-shutdown listeners run first, while services are still usable, then the shutdown
/// listeners. A failing listener is logged and does not keep the others from running.
pub struct RegistryShutdownHub {
    lock: OneShotLock,
    will_shutdown: Mutex<Vec<Listener>>,
    listeners: Mutex<Vec<Listener>>,
}
impl std::fmt::Debug for RegistryShutdownHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryShutdownHub")
            .field("shut_down", &self.lock.is_locked())
            .field("will_shutdown", &self.will_shutdown.lock().len())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}
impl Default for RegistryShutdownHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryShutdownHub {
    pub fn new() -> Self {
        RegistryShutdownHub {
            lock: OneShotLock::new("the registry shutdown hub"),
            will_shutdown: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn add_listener(
        &self,
        listener: impl FnOnce() -> Result<(), DynError> + Send + 'static,
    ) -> Result<(), LockedError> {
        self.lock.check()?;
        self.listeners.lock().push(Box::new(listener));
        Ok(())
    }

    pub fn add_will_shutdown_listener(
        &self,
        listener: impl FnOnce() -> Result<(), DynError> + Send + 'static,
    ) -> Result<(), LockedError> {
        self.lock.check()?;
        self.will_shutdown.lock().push(Box::new(listener));
        Ok(())
    }

    /// Runs all listeners, fails if the hub already fired
    pub(crate) fn fire_shutdown(&self) -> Result<(), LockedError> {
        self.lock.lock()?;

        let will_shutdown = std::mem::take(&mut *self.will_shutdown.lock());
        let listeners = std::mem::take(&mut *self.listeners.lock());
        tracing::debug!(
            will_shutdown = will_shutdown.len(),
            listeners = listeners.len(),
            "Notifying registry shutdown listeners"
        );

        for listener in will_shutdown.into_iter().chain(listeners) {
            if let Err(err) = listener() {
                tracing::error!("Registry shutdown listener failed: {err}");
            }
        }
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock.is_locked()
    }
}
