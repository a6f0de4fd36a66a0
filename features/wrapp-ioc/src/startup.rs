use std::{fmt::Debug, sync::Arc};

use crate::{errors::RegistryError, lock::OneShotLock, registry::Registry, types::DynError};

type HookFn = dyn Fn(&Registry) -> Result<(), DynError> + Send + Sync;

/// Work contributed to the `RegistryStartup` service
#[derive(Clone)]
pub struct StartupHook {
    id: String,
    run: Arc<HookFn>,
}
impl Debug for StartupHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StartupHook").field(&self.id).finish()
    }
}
impl StartupHook {
    pub fn new(
        id: &str,
        run: impl Fn(&Registry) -> Result<(), DynError> + Send + Sync + 'static,
    ) -> Self {
        StartupHook {
            id: id.to_string(),
            run: Arc::new(run),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Runs the ordered startup hooks, once
#[derive(Debug)]
pub struct RegistryStartup {
    hooks: Vec<StartupHook>,
    lock: OneShotLock,
}
impl RegistryStartup {
    pub fn new(hooks: Vec<StartupHook>) -> Self {
        RegistryStartup {
            hooks,
            lock: OneShotLock::new("the registry startup"),
        }
    }

    pub fn hook_ids(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(StartupHook::id)
    }

    pub(crate) fn run(&self, registry: &Registry) -> Result<(), RegistryError> {
        self.lock.lock()?;
        for hook in &self.hooks {
            tracing::debug!(hook = %hook.id, "Running registry startup hook");
            registry
                .tracker()
                .invoke(format!("Running startup hook '{}'", hook.id), || {
                    (hook.run)(registry).map_err(|cause| RegistryError::StartupFailed {
                        hook_id: hook.id.clone(),
                        cause: Arc::new(cause),
                    })
                })?;
        }
        Ok(())
    }
}
