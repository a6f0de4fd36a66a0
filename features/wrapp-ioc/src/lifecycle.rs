use std::sync::Arc;

use crate::{
    errors::RegistryError, perthread::PerThreadManager, resources::ServiceResources,
    types::ServiceInstance,
};

/// Builds the real instance of a service, including advice and decorators
pub trait ObjectCreator {
    fn create_object(&self) -> Result<ServiceInstance, RegistryError>;
}
impl<F: Fn() -> Result<ServiceInstance, RegistryError>> ObjectCreator for F {
    fn create_object(&self) -> Result<ServiceInstance, RegistryError> {
        self()
    }
}

/// Decides when a service's instances are created, registered per scope name
pub trait ServiceLifecycle: Send + Sync {
    /// Returns the instance to use for the current call
    fn create_service(
        &self,
        resources: &ServiceResources<'_>,
        creator: &dyn ObjectCreator,
    ) -> Result<ServiceInstance, RegistryError>;

    /// Singleton instances are built once and cached by the registry
    fn is_singleton(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct SingletonLifecycle;
impl ServiceLifecycle for SingletonLifecycle {
    fn create_service(
        &self,
        _resources: &ServiceResources<'_>,
        creator: &dyn ObjectCreator,
    ) -> Result<ServiceInstance, RegistryError> {
        creator.create_object()
    }

    fn is_singleton(&self) -> bool {
        true
    }
}

/// One instance per thread, discarded by [PerThreadManager::cleanup]
#[derive(Debug)]
pub struct PerThreadLifecycle {
    manager: Arc<PerThreadManager>,
}
impl PerThreadLifecycle {
    pub fn new(manager: Arc<PerThreadManager>) -> Self {
        PerThreadLifecycle { manager }
    }
}
impl ServiceLifecycle for PerThreadLifecycle {
    fn create_service(
        &self,
        resources: &ServiceResources<'_>,
        creator: &dyn ObjectCreator,
    ) -> Result<ServiceInstance, RegistryError> {
        let key = format!("service:{}", resources.service_id().to_lowercase());
        self.manager
            .get_or_try_create(&key, || creator.create_object())
    }
}
