use std::{marker::PhantomData, sync::Arc};

use crate::{
    resources::ServiceResources,
    types::{DynError, Injectable, ServiceInstance, TypeInfo},
};

/// A Factory providing instances of a service contract
pub trait ServiceFactory<T: Injectable + ?Sized>: Send + Sync {
    /// Constructs a new instance of the service
    ///
    /// Returns the constructed instance, or an error if dependencies are not satisfied or the
    /// construction failed
    fn create(&self, resources: &ServiceResources<'_>) -> Result<Arc<T>, DynError>;
}
impl<T, F> ServiceFactory<T> for F
where
    T: Injectable + ?Sized,
    F: Fn(&ServiceResources<'_>) -> Result<Arc<T>, DynError> + Send + Sync,
{
    fn create(&self, resources: &ServiceResources<'_>) -> Result<Arc<T>, DynError> {
        self(resources)
    }
}

/// Wrapper Trait for factories, providing type erased instances
pub trait DynServiceFactory: Send + Sync {
    fn provides(&self) -> TypeInfo;

    fn create(&self, resources: &ServiceResources<'_>) -> Result<ServiceInstance, DynError>;
}

/// Erases the contract of a [ServiceFactory]
pub(crate) struct TypedFactory<T: ?Sized, F> {
    factory: F,
    _provides: PhantomData<fn() -> Arc<T>>,
}
impl<T: Injectable + ?Sized, F: ServiceFactory<T>> TypedFactory<T, F> {
    pub(crate) fn new(factory: F) -> Self {
        TypedFactory {
            factory,
            _provides: PhantomData,
        }
    }
}
impl<T: Injectable + ?Sized, F: ServiceFactory<T>> DynServiceFactory for TypedFactory<T, F> {
    fn provides(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn create(&self, resources: &ServiceResources<'_>) -> Result<ServiceInstance, DynError> {
        // Forward the call to the specific implementation
        self.factory.create(resources).map(ServiceInstance::new)
    }
}
