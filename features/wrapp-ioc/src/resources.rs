use std::sync::Arc;

use tracing::Span;

use crate::{
    autobuild::Autobuild,
    configuration::{ConfigMap, MapKey},
    errors::RegistryError,
    markers::AnnotationProvider,
    registry::Registry,
    service_def::ServiceDef,
    tracker::OperationTracker,
    types::{Injectable, TypeInfo},
};

/// Everything a factory, contribution, decorator or advisor needs while a service is built
///
/// Lookups which depend on the requesting module (the [crate::markers::Local] marker, autobuild)
/// use the module whose code is running.
pub struct ServiceResources<'a> {
    registry: &'a Registry,
    module: usize,
    def: &'a ServiceDef,
}

impl<'a> ServiceResources<'a> {
    pub(crate) fn new(registry: &'a Registry, module: usize, def: &'a ServiceDef) -> Self {
        ServiceResources {
            registry,
            module,
            def,
        }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Id of the service being built, decorated or configured
    pub fn service_id(&self) -> &str {
        &self.def.service_id
    }

    pub fn contract(&self) -> TypeInfo {
        self.def.contract
    }

    pub fn service_def(&self) -> &ServiceDef {
        self.def
    }

    pub fn module_name(&self) -> &str {
        self.registry.module_name(self.module)
    }

    /// Span named after the running module and the service
    pub fn logger(&self) -> Span {
        self.registry
            .logger_source()
            .service_logger(self.module_name(), self.service_id())
    }

    pub fn tracker(&self) -> &OperationTracker {
        self.registry.tracker()
    }

    pub fn service<T: Injectable + ?Sized>(&self, service_id: &str) -> Result<Arc<T>, RegistryError> {
        self.registry.service(service_id)
    }

    pub fn service_by_type<T: Injectable + ?Sized>(&self) -> Result<Arc<T>, RegistryError> {
        self.registry.service_by_type()
    }

    pub fn object<T: Injectable + ?Sized>(
        &self,
        annotations: &dyn AnnotationProvider,
    ) -> Result<Arc<T>, RegistryError> {
        self.registry.object_in(annotations, Some(self.module))
    }

    pub fn autobuild<C: Autobuild>(&self) -> Result<C, RegistryError> {
        self.registry.autobuild_in(Some(self.module))
    }

    /// Unordered configuration contributed to this service
    pub fn unordered_configuration<V: Send + 'static>(&self) -> Result<Vec<V>, RegistryError> {
        self.registry.unordered_configuration(self.service_id())
    }

    /// Ordered configuration contributed to this service
    pub fn ordered_configuration<V: Send + 'static>(&self) -> Result<Vec<V>, RegistryError> {
        self.registry.ordered_configuration(self.service_id())
    }

    /// Mapped configuration contributed to this service
    pub fn mapped_configuration<K: MapKey, V: Send + 'static>(
        &self,
    ) -> Result<ConfigMap<K, V>, RegistryError> {
        self.registry.mapped_configuration(self.service_id())
    }
}
