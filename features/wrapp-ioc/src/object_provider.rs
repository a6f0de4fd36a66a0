use std::sync::Arc;

use crate::{
    markers::AnnotationProvider,
    registry::Registry,
    types::{DynError, ServiceInstance, TypeInfo},
};

/// Supplies objects for lookups without a recognized marker
///
/// Providers are consulted in order until one returns an instance of the requested contract.
pub trait ObjectProvider: Send + Sync {
    fn provide(
        &self,
        contract: TypeInfo,
        annotations: &dyn AnnotationProvider,
        registry: &Registry,
    ) -> Result<Option<ServiceInstance>, DynError>;
}

impl<F> ObjectProvider for F
where
    F: Fn(TypeInfo, &dyn AnnotationProvider, &Registry) -> Result<Option<ServiceInstance>, DynError>
        + Send
        + Sync,
{
    fn provide(
        &self,
        contract: TypeInfo,
        annotations: &dyn AnnotationProvider,
        registry: &Registry,
    ) -> Result<Option<ServiceInstance>, DynError> {
        self(contract, annotations, registry)
    }
}

/// Chain of the contributed [ObjectProvider]s
pub struct MasterObjectProvider {
    providers: Vec<Arc<dyn ObjectProvider>>,
}
impl std::fmt::Debug for MasterObjectProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterObjectProvider")
            .field("providers", &self.providers.len())
            .finish()
    }
}
impl MasterObjectProvider {
    pub fn new(providers: Vec<Arc<dyn ObjectProvider>>) -> Self {
        MasterObjectProvider { providers }
    }
}
impl ObjectProvider for MasterObjectProvider {
    fn provide(
        &self,
        contract: TypeInfo,
        annotations: &dyn AnnotationProvider,
        registry: &Registry,
    ) -> Result<Option<ServiceInstance>, DynError> {
        for provider in &self.providers {
            if let Some(instance) = provider.provide(contract, annotations, registry)? {
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }
}
