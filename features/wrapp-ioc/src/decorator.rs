use std::{fmt::Debug, sync::Arc};

use crate::{
    id_matcher::IdMatcher,
    resources::ServiceResources,
    types::{DynError, Injectable, ServiceInstance, TypeInfo},
};

/// Decorates an instance, `Ok(None)` leaves it undecorated
pub(crate) type DecorateFn = dyn Fn(&ServiceResources<'_>, ServiceInstance) -> Result<Option<ServiceInstance>, DynError>
    + Send
    + Sync;

/// Wraps every service matched by `matcher` with another implementation of its contract
///
/// Decorators matching the same service are ordered by their constraints, the first one is the
/// outermost wrapper.
#[derive(Clone)]
pub struct DecoratorDef {
    pub(crate) decorator_id: String,
    pub(crate) matcher: IdMatcher,
    pub(crate) constraints: Vec<String>,
    pub(crate) contract: TypeInfo,
    pub(crate) decorate: Arc<DecorateFn>,
}
impl Debug for DecoratorDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratorDef")
            .field("decorator_id", &self.decorator_id)
            .field("matcher", &self.matcher)
            .field("constraints", &self.constraints)
            .field("contract", &self.contract.type_name)
            .finish()
    }
}

impl DecoratorDef {
    pub fn new<T, F>(
        decorator_id: &str,
        matcher: impl Into<IdMatcher>,
        constraints: &[&str],
        decorate: F,
    ) -> Self
    where
        T: Injectable + ?Sized,
        F: Fn(&ServiceResources<'_>, Arc<T>) -> Result<Option<Arc<T>>, DynError>
            + Send
            + Sync
            + 'static,
    {
        let decorator_id = decorator_id.to_string();
        let id = decorator_id.clone();
        DecoratorDef {
            decorator_id,
            matcher: matcher.into(),
            constraints: constraints.iter().map(|c| c.to_string()).collect(),
            contract: TypeInfo::of::<T>(),
            decorate: Arc::new(
                move |resources: &ServiceResources<'_>,
                      instance: ServiceInstance|
                      -> Result<Option<ServiceInstance>, DynError> {
                    let delegate = instance.downcast::<T>().map_err(|actual| {
                        format!("decorator '{id}' can not decorate an instance of '{actual}'")
                    })?;
                    Ok(decorate(resources, delegate)?.map(ServiceInstance::new))
                },
            ),
        }
    }

    pub fn decorator_id(&self) -> &str {
        &self.decorator_id
    }

    pub fn matches(&self, service_id: &str) -> bool {
        self.matcher.matches(service_id)
    }
}
