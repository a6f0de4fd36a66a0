use std::sync::Arc;

use crate::{
    errors::RegistryError,
    resolver::{Injector, Resolver},
    types::{DependencyInfo, Injectable},
};

/// Resolved through [crate::Registry::object] with the markers of the injection point
impl<T: Injectable + ?Sized> Resolver for Arc<T> {
    fn resolve(injector: &Injector<'_>) -> Result<Self, RegistryError> {
        injector.object::<T>()
    }

    fn dependency_info() -> DependencyInfo {
        DependencyInfo::of::<T>()
    }

    fn is_resolvable(injector: &Injector<'_>) -> bool {
        injector.can_resolve::<T>()
    }
}
