use std::{any::type_name, fmt::Debug, ops::Deref, sync::Arc};

use crate::{
    errors::RegistryError,
    jit::JustInTime,
    registry::Registry,
    resolver::{Injector, Resolver},
    types::{DependencyInfo, Injectable},
};

/// Lazily resolved dependency
///
/// The lookup happens on first access, which lets services depend on each other as long as
/// neither touches the other while it is being built.
///
/// ### Panics
///
/// Dereferencing panics if the dependency can not be resolved, use [Lazy::try_get] to handle
/// the error instead.
pub struct Lazy<T: Injectable + ?Sized>(Arc<JustInTime<Arc<T>>>);
impl<T: Injectable + ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Lazy(Arc::clone(&self.0))
    }
}
impl<T: Injectable + ?Sized> Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Lazy").field(&self.0).finish()
    }
}
impl<T: Injectable + ?Sized> Deref for Lazy<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<T: Injectable + ?Sized> Resolver for Lazy<T> {
    fn resolve(injector: &Injector<'_>) -> Result<Self, RegistryError> {
        let registry = Arc::downgrade(&injector.registry().0);
        let point = injector.injection_point().clone();
        let module = injector.module();

        Ok(Lazy(Arc::new(JustInTime::new(
            format!("<Lazy {}>", type_name::<T>()),
            move || Registry::upgrade(&registry, type_name::<T>())?.object_in::<T>(&point, module),
        ))))
    }

    fn dependency_info() -> DependencyInfo {
        DependencyInfo {
            lazy: true,
            ..DependencyInfo::of::<T>()
        }
    }

    fn is_resolvable(injector: &Injector<'_>) -> bool {
        injector.can_resolve::<T>()
    }
}

impl<T: Injectable + ?Sized> Lazy<T> {
    /// Accesses the lazy dependency
    ///
    /// # Panics
    /// If the dependency can not be resolved
    pub fn get(&self) -> &Arc<T> {
        match self.0.force() {
            Ok(resolved) => resolved,
            Err(err) => panic!("Lazy dependency could not be resolved: {err}"),
        }
    }

    /// Try to access the lazy dependency, a failed lookup is not retried
    pub fn try_get(&self) -> Result<&Arc<T>, RegistryError> {
        self.0.force()
    }

    /// Whether the lookup has happened
    pub fn is_resolved(&self) -> bool {
        self.0.is_realized()
    }
}
