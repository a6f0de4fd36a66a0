//! Resolution of autobuild constructor parameters.

use std::any::type_name;

use crate::{
    errors::RegistryError,
    markers::InjectionPoint,
    registry::Registry,
    types::{DependencyInfo, Injectable, TypeInfo},
};

pub mod arc;
pub mod lazy;
pub mod marked;

pub use lazy::Lazy;
pub use marked::Marked;

/// Allows custom behaviour on injection
pub trait Resolver: Sized {
    fn resolve(injector: &Injector<'_>) -> Result<Self, RegistryError>;

    fn dependency_info() -> DependencyInfo;

    /// Used to pick the widest constructor whose parameters can all be resolved
    fn is_resolvable(_injector: &Injector<'_>) -> bool {
        true
    }
}

/// Access to the registry while a constructor's parameters are resolved
#[derive(Debug, Clone)]
pub struct Injector<'a> {
    registry: &'a Registry,
    module: Option<usize>,
    point: InjectionPoint,
}
impl<'a> Injector<'a> {
    pub(crate) fn new(registry: &'a Registry, module: Option<usize>) -> Self {
        Injector {
            registry,
            module,
            point: InjectionPoint::new(),
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Markers requested for the parameter being resolved
    pub fn injection_point(&self) -> &InjectionPoint {
        &self.point
    }

    /// Copy of this injector which also requests `marker`
    pub fn with_marker(&self, marker: TypeInfo) -> Injector<'a> {
        let mut injector = self.clone();
        injector.point.add_marker(marker);
        injector
    }

    /// Looks up `T` for the current injection point
    pub fn object<T: Injectable + ?Sized>(&self) -> Result<std::sync::Arc<T>, RegistryError> {
        self.registry.object_in(&self.point, self.module)
    }

    pub fn can_resolve<T: Injectable + ?Sized>(&self) -> bool {
        self.registry
            .is_resolvable(TypeInfo::of::<T>(), &self.point, self.module)
    }

    pub(crate) fn module(&self) -> Option<usize> {
        self.module
    }
}

impl<R: Resolver> Resolver for Option<R> {
    fn resolve(injector: &Injector<'_>) -> Result<Self, RegistryError> {
        match R::resolve(injector) {
            Ok(resolved) => Ok(Some(resolved)),
            // A missing dependency is fine, a broken one is not
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn dependency_info() -> DependencyInfo {
        DependencyInfo {
            optional: true,
            ..R::dependency_info()
        }
    }
}

/// All parameters of a constructor, resolved in order
pub trait ResolveAll: Sized {
    fn resolve_all(injector: &Injector<'_>) -> Result<Self, RegistryError>;

    fn dependencies() -> Vec<DependencyInfo>;

    fn all_resolvable(injector: &Injector<'_>) -> bool;
}

impl ResolveAll for () {
    fn resolve_all(_injector: &Injector<'_>) -> Result<Self, RegistryError> {
        Ok(())
    }

    fn dependencies() -> Vec<DependencyInfo> {
        Vec::new()
    }

    fn all_resolvable(_injector: &Injector<'_>) -> bool {
        true
    }
}

macro_rules! resolve_tuple {
    ($($index:tt $param:ident),+) => {
        impl<$($param: Resolver),+> ResolveAll for ($($param,)+) {
            fn resolve_all(injector: &Injector<'_>) -> Result<Self, RegistryError> {
                Ok(($(
                    $param::resolve(injector).map_err(|cause| RegistryError::UnresolvedParameter {
                        index: $index,
                        parameter: type_name::<$param>(),
                        cause: Box::new(cause),
                    })?,
                )+))
            }

            fn dependencies() -> Vec<DependencyInfo> {
                vec![$($param::dependency_info()),+]
            }

            fn all_resolvable(injector: &Injector<'_>) -> bool {
                $($param::is_resolvable(injector))&&+
            }
        }
    };
}

resolve_tuple!(0 A);
resolve_tuple!(0 A, 1 B);
resolve_tuple!(0 A, 1 B, 2 C);
resolve_tuple!(0 A, 1 B, 2 C, 3 D);
resolve_tuple!(0 A, 1 B, 2 C, 3 D, 4 E);
resolve_tuple!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
resolve_tuple!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
resolve_tuple!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);
