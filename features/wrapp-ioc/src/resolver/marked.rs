use std::{any::type_name, fmt::Debug, marker::PhantomData, ops::Deref};

use crate::{
    errors::RegistryError,
    resolver::{Injector, Resolver},
    types::{DependencyInfo, TypeInfo},
};

/// Resolves `R` with the marker `M` added to the injection point
///
/// `Marked<Local, Arc<dyn Greeter>>` only considers services of the module whose constructor
/// is being autobuilt.
pub struct Marked<M, R> {
    value: R,
    _marker: PhantomData<fn() -> M>,
}
impl<M, R: Debug> Debug for Marked<M, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marked")
            .field("marker", &type_name::<M>())
            .field("value", &self.value)
            .finish()
    }
}
impl<M, R: Clone> Clone for Marked<M, R> {
    fn clone(&self) -> Self {
        Marked {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}
impl<M, R> Deref for Marked<M, R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}
impl<M, R> Marked<M, R> {
    pub fn into_inner(self) -> R {
        self.value
    }
}

impl<M: 'static, R: Resolver> Resolver for Marked<M, R> {
    fn resolve(injector: &Injector<'_>) -> Result<Self, RegistryError> {
        let value = R::resolve(&injector.with_marker(TypeInfo::of::<M>()))?;
        Ok(Marked {
            value,
            _marker: PhantomData,
        })
    }

    fn dependency_info() -> DependencyInfo {
        let mut info = R::dependency_info();
        let marker = TypeInfo::of::<M>();
        if !info.markers.contains(&marker) {
            info.markers.push(marker);
        }
        info
    }

    fn is_resolvable(injector: &Injector<'_>) -> bool {
        R::is_resolvable(&injector.with_marker(TypeInfo::of::<M>()))
    }
}
