use std::{
    any::{Any, TypeId},
    fmt::Debug,
    sync::Arc,
};

/// All errors must be Send + Sync so they can be shared between threads
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Services are shared between threads, so anything the registry hands out
/// needs to be Send + Sync + 'static.
///
/// Contracts are usually trait objects (`dyn Greeter`), which is why this is also
/// implemented for unsized types.
pub trait Injectable: Send + Sync + 'static {}
impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn is<T: 'static + ?Sized>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

/// Describes a dependency of an autobuilt constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    pub type_info: TypeInfo,
    /// Markers narrowing the lookup
    pub markers: Vec<TypeInfo>,
    pub optional: bool,
    pub lazy: bool,
}
impl DependencyInfo {
    pub fn of<T: 'static + ?Sized>() -> Self {
        DependencyInfo {
            type_info: TypeInfo::of::<T>(),
            markers: Vec::new(),
            optional: false,
            lazy: false,
        }
    }
}

/// Type erased service instance
///
/// Holds an `Arc<T>` for the service contract `T` together with the contract's [TypeInfo].
#[derive(Clone)]
pub struct ServiceInstance {
    pub info: TypeInfo,
    instance: Arc<dyn Any + Send + Sync + 'static>,
}
impl Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ServiceInstance")
            .field(&self.info.type_name)
            .finish()
    }
}

impl ServiceInstance {
    pub fn new<T: Injectable + ?Sized>(instance: Arc<T>) -> Self {
        ServiceInstance {
            info: TypeInfo::of::<T>(),
            instance: Arc::new(instance),
        }
    }

    /// Returns the contained service, or the name of the actual contract on mismatch
    pub fn downcast<T: Injectable + ?Sized>(&self) -> Result<Arc<T>, &'static str> {
        match self.instance.downcast_ref::<Arc<T>>() {
            Some(downcasted) => Ok(Arc::clone(downcasted)),
            None => Err(self.info.type_name),
        }
    }
}
