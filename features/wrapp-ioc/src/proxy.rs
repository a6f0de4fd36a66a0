//! Proxies implementing a service contract by forwarding to a lazily realized instance.
//!
//! A proxy is a plain struct implementing the contract trait, usually generated with
//! [crate::service_proxy]. It holds a [Delegate] and looks up the real instance on every call,
//! which lets singleton services be built on first use and per-thread services resolve to the
//! calling thread's instance.

use std::{marker::PhantomData, sync::Arc};

use crate::{
    errors::RegistryError,
    jit::JustInTime,
    types::{Injectable, ServiceInstance},
};

/// Where a proxy gets its real instance from
pub trait InstanceSource: Send + Sync {
    fn instance(&self) -> Result<ServiceInstance, RegistryError>;

    /// Names the proxied service in errors
    fn description(&self) -> &str;
}

impl InstanceSource for JustInTime<ServiceInstance> {
    fn instance(&self) -> Result<ServiceInstance, RegistryError> {
        self.get()
    }

    fn description(&self) -> &str {
        self.key()
    }
}

/// Typed handle to the real instance behind a proxy
pub struct Delegate<T: ?Sized> {
    source: Arc<dyn InstanceSource>,
    _contract: PhantomData<fn() -> Arc<T>>,
}
impl<T: ?Sized> Clone for Delegate<T> {
    fn clone(&self) -> Self {
        Delegate {
            source: Arc::clone(&self.source),
            _contract: PhantomData,
        }
    }
}

impl<T: Injectable + ?Sized> Delegate<T> {
    pub fn new(source: Arc<dyn InstanceSource>) -> Self {
        Delegate {
            source,
            _contract: PhantomData,
        }
    }

    pub fn try_get(&self) -> Result<Arc<T>, RegistryError> {
        let instance = self.source.instance()?;
        instance
            .downcast::<T>()
            .map_err(|actual| RegistryError::ServiceTypeMismatch {
                service_id: self.source.description().to_string(),
                requested: std::any::type_name::<T>(),
                actual,
            })
    }

    /// Returns the real instance
    ///
    /// # Panics
    /// If the instance can not be built. Contract methods have no way to return registry errors,
    /// use [Delegate::try_get] where they do.
    pub fn get(&self) -> Arc<T> {
        match self.try_get() {
            Ok(instance) => instance,
            Err(err) => panic!("{err}"),
        }
    }
}

/// Contracts which can be proxied, implemented for `dyn Trait` by [crate::service_proxy]
pub trait ServiceProxy: Injectable {
    fn create_proxy(delegate: Delegate<Self>) -> Arc<Self>;
}

/// Creates a proxy struct for a contract trait and implements [ServiceProxy] for it.
///
/// Every listed method is forwarded to the instance behind the proxy's [Delegate].
///
/// ```
/// use wrapp_ioc::service_proxy;
///
/// pub trait Greeter: Send + Sync {
///     fn greet(&self, name: &str) -> String;
/// }
///
/// service_proxy! {
///     pub struct GreeterProxy for dyn Greeter {
///         fn greet(&self, name: &str) -> String;
///     }
/// }
/// ```
#[macro_export]
macro_rules! service_proxy {
    (
        $vis:vis struct $proxy:ident for dyn $contract:ident {
            $( fn $method:ident(&self $(, $arg:ident: $arg_ty:ty)* $(,)?) $(-> $ret:ty)?; )*
        }
    ) => {
        $vis struct $proxy {
            delegate: $crate::proxy::Delegate<dyn $contract>,
        }

        impl $contract for $proxy {
            $(
                fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
                    self.delegate.get().$method($($arg),*)
                }
            )*
        }

        impl $crate::proxy::ServiceProxy for dyn $contract {
            fn create_proxy(
                delegate: $crate::proxy::Delegate<Self>,
            ) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new($proxy { delegate })
            }
        }
    };
}
