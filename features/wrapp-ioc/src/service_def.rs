use std::{fmt::Debug, sync::Arc};

use crate::{
    advice::{AdviceTable, Advisable, MethodInfo},
    autobuild::Autobuild,
    factories::{DynServiceFactory, ServiceFactory, TypedFactory},
    proxy::{Delegate, InstanceSource, ServiceProxy},
    resources::ServiceResources,
    types::{DynError, Injectable, ServiceInstance, TypeInfo},
};

/// Scope of services built once and shared
pub const SCOPE_SINGLETON: &str = "singleton";
/// Alias of [SCOPE_SINGLETON]
pub const SCOPE_DEFAULT: &str = "default";
/// Scope of services built once per thread, see [crate::perthread::PerThreadManager]
pub const SCOPE_PERTHREAD: &str = "perthread";

pub(crate) type ProxyFn = dyn Fn(Arc<dyn InstanceSource>) -> ServiceInstance + Send + Sync;

/// Applies advice to an instance of an [Advisable] contract
#[derive(Clone)]
pub(crate) struct AdvisableContract {
    pub(crate) methods: fn() -> Vec<MethodInfo>,
    pub(crate) create: Arc<
        dyn Fn(ServiceInstance, Arc<AdviceTable>) -> Result<ServiceInstance, &'static str>
            + Send
            + Sync,
    >,
}

/// Describes one service of a module
pub struct ServiceDef {
    pub(crate) service_id: String,
    pub(crate) contract: TypeInfo,
    pub(crate) scope: String,
    pub(crate) markers: Vec<TypeInfo>,
    pub(crate) eager_load: bool,
    pub(crate) factory: Box<dyn DynServiceFactory>,
    pub(crate) proxy: Option<Arc<ProxyFn>>,
    pub(crate) advisable: Option<AdvisableContract>,
}
impl Debug for ServiceDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDef")
            .field("service_id", &self.service_id)
            .field("contract", &self.contract.type_name)
            .field("scope", &self.scope)
            .field("markers", &self.markers.iter().map(|m| m.type_name).collect::<Vec<_>>())
            .field("eager_load", &self.eager_load)
            .field("proxied", &self.proxy.is_some())
            .field("advisable", &self.advisable.is_some())
            .finish()
    }
}

impl ServiceDef {
    /// Starts a definition for a service implementing `T`, built by `factory`
    pub fn builder<T, F>(service_id: &str, factory: F) -> ServiceDefBuilder<T>
    where
        T: Injectable + ?Sized,
        F: Fn(&ServiceResources<'_>) -> Result<Arc<T>, DynError> + Send + Sync + 'static,
    {
        Self::from_factory(service_id, factory)
    }

    pub fn from_factory<T: Injectable + ?Sized>(
        service_id: &str,
        factory: impl ServiceFactory<T> + 'static,
    ) -> ServiceDefBuilder<T> {
        ServiceDefBuilder {
            def: ServiceDef {
                service_id: service_id.to_string(),
                contract: TypeInfo::of::<T>(),
                scope: SCOPE_SINGLETON.to_string(),
                markers: Vec::new(),
                eager_load: false,
                factory: Box::new(TypedFactory::<T, _>::new(factory)),
                proxy: None,
                advisable: None,
            },
            _contract: std::marker::PhantomData,
        }
    }

    /// Service implemented by `C`, which is autobuilt in the defining module's context
    pub fn autobuilt<T, C>(
        service_id: &str,
        upcast: impl Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
    ) -> ServiceDefBuilder<T>
    where
        T: Injectable + ?Sized,
        C: Autobuild,
    {
        Self::builder::<T, _>(service_id, move |resources: &ServiceResources<'_>| {
            let built = resources.autobuild::<C>()?;
            Ok(upcast(Arc::new(built)))
        })
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn contract(&self) -> TypeInfo {
        self.contract
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn markers(&self) -> &[TypeInfo] {
        &self.markers
    }

    pub fn is_eager_load(&self) -> bool {
        self.eager_load
    }

    pub fn has_marker(&self, marker: &TypeInfo) -> bool {
        self.markers.contains(marker)
    }
}

pub struct ServiceDefBuilder<T: ?Sized> {
    def: ServiceDef,
    _contract: std::marker::PhantomData<fn() -> Arc<T>>,
}
impl<T: Injectable + ?Sized> ServiceDefBuilder<T> {
    pub fn scope(mut self, scope: &str) -> Self {
        self.def.scope = scope.to_string();
        self
    }

    /// Build the service during [crate::Registry::perform_registry_startup]
    pub fn eager_load(mut self) -> Self {
        self.def.eager_load = true;
        self
    }

    pub fn marker<M: 'static>(mut self) -> Self {
        let marker = TypeInfo::of::<M>();
        if !self.def.markers.contains(&marker) {
            self.def.markers.push(marker);
        }
        self
    }

    pub fn build(self) -> ServiceDef {
        self.def
    }
}
impl<T: Injectable + ?Sized> From<ServiceDefBuilder<T>> for ServiceDef {
    fn from(builder: ServiceDefBuilder<T>) -> Self {
        builder.build()
    }
}
impl<T: ServiceProxy + ?Sized> ServiceDefBuilder<T> {
    /// Hand out a proxy which builds the service on first use
    ///
    /// Services of scopes other than singleton resolve the calling thread's instance on every
    /// call through the proxy.
    pub fn with_proxy(mut self) -> Self {
        self.def.proxy = Some(Arc::new(|source: Arc<dyn InstanceSource>| {
            ServiceInstance::new(T::create_proxy(Delegate::new(source)))
        }));
        self
    }
}
impl<T: Advisable + ?Sized> ServiceDefBuilder<T> {
    /// Allow advisors to advise the methods of this service
    pub fn advisable(mut self) -> Self {
        self.def.advisable = Some(AdvisableContract {
            methods: T::advised_methods,
            create: Arc::new(
                |instance: ServiceInstance,
                 advice: Arc<AdviceTable>|
                 -> Result<ServiceInstance, &'static str> {
                let target = instance.downcast::<T>()?;
                Ok(ServiceInstance::new(T::create_advised(target, advice)))
            },
            ),
        });
        self
    }
}
