//! The service registry: owns all modules and builtin services and answers every lookup.

use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

use crate::{
    activity::ServiceActivityScoreboard,
    autobuild::Autobuild,
    configuration::{
        mapped::MappedCollector, ordered::OrderedCollector, unordered::UnorderedCollector,
        ConfigMap, ConfigurationKind, MapKey,
    },
    contribution::{ContributeFn, ContributionDef},
    errors::{ConfigurationError, LockedError, RegistryError},
    ioc_module::{MASTER_OBJECT_PROVIDER, REGISTRY_STARTUP},
    jit::{construction, JustInTime},
    lifecycle::ServiceLifecycle,
    lock::OneShotLock,
    logger::LoggerSource,
    markers::{AnnotationProvider, Local},
    module::Module,
    object_provider::{MasterObjectProvider, ObjectProvider},
    perthread::PerThreadManager,
    proxy::{Delegate, ServiceProxy},
    resources::ServiceResources,
    service_def::ServiceDef,
    shutdown::RegistryShutdownHub,
    startup::RegistryStartup,
    tracker::OperationTracker,
    types::{DynError, Injectable, ServiceInstance, TypeInfo},
};

mod builder;

pub use builder::{
    RegistryBuilder, ACTIVITY_SCOREBOARD, LOGGER_SOURCE, OPERATION_TRACKER, PERTHREAD_MANAGER,
    SHUTDOWN_HUB,
};

/// Where a service id points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ServiceKey {
    Builtin(usize),
    Module { module: usize, service: usize },
}

pub(crate) struct BuiltinService {
    pub(crate) service_id: String,
    pub(crate) instance: ServiceInstance,
}

/// Phases of a registry, in the order they are passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Constructing,
    Started,
    ShuttingDown,
    ShutDown,
}

/// Handle to a service registry, cheap to clone
///
/// Created by [RegistryBuilder::build]. Everything the registry indexes is fixed at that point,
/// services themselves are built on demand.
#[derive(Clone)]
pub struct Registry(pub(crate) Arc<RegistryInner>);

pub(crate) struct RegistryInner {
    pub(crate) modules: Vec<Module>,
    pub(crate) builtins: Vec<BuiltinService>,
    /// Lowercase service id to service
    pub(crate) index: HashMap<String, ServiceKey>,
    /// Contract to services implementing it, in registration order
    pub(crate) contracts: HashMap<TypeId, Vec<ServiceKey>>,
    /// Marker to services carrying it
    pub(crate) markers: HashMap<TypeId, Vec<ServiceKey>>,
    /// Lowercase target service id to (module, contribution)
    pub(crate) contributions: HashMap<String, Vec<(usize, usize)>>,
    pub(crate) lifecycles: HashMap<String, Arc<dyn ServiceLifecycle>>,
    pub(crate) perthread: Arc<PerThreadManager>,
    pub(crate) shutdown_hub: Arc<RegistryShutdownHub>,
    pub(crate) scoreboard: Arc<ServiceActivityScoreboard>,
    pub(crate) tracker: Arc<OperationTracker>,
    pub(crate) logger_source: Arc<LoggerSource>,
    pub(crate) lock: OneShotLock,
    pub(crate) startup_lock: OneShotLock,
    pub(crate) state: Mutex<RegistryState>,
}

impl Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let modules: Vec<&str> = self.0.modules.iter().map(Module::name).collect();
        f.debug_struct("Registry")
            .field("state", &self.state())
            .field("modules", &modules)
            .field("services", &self.0.index.len())
            .finish()
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Returns the service with the given id, ids are case-insensitive
    pub fn service<T: Injectable + ?Sized>(&self, service_id: &str) -> Result<Arc<T>, RegistryError> {
        self.check_active()?;
        let key = self
            .0
            .index
            .get(&service_id.to_lowercase())
            .copied()
            .ok_or_else(|| RegistryError::UnknownService {
                service_id: service_id.to_string(),
                known: self.service_ids(),
            })?;
        self.typed_instance(key)
    }

    /// Returns the single service implementing `T`
    pub fn service_by_type<T: Injectable + ?Sized>(&self) -> Result<Arc<T>, RegistryError> {
        self.check_active()?;
        let contract = TypeInfo::of::<T>();
        match self.services_implementing(contract).as_slice() {
            [key] => self.typed_instance(*key),
            [] => Err(RegistryError::NoServiceForType {
                contract: contract.type_name,
            }),
            keys => Err(RegistryError::AmbiguousServiceType {
                contract: contract.type_name,
                service_ids: self.sorted_ids(keys),
            }),
        }
    }

    /// Resolves an object for an injection point
    ///
    /// Markers of the injection point which some service carries narrow the services
    /// implementing `T` down to exactly one. Without such markers the contributed
    /// [ObjectProvider]s are asked first, then the single service implementing `T` is used.
    pub fn object<T: Injectable + ?Sized>(
        &self,
        annotations: &dyn AnnotationProvider,
    ) -> Result<Arc<T>, RegistryError> {
        self.object_in(annotations, None)
    }

    /// [Registry::object] on behalf of a module, which [Local] restricts the lookup to
    pub(crate) fn object_in<T: Injectable + ?Sized>(
        &self,
        annotations: &dyn AnnotationProvider,
        module: Option<usize>,
    ) -> Result<Arc<T>, RegistryError> {
        self.check_active()?;
        let contract = TypeInfo::of::<T>();
        let recognized = self.recognized_markers(annotations);
        if recognized.is_empty() {
            return self.provided_object(contract, annotations);
        }

        let markers: Vec<&'static str> = recognized.iter().map(|m| m.type_name).collect();
        match self.marked_candidates(contract, &recognized, module).as_slice() {
            [key] => self.typed_instance(*key),
            [] => Err(RegistryError::NoServiceForMarkers {
                contract: contract.type_name,
                markers,
            }),
            keys => Err(RegistryError::AmbiguousMarkers {
                contract: contract.type_name,
                markers,
                service_ids: self.sorted_ids(keys),
            }),
        }
    }

    /// Whether [Registry::object_in] would find exactly one service, object providers aside
    pub(crate) fn is_resolvable(
        &self,
        contract: TypeInfo,
        annotations: &dyn AnnotationProvider,
        module: Option<usize>,
    ) -> bool {
        let recognized = self.recognized_markers(annotations);
        let candidates = match recognized.is_empty() {
            true => self.services_implementing(contract),
            false => self.marked_candidates(contract, &recognized, module),
        };
        candidates.len() == 1
    }

    /// Markers some service carries, plus [Local]
    fn recognized_markers(&self, annotations: &dyn AnnotationProvider) -> Vec<TypeInfo> {
        let local = TypeInfo::of::<Local>();
        annotations
            .markers()
            .iter()
            .filter(|marker| **marker == local || self.0.markers.contains_key(&marker.type_id))
            .copied()
            .collect()
    }

    fn marked_candidates(
        &self,
        contract: TypeInfo,
        recognized: &[TypeInfo],
        module: Option<usize>,
    ) -> Vec<ServiceKey> {
        let local = TypeInfo::of::<Local>();
        let mut candidates = self.services_implementing(contract);
        for marker in recognized {
            match (*marker == local, module) {
                (true, Some(requester)) => candidates.retain(|key| {
                    matches!(key, ServiceKey::Module { module, .. } if *module == requester)
                }),
                (true, None) => {}
                (false, _) => {
                    let marked = self.0.markers.get(&marker.type_id);
                    candidates.retain(|key| marked.is_some_and(|marked| marked.contains(key)));
                }
            }
        }
        candidates
    }

    fn provided_object<T: Injectable + ?Sized>(
        &self,
        contract: TypeInfo,
        annotations: &dyn AnnotationProvider,
    ) -> Result<Arc<T>, RegistryError> {
        let master = self.service::<MasterObjectProvider>(MASTER_OBJECT_PROVIDER)?;
        let provided = master
            .provide(contract, annotations, self)
            .map_err(|cause| RegistryError::resolve_failed(contract.type_name, cause))?;

        match provided {
            Some(instance) => instance.downcast::<T>().map_err(|actual| {
                RegistryError::resolve_failed(
                    contract.type_name,
                    format!("an object provider returned an instance of '{actual}'"),
                )
            }),
            None => self.service_by_type::<T>(),
        }
    }

    pub fn autobuild<C: Autobuild>(&self) -> Result<C, RegistryError> {
        self.autobuild_in(None)
    }

    /// Proxy for `T` which autobuilds `C` the first time a method is invoked
    pub fn proxy<T, C>(
        &self,
        upcast: impl Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
    ) -> Result<Arc<T>, RegistryError>
    where
        T: ServiceProxy + ?Sized,
        C: Autobuild,
    {
        self.check_active()?;
        let registry = Arc::downgrade(&self.0);
        let description = format!("<Autobuild proxy {}({})>", type_name::<C>(), type_name::<T>());
        let key = description.clone();
        let source = JustInTime::new(&description, move || {
            let _building = construction::enter(&key)?;
            let built = Registry::upgrade(&registry, &key)?.autobuild::<C>()?;
            Ok(ServiceInstance::new(upcast(Arc::new(built))))
        });

        tracing::debug!(proxy = %description, "Created autobuild proxy");
        Ok(T::create_proxy(Delegate::new(Arc::new(source))))
    }

    /// Values contributed to the service, modules in registration order
    pub fn unordered_configuration<V: Send + 'static>(
        &self,
        service_id: &str,
    ) -> Result<Vec<V>, RegistryError> {
        let mut collector = UnorderedCollector::<V>::new(service_id);
        self.for_each_contribution(service_id, |resources, contribution| {
            let ContributeFn::Unordered(contribute) = &contribution.contribute else {
                return Err(kind_mismatch(resources, contribution, ConfigurationKind::Unordered));
            };
            let mut values = Vec::new();
            contribute(resources, &mut values)
                .map_err(|cause| contribution_failed(resources, contribution, cause))?;
            collector.accept(&contribution.location, values)
        })?;
        Ok(collector.finish())
    }

    /// Values contributed to the service, ordered by their constraints
    pub fn ordered_configuration<V: Send + 'static>(
        &self,
        service_id: &str,
    ) -> Result<Vec<V>, RegistryError> {
        let mut collector = OrderedCollector::<V>::new(service_id);
        self.for_each_contribution(service_id, |resources, contribution| {
            let ContributeFn::Ordered(contribute) = &contribution.contribute else {
                return Err(kind_mismatch(resources, contribution, ConfigurationKind::Ordered));
            };
            let mut entries = Vec::new();
            contribute(resources, &mut entries)
                .map_err(|cause| contribution_failed(resources, contribution, cause))?;
            collector.accept(&contribution.location, entries)
        })?;
        Ok(collector.finish()?)
    }

    /// Key/value pairs contributed to the service, textual keys are case-insensitive
    pub fn mapped_configuration<K: MapKey, V: Send + 'static>(
        &self,
        service_id: &str,
    ) -> Result<ConfigMap<K, V>, RegistryError> {
        let mut collector = MappedCollector::<K, V>::new(service_id);
        self.for_each_contribution(service_id, |resources, contribution| {
            let ContributeFn::Mapped(contribute) = &contribution.contribute else {
                return Err(kind_mismatch(resources, contribution, ConfigurationKind::Mapped));
            };
            let mut entries = Vec::new();
            contribute(resources, &mut entries)
                .map_err(|cause| contribution_failed(resources, contribution, cause))?;
            collector.accept(&contribution.location, entries)
        })?;
        Ok(collector.finish()?)
    }

    /// Runs every contribution to `service_id` with the resources of its module
    fn for_each_contribution(
        &self,
        service_id: &str,
        mut accept: impl FnMut(&ServiceResources<'_>, &ContributionDef) -> Result<(), ConfigurationError>,
    ) -> Result<(), RegistryError> {
        self.check_active()?;
        let target = service_id.to_lowercase();
        let key = self
            .0
            .index
            .get(&target)
            .copied()
            .ok_or_else(|| RegistryError::UnknownService {
                service_id: service_id.to_string(),
                known: self.service_ids(),
            })?;
        // Builtins can not be contributed to, see RegistryBuilder::build
        let ServiceKey::Module { module, service } = key else {
            return Ok(());
        };
        let def = self.0.modules[module].service_def(service);

        let contributions = self.0.contributions.get(&target).into_iter().flatten();
        for &(contributor, index) in contributions {
            let contribution = &self.0.modules[contributor].def.contributions[index];
            let resources = ServiceResources::new(self, contributor, def);
            self.tracker()
                .invoke(format!("Invoking {}", contribution.location), || {
                    accept(&resources, contribution)
                })?;
        }
        Ok(())
    }

    /// Builds the eager loaded services, then runs the startup hooks
    ///
    /// All eager services are gathered before any of them is built. Fails with
    /// [RegistryError::AlreadyStarted] when called twice, and with [RegistryError::Locked] when
    /// the registry was shut down before startup finished.
    pub fn perform_registry_startup(&self) -> Result<(), RegistryError> {
        self.check_active()?;
        self.0
            .startup_lock
            .lock()
            .map_err(|_| RegistryError::AlreadyStarted)?;

        let eager: Vec<(usize, usize)> = self
            .0
            .modules
            .iter()
            .enumerate()
            .flat_map(|(index, module)| {
                (0..module.service_count())
                    .filter(move |service| module.service_def(*service).eager_load)
                    .map(move |service| (index, service))
            })
            .collect();
        tracing::debug!(services = eager.len(), "Loading eager services");

        for (module, service) in eager {
            self.eager_load(module, service)?;
        }

        let startup = self.service::<RegistryStartup>(REGISTRY_STARTUP)?;
        startup.run(self)?;

        {
            // A hook, or another thread, may have shut the registry down meanwhile
            let mut state = self.0.state.lock();
            match *state {
                RegistryState::Constructing => *state = RegistryState::Started,
                RegistryState::Started => {}
                RegistryState::ShuttingDown | RegistryState::ShutDown => {
                    return Err(LockedError("the registry").into())
                }
            }
        }
        self.cleanup_thread();
        tracing::info!("Registry started");
        Ok(())
    }

    /// Discards the per-thread services of the calling thread
    pub fn cleanup_thread(&self) {
        self.0.perthread.cleanup();
    }

    pub fn add_shutdown_listener(
        &self,
        listener: impl FnOnce() -> Result<(), DynError> + Send + 'static,
    ) -> Result<(), RegistryError> {
        Ok(self.0.shutdown_hub.add_listener(listener)?)
    }

    /// Notifies all shutdown listeners, after which lookups fail
    ///
    /// Listeners may still use services. Fails if the registry was already shut down.
    pub fn shutdown(&self) -> Result<(), RegistryError> {
        self.0.lock.lock()?;
        *self.0.state.lock() = RegistryState::ShuttingDown;
        tracing::debug!("Shutting down registry");

        self.0.shutdown_hub.fire_shutdown()?;
        self.cleanup_thread();

        *self.0.state.lock() = RegistryState::ShutDown;
        tracing::info!("Registry shut down");
        Ok(())
    }

    pub fn state(&self) -> RegistryState {
        *self.0.state.lock()
    }

    /// All service ids, including builtins, sorted
    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .0
            .index
            .values()
            .map(|key| self.key_service_id(*key).to_string())
            .collect();
        ids.sort_by_key(|id| id.to_lowercase());
        ids
    }

    pub fn scoreboard(&self) -> &ServiceActivityScoreboard {
        &self.0.scoreboard
    }

    pub(crate) fn tracker(&self) -> &OperationTracker {
        &self.0.tracker
    }

    pub(crate) fn logger_source(&self) -> &LoggerSource {
        &self.0.logger_source
    }

    pub(crate) fn module_name(&self, module: usize) -> &str {
        self.0.modules[module].name()
    }

    /// Lifecycle of a service's scope, scopes are validated when the registry is built
    pub(crate) fn lifecycle(
        &self,
        def: &ServiceDef,
    ) -> Result<&Arc<dyn ServiceLifecycle>, RegistryError> {
        self.0
            .lifecycles
            .get(&def.scope.to_lowercase())
            .ok_or_else(|| {
                let mut known: Vec<String> = self.0.lifecycles.keys().cloned().collect();
                known.sort();
                RegistryError::UnknownScope {
                    service_id: def.service_id.clone(),
                    scope: def.scope.clone(),
                    known,
                }
            })
    }

    /// Registries are held weakly by proxies and slots, which must not keep them alive
    pub(crate) fn upgrade(
        registry: &Weak<RegistryInner>,
        what: &str,
    ) -> Result<Registry, RegistryError> {
        registry
            .upgrade()
            .map(Registry)
            .ok_or_else(|| RegistryError::RegistryDropped(what.to_string()))
    }

    fn check_active(&self) -> Result<(), RegistryError> {
        match *self.0.state.lock() {
            RegistryState::ShutDown => Err(LockedError("the registry").into()),
            _ => Ok(()),
        }
    }

    fn services_implementing(&self, contract: TypeInfo) -> Vec<ServiceKey> {
        self.0
            .contracts
            .get(&contract.type_id)
            .cloned()
            .unwrap_or_default()
    }

    fn key_service_id(&self, key: ServiceKey) -> &str {
        match key {
            ServiceKey::Builtin(index) => &self.0.builtins[index].service_id,
            ServiceKey::Module { module, service } => {
                &self.0.modules[module].service_def(service).service_id
            }
        }
    }

    fn key_contract(&self, key: ServiceKey) -> TypeInfo {
        match key {
            ServiceKey::Builtin(index) => self.0.builtins[index].instance.info,
            ServiceKey::Module { module, service } => {
                self.0.modules[module].service_def(service).contract
            }
        }
    }

    fn sorted_ids(&self, keys: &[ServiceKey]) -> Vec<String> {
        let mut ids: Vec<String> = keys
            .iter()
            .map(|key| self.key_service_id(*key).to_string())
            .collect();
        ids.sort_by_key(|id| id.to_lowercase());
        ids
    }

    /// The contract is checked before anything is built
    fn typed_instance<T: Injectable + ?Sized>(&self, key: ServiceKey) -> Result<Arc<T>, RegistryError> {
        let requested = TypeInfo::of::<T>();
        let contract = self.key_contract(key);
        let mismatch = |actual: &'static str| match key {
            ServiceKey::Builtin(_) => RegistryError::BuiltinTypeMismatch {
                service_id: self.key_service_id(key).to_string(),
                requested: requested.type_name,
                actual,
            },
            ServiceKey::Module { .. } => RegistryError::ServiceTypeMismatch {
                service_id: self.key_service_id(key).to_string(),
                requested: requested.type_name,
                actual,
            },
        };
        if contract != requested {
            return Err(mismatch(contract.type_name));
        }

        let instance = match key {
            ServiceKey::Builtin(index) => self.0.builtins[index].instance.clone(),
            ServiceKey::Module { module, service } => self.module_service(module, service)?,
        };
        instance.downcast::<T>().map_err(mismatch)
    }
}

fn kind_mismatch(
    resources: &ServiceResources<'_>,
    contribution: &ContributionDef,
    requested: ConfigurationKind,
) -> ConfigurationError {
    ConfigurationError::KindMismatch {
        service_id: resources.service_id().to_string(),
        location: contribution.location.clone(),
        contributed: contribution.contribute.kind(),
        requested,
    }
}

fn contribution_failed(
    resources: &ServiceResources<'_>,
    contribution: &ContributionDef,
    cause: DynError,
) -> ConfigurationError {
    ConfigurationError::ContributionFailed {
        service_id: resources.service_id().to_string(),
        location: contribution.location.clone(),
        cause: Arc::new(cause),
    }
}
