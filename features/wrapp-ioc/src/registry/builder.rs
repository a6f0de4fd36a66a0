use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{
    activity::{ServiceActivity, ServiceActivityScoreboard, ServiceStatus},
    def::ModuleDef,
    errors::RegistryError,
    ioc_module::ioc_module,
    lifecycle::{PerThreadLifecycle, ServiceLifecycle, SingletonLifecycle},
    lock::OneShotLock,
    logger::LoggerSource,
    markers::Builtin,
    module::Module,
    perthread::PerThreadManager,
    registry::{BuiltinService, Registry, RegistryInner, RegistryState, ServiceKey},
    service_def::{SCOPE_DEFAULT, SCOPE_PERTHREAD, SCOPE_SINGLETON},
    shutdown::RegistryShutdownHub,
    tracker::OperationTracker,
    types::{Injectable, ServiceInstance, TypeInfo},
};

pub const SHUTDOWN_HUB: &str = "RegistryShutdownHub";
pub const PERTHREAD_MANAGER: &str = "PerthreadManager";
pub const LOGGER_SOURCE: &str = "LoggerSource";
pub const ACTIVITY_SCOREBOARD: &str = "ServiceActivityScoreboard";
pub const OPERATION_TRACKER: &str = "OperationTracker";

const BUILTIN_LOCATION: &str = "the builtin services";

/// Collects modules, builtin instances and lifecycles, then freezes them into a [Registry]
pub struct RegistryBuilder {
    modules: Vec<ModuleDef>,
    instances: Vec<BuiltinService>,
    lifecycles: HashMap<String, Arc<dyn ServiceLifecycle>>,
    perthread: Arc<PerThreadManager>,
}
impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        let perthread = Arc::new(PerThreadManager::new());
        let singleton: Arc<dyn ServiceLifecycle> = Arc::new(SingletonLifecycle);
        let lifecycles = HashMap::from([
            (SCOPE_SINGLETON.to_string(), Arc::clone(&singleton)),
            (SCOPE_DEFAULT.to_string(), singleton),
            (
                SCOPE_PERTHREAD.to_string(),
                Arc::new(PerThreadLifecycle::new(Arc::clone(&perthread))) as Arc<dyn ServiceLifecycle>,
            ),
        ]);

        RegistryBuilder {
            modules: Vec::new(),
            instances: Vec::new(),
            lifecycles,
            perthread,
        }
    }

    /// Modules are walked in the order they are added
    pub fn add_module(mut self, module: ModuleDef) -> Self {
        self.modules.push(module);
        self
    }

    /// Registers an existing instance as a builtin service
    pub fn add_instance<T: Injectable + ?Sized>(mut self, service_id: &str, instance: Arc<T>) -> Self {
        self.instances.push(BuiltinService {
            service_id: service_id.to_string(),
            instance: ServiceInstance::new(instance),
        });
        self
    }

    /// Makes `scope` usable by services, scope names are case-insensitive
    pub fn add_lifecycle(
        mut self,
        scope: &str,
        lifecycle: Arc<dyn ServiceLifecycle>,
    ) -> Result<Self, RegistryError> {
        match self.lifecycles.entry(scope.to_lowercase()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateScope {
                scope: scope.to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(lifecycle);
                Ok(self)
            }
        }
    }

    /// The manager backing the perthread scope, for lifecycles which need it too
    pub fn perthread_manager(&self) -> Arc<PerThreadManager> {
        Arc::clone(&self.perthread)
    }

    /// Indexes every service and contribution
    ///
    /// Fails on duplicate service ids, unknown scopes and contributions to services which do
    /// not exist. No service is built here.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let RegistryBuilder {
            modules,
            instances,
            lifecycles,
            perthread,
        } = self;

        let mut defs = Vec::with_capacity(modules.len() + 1);
        defs.push(ioc_module());
        defs.extend(modules);

        let shutdown_hub = Arc::new(RegistryShutdownHub::new());
        let logger_source = Arc::new(LoggerSource::new());
        let scoreboard = Arc::new(ServiceActivityScoreboard::new());
        let tracker = Arc::new(OperationTracker::new());

        let mut builtins = vec![
            builtin(SHUTDOWN_HUB, Arc::clone(&shutdown_hub)),
            builtin(PERTHREAD_MANAGER, Arc::clone(&perthread)),
            builtin(LOGGER_SOURCE, Arc::clone(&logger_source)),
            builtin(ACTIVITY_SCOREBOARD, Arc::clone(&scoreboard)),
            builtin(OPERATION_TRACKER, Arc::clone(&tracker)),
        ];
        builtins.extend(instances);

        let mut index = Index::default();
        for (position, service) in builtins.iter().enumerate() {
            index.register(
                &service.service_id,
                ServiceKey::Builtin(position),
                service.instance.info,
                &[TypeInfo::of::<Builtin>()],
                BUILTIN_LOCATION,
            )?;
        }

        for (module, def) in defs.iter().enumerate() {
            let location = format!("module '{}'", def.name);
            tracing::debug!(module = %def.name, services = def.services.len(), "Indexing module");
            for (service, service_def) in def.services.iter().enumerate() {
                if !lifecycles.contains_key(&service_def.scope.to_lowercase()) {
                    let mut known: Vec<String> = lifecycles.keys().cloned().collect();
                    known.sort();
                    return Err(RegistryError::UnknownScope {
                        service_id: service_def.service_id.clone(),
                        scope: service_def.scope.clone(),
                        known,
                    });
                }
                index.register(
                    &service_def.service_id,
                    ServiceKey::Module { module, service },
                    service_def.contract,
                    &service_def.markers,
                    &location,
                )?;
            }
        }

        let mut contributions: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
        for (module, def) in defs.iter().enumerate() {
            for (position, contribution) in def.contributions.iter().enumerate() {
                let target = contribution.target.to_lowercase();
                match index.services.get(&target) {
                    Some(ServiceKey::Module { .. }) => {
                        contributions.entry(target).or_default().push((module, position))
                    }
                    _ => {
                        return Err(RegistryError::ContributionToUnknownService {
                            service_id: contribution.target.clone(),
                            location: contribution.location.clone(),
                        })
                    }
                }
            }
        }

        for service in &builtins {
            scoreboard.define(ServiceActivity {
                service_id: service.service_id.clone(),
                contract: service.instance.info.type_name,
                scope: SCOPE_SINGLETON.to_string(),
                markers: vec![std::any::type_name::<Builtin>()],
                status: ServiceStatus::Builtin,
            });
        }
        for def in defs.iter().flat_map(|def| def.services.iter()) {
            scoreboard.define(ServiceActivity {
                service_id: def.service_id.clone(),
                contract: def.contract.type_name,
                scope: def.scope.clone(),
                markers: def.markers.iter().map(|m| m.type_name).collect(),
                status: ServiceStatus::Defined,
            });
        }

        let board = Arc::clone(&scoreboard);
        shutdown_hub.add_listener(move || {
            board.shutdown();
            Ok(())
        })?;

        let module_count = defs.len();
        let inner = Arc::new_cyclic(|registry| RegistryInner {
            modules: defs
                .into_iter()
                .enumerate()
                .map(|(position, def)| Module::new(position, def, registry))
                .collect(),
            builtins,
            index: index.services,
            contracts: index.contracts,
            markers: index.markers,
            contributions,
            lifecycles,
            perthread,
            shutdown_hub,
            scoreboard,
            tracker,
            logger_source,
            lock: OneShotLock::new("the registry"),
            startup_lock: OneShotLock::new("the registry startup"),
            state: Mutex::new(RegistryState::Constructing),
        });

        tracing::debug!(
            modules = module_count,
            services = inner.index.len(),
            "Registry built"
        );
        Ok(Registry(inner))
    }
}

fn builtin<T: Injectable>(service_id: &str, instance: Arc<T>) -> BuiltinService {
    BuiltinService {
        service_id: service_id.to_string(),
        instance: ServiceInstance::new(instance),
    }
}

#[derive(Default)]
struct Index {
    services: HashMap<String, ServiceKey>,
    locations: HashMap<String, String>,
    contracts: HashMap<std::any::TypeId, Vec<ServiceKey>>,
    markers: HashMap<std::any::TypeId, Vec<ServiceKey>>,
}
impl Index {
    fn register(
        &mut self,
        service_id: &str,
        key: ServiceKey,
        contract: TypeInfo,
        markers: &[TypeInfo],
        location: &str,
    ) -> Result<(), RegistryError> {
        let folded = service_id.to_lowercase();
        if let Some(first) = self.locations.get(&folded) {
            return Err(RegistryError::DuplicateService {
                service_id: service_id.to_string(),
                first: first.clone(),
                second: location.to_string(),
            });
        }

        self.locations.insert(folded.clone(), location.to_string());
        self.services.insert(folded, key);
        self.contracts.entry(contract.type_id).or_default().push(key);
        for marker in markers {
            self.markers.entry(marker.type_id).or_default().push(key);
        }
        Ok(())
    }
}
