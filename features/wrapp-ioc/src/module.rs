//! Runtime side of a module: caches its services and builds them on demand.

use std::sync::{Arc, Weak};

use crate::{
    activity::ServiceStatus,
    advice::{AdvisorDef, MethodAdviceReceiver},
    decorator::DecoratorDef,
    def::ModuleDef,
    errors::{ConfigurationError, RegistryError},
    jit::{construction, JustInTime},
    orderer::Orderer,
    proxy::InstanceSource,
    registry::{Registry, RegistryInner},
    resources::ServiceResources,
    service_def::ServiceDef,
    types::ServiceInstance,
};

/// What a module hands out for one of its services
#[derive(Clone)]
pub(crate) struct SlotValue {
    pub(crate) instance: ServiceInstance,
    /// Source of the real instance, if `instance` is a proxy
    pub(crate) source: Option<Arc<dyn InstanceSource>>,
}

pub(crate) struct Module {
    pub(crate) def: ModuleDef,
    slots: Vec<JustInTime<SlotValue>>,
}

impl Module {
    pub(crate) fn new(index: usize, def: ModuleDef, registry: &Weak<RegistryInner>) -> Self {
        let slots = def
            .services
            .iter()
            .enumerate()
            .map(|(service, service_def)| {
                let registry = registry.clone();
                let service_id = service_def.service_id.clone();
                JustInTime::new(&service_def.service_id, move || {
                    Registry::upgrade(&registry, &service_id)?.materialize(index, service)
                })
            })
            .collect();

        Module { def, slots }
    }

    pub(crate) fn name(&self) -> &str {
        &self.def.name
    }

    pub(crate) fn service_def(&self, service: usize) -> &ServiceDef {
        &self.def.services[service]
    }

    pub(crate) fn service_count(&self) -> usize {
        self.def.services.len()
    }

    pub(crate) fn slot(&self, service: usize) -> &JustInTime<SlotValue> {
        &self.slots[service]
    }
}

/// Resolves the current thread's instance of a non-singleton service on every call
struct LifecycleSource {
    registry: Weak<RegistryInner>,
    module: usize,
    service: usize,
    description: String,
}
impl InstanceSource for LifecycleSource {
    fn instance(&self) -> Result<ServiceInstance, RegistryError> {
        Registry::upgrade(&self.registry, &self.description)?.realize(self.module, self.service)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl Registry {
    /// Instance of a module service, the proxy if it has one
    pub(crate) fn module_service(
        &self,
        module: usize,
        service: usize,
    ) -> Result<ServiceInstance, RegistryError> {
        let runtime = &self.0.modules[module];
        let def = runtime.service_def(service);
        let lifecycle = self.lifecycle(def)?;

        match lifecycle.is_singleton() || def.proxy.is_some() {
            true => Ok(runtime.slot(service).force()?.instance.clone()),
            false => self.realize(module, service),
        }
    }

    /// Builds the real instance behind an eager loaded service
    pub(crate) fn eager_load(&self, module: usize, service: usize) -> Result<(), RegistryError> {
        let runtime = &self.0.modules[module];
        let def = runtime.service_def(service);
        if !self.lifecycle(def)?.is_singleton() && def.proxy.is_none() {
            // Slots of such services are never read, the instance belongs to the lifecycle
            self.realize(module, service)?;
            return Ok(());
        }
        let value = runtime.slot(service).force()?;
        if let Some(source) = &value.source {
            source.instance()?;
        }
        Ok(())
    }

    /// Creates what the slot of a service caches: the proxy, or the real singleton instance
    pub(crate) fn materialize(
        &self,
        module: usize,
        service: usize,
    ) -> Result<SlotValue, RegistryError> {
        let def = self.0.modules[module].service_def(service);
        let lifecycle = self.lifecycle(def)?;

        let Some(proxy) = &def.proxy else {
            return Ok(SlotValue {
                instance: self.realize(module, service)?,
                source: None,
            });
        };

        let service_id = def.service_id.clone();
        let registry = Arc::downgrade(&self.0);
        let source: Arc<dyn InstanceSource> = match lifecycle.is_singleton() {
            true => Arc::new(JustInTime::new(&def.service_id, move || {
                Registry::upgrade(&registry, &service_id)?.realize(module, service)
            })),
            false => Arc::new(LifecycleSource {
                registry,
                module,
                service,
                description: service_id,
            }),
        };

        tracing::debug!(service = %def.service_id, "Created service proxy");
        self.0
            .scoreboard
            .set_status(&def.service_id, ServiceStatus::Virtual);
        Ok(SlotValue {
            instance: proxy(Arc::clone(&source)),
            source: Some(source),
        })
    }

    /// Real instance for the current call, as decided by the service's lifecycle
    pub(crate) fn realize(
        &self,
        module: usize,
        service: usize,
    ) -> Result<ServiceInstance, RegistryError> {
        let def = self.0.modules[module].service_def(service);
        let lifecycle = self.lifecycle(def)?;
        let resources = ServiceResources::new(self, module, def);
        lifecycle.create_service(&resources, &|| self.create_service(module, service))
    }

    /// Builds, advises and decorates a new instance
    fn create_service(
        &self,
        module: usize,
        service: usize,
    ) -> Result<ServiceInstance, RegistryError> {
        let def = self.0.modules[module].service_def(service);
        let _building = construction::enter(&def.service_id)?;

        self.tracker()
            .invoke(format!("Realizing service '{}'", def.service_id), || {
                let resources = ServiceResources::new(self, module, def);
                let span = resources.logger();
                let _entered = span.enter();
                tracing::debug!(scope = %def.scope, "Building service");

                let instance = def
                    .factory
                    .create(&resources)
                    .map_err(|cause| RegistryError::construction(&def.service_id, cause))?;
                let instance = self.advise(def, instance)?;
                let instance = self.decorate(def, instance)?;

                self.0
                    .scoreboard
                    .set_status(&def.service_id, ServiceStatus::Real);
                Ok(instance)
            })
    }

    fn advise(
        &self,
        def: &ServiceDef,
        instance: ServiceInstance,
    ) -> Result<ServiceInstance, RegistryError> {
        let advisors = self.find_advisors_for_service(def)?;
        let Some((_, first)) = advisors.first() else {
            return Ok(instance);
        };
        let Some(advisable) = &def.advisable else {
            return Err(RegistryError::NotAdvisable {
                advisor_id: first.advisor_id.clone(),
                service_id: def.service_id.clone(),
            });
        };

        let mut receiver = MethodAdviceReceiver::new(&def.service_id, (advisable.methods)());
        for (module, advisor) in advisors {
            let resources = ServiceResources::new(self, module, def);
            self.tracker().invoke(
                format!(
                    "Invoking advisor '{}' for service '{}'",
                    advisor.advisor_id, def.service_id
                ),
                || {
                    (advisor.advise)(&mut receiver, &resources).map_err(|cause| {
                        RegistryError::AdvisorFailed {
                            advisor_id: advisor.advisor_id.clone(),
                            service_id: def.service_id.clone(),
                            cause: Arc::new(cause),
                        }
                    })
                },
            )?;
        }

        let table = receiver.into_table();
        if table.is_empty() {
            return Ok(instance);
        }
        (advisable.create)(instance, Arc::new(table)).map_err(|actual| {
            RegistryError::ServiceTypeMismatch {
                service_id: def.service_id.clone(),
                requested: def.contract.type_name,
                actual,
            }
        })
    }

    fn decorate(
        &self,
        def: &ServiceDef,
        instance: ServiceInstance,
    ) -> Result<ServiceInstance, RegistryError> {
        let decorators = self.find_decorators_for_service(def)?;
        if let Some((_, decorator)) = decorators
            .iter()
            .find(|(_, decorator)| decorator.contract != def.contract)
        {
            return Err(RegistryError::DecoratorTypeMismatch {
                decorator_id: decorator.decorator_id.clone(),
                service_id: def.service_id.clone(),
                decorator_type: decorator.contract.type_name,
                contract: def.contract.type_name,
            });
        }

        // The first decorator is the outermost, so it has to wrap last
        let mut instance = instance;
        for (module, decorator) in decorators.into_iter().rev() {
            let resources = ServiceResources::new(self, module, def);
            let decorated = self.tracker().invoke(
                format!(
                    "Invoking decorator '{}' for service '{}'",
                    decorator.decorator_id, def.service_id
                ),
                || {
                    (decorator.decorate)(&resources, instance.clone()).map_err(|cause| {
                        RegistryError::DecoratorFailed {
                            decorator_id: decorator.decorator_id.clone(),
                            service_id: def.service_id.clone(),
                            cause: Arc::new(cause),
                        }
                    })
                },
            )?;
            if let Some(decorated) = decorated {
                instance = decorated;
            }
        }
        Ok(instance)
    }

    /// Decorators of every module matching the service, in application order
    pub(crate) fn find_decorators_for_service(
        &self,
        def: &ServiceDef,
    ) -> Result<Vec<(usize, &DecoratorDef)>, RegistryError> {
        let mut orderer = Orderer::new(format!("decorators of service '{}'", def.service_id));
        for (index, module) in self.0.modules.iter().enumerate() {
            for decorator in module.def.decorators.iter().filter(|d| d.matches(&def.service_id)) {
                let constraints: Vec<&str> =
                    decorator.constraints.iter().map(String::as_str).collect();
                orderer
                    .add(&decorator.decorator_id, (index, decorator), &constraints)
                    .map_err(ConfigurationError::from)?;
            }
        }
        Ok(orderer.get_ordered().into_values())
    }

    /// Advisors of every module matching the service, outermost first
    pub(crate) fn find_advisors_for_service(
        &self,
        def: &ServiceDef,
    ) -> Result<Vec<(usize, &AdvisorDef)>, RegistryError> {
        let mut orderer = Orderer::new(format!("advisors of service '{}'", def.service_id));
        for (index, module) in self.0.modules.iter().enumerate() {
            for advisor in module
                .def
                .advisors
                .iter()
                .filter(|a| a.matcher.matches(&def.service_id))
            {
                let constraints: Vec<&str> =
                    advisor.constraints.iter().map(String::as_str).collect();
                orderer
                    .add(&advisor.advisor_id, (index, advisor), &constraints)
                    .map_err(ConfigurationError::from)?;
            }
        }
        Ok(orderer.get_ordered().into_values())
    }
}
