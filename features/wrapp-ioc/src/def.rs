//! Static description of a module: the services it defines, the decorators and advisors it
//! applies and the configuration it contributes.

use std::{fmt::Debug, sync::Arc};

use crate::{
    advice::AdvisorDef,
    configuration::{MapKey, MappedConfiguration, OrderedConfiguration, UnorderedConfiguration},
    contribution::ContributionDef,
    decorator::DecoratorDef,
    ioc_module::{MASTER_OBJECT_PROVIDER, REGISTRY_STARTUP},
    object_provider::ObjectProvider,
    registry::Registry,
    resources::ServiceResources,
    service_def::ServiceDef,
    startup::StartupHook,
    types::DynError,
};

/// Immutable definition of a module
pub struct ModuleDef {
    pub(crate) name: String,
    pub(crate) services: Vec<Arc<ServiceDef>>,
    pub(crate) decorators: Vec<DecoratorDef>,
    pub(crate) advisors: Vec<AdvisorDef>,
    pub(crate) contributions: Vec<ContributionDef>,
}
impl Debug for ModuleDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDef")
            .field("name", &self.name)
            .field("services", &self.service_ids().collect::<Vec<_>>())
            .field("decorators", &self.decorators.len())
            .field("advisors", &self.advisors.len())
            .field("contributions", &self.contributions.len())
            .finish()
    }
}

impl ModuleDef {
    pub fn builder(name: &str) -> ModuleDefBuilder {
        ModuleDefBuilder {
            def: ModuleDef {
                name: name.to_string(),
                services: Vec::new(),
                decorators: Vec::new(),
                advisors: Vec::new(),
                contributions: Vec::new(),
            },
        }
    }

    /// Name of the module, also used as its logger name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|def| def.service_id.as_str())
    }

    pub fn service(&self, service_id: &str) -> Option<&ServiceDef> {
        self.services
            .iter()
            .find(|def| def.service_id.eq_ignore_ascii_case(service_id))
            .map(Arc::as_ref)
    }

    pub fn decorators(&self) -> &[DecoratorDef] {
        &self.decorators
    }

    pub fn advisors(&self) -> &[AdvisorDef] {
        &self.advisors
    }

    pub fn contributions(&self) -> &[ContributionDef] {
        &self.contributions
    }
}

pub struct ModuleDefBuilder {
    def: ModuleDef,
}
impl ModuleDefBuilder {
    pub fn service(mut self, service: impl Into<ServiceDef>) -> Self {
        self.def.services.push(Arc::new(service.into()));
        self
    }

    pub fn decorate(mut self, decorator: DecoratorDef) -> Self {
        self.def.decorators.push(decorator);
        self
    }

    pub fn advise(mut self, advisor: AdvisorDef) -> Self {
        self.def.advisors.push(advisor);
        self
    }

    /// Contributions run in the order they are added
    pub fn contribute(mut self, mut contribution: ContributionDef) -> Self {
        contribution.locate(&self.def.name, self.def.contributions.len() + 1);
        self.def.contributions.push(contribution);
        self
    }

    pub fn contribute_unordered<V, F>(self, target: &str, contribute: F) -> Self
    where
        V: Send + 'static,
        F: Fn(&ServiceResources<'_>, &mut UnorderedConfiguration<'_, V>) -> Result<(), DynError>
            + Send
            + Sync
            + 'static,
    {
        self.contribute(ContributionDef::unordered(target, contribute))
    }

    pub fn contribute_ordered<V, F>(self, target: &str, contribute: F) -> Self
    where
        V: Send + 'static,
        F: Fn(&ServiceResources<'_>, &mut OrderedConfiguration<'_, V>) -> Result<(), DynError>
            + Send
            + Sync
            + 'static,
    {
        self.contribute(ContributionDef::ordered(target, contribute))
    }

    pub fn contribute_mapped<K, V, F>(self, target: &str, contribute: F) -> Self
    where
        K: MapKey,
        V: Send + 'static,
        F: Fn(&ServiceResources<'_>, &mut MappedConfiguration<'_, K, V>) -> Result<(), DynError>
            + Send
            + Sync
            + 'static,
    {
        self.contribute(ContributionDef::mapped(target, contribute))
    }

    /// Runs `hook` during [Registry::perform_registry_startup], after eager services are built
    pub fn startup<F>(self, id: &str, constraints: &[&str], hook: F) -> Self
    where
        F: Fn(&Registry) -> Result<(), DynError> + Send + Sync + 'static,
    {
        let hook = StartupHook::new(id, hook);
        let label = format!("startup hook '{id}'");
        let id = id.to_string();
        let constraints: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
        self.contribute(
            ContributionDef::ordered(
                REGISTRY_STARTUP,
                move |_: &ServiceResources<'_>,
                      configuration: &mut OrderedConfiguration<'_, StartupHook>|
                      -> Result<(), DynError> {
                    let constraints: Vec<&str> = constraints.iter().map(String::as_str).collect();
                    configuration.add(&id, hook.clone(), &constraints);
                    Ok(())
                },
            )
            .labelled(&label),
        )
    }

    /// Adds an [ObjectProvider] consulted by marker-less object lookups
    pub fn object_provider(
        self,
        id: &str,
        constraints: &[&str],
        provider: impl ObjectProvider + 'static,
    ) -> Self {
        let provider: Arc<dyn ObjectProvider> = Arc::new(provider);
        let label = format!("object provider '{id}'");
        let id = id.to_string();
        let constraints: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
        self.contribute(
            ContributionDef::ordered(
                MASTER_OBJECT_PROVIDER,
                move |_: &ServiceResources<'_>,
                      configuration: &mut OrderedConfiguration<'_, Arc<dyn ObjectProvider>>|
                      -> Result<(), DynError> {
                    let constraints: Vec<&str> = constraints.iter().map(String::as_str).collect();
                    configuration.add(&id, Arc::clone(&provider), &constraints);
                    Ok(())
                },
            )
            .labelled(&label),
        )
    }

    pub fn build(self) -> ModuleDef {
        self.def
    }
}
