//! Services every registry defines, registered ahead of all other modules.

use std::sync::Arc;

use crate::{
    def::ModuleDef,
    object_provider::{MasterObjectProvider, ObjectProvider},
    resources::ServiceResources,
    service_def::ServiceDef,
    startup::{RegistryStartup, StartupHook},
    types::DynError,
};

pub const IOC_MODULE: &str = "wrapp_ioc::ioc";

pub const REGISTRY_STARTUP: &str = "RegistryStartup";
pub const MASTER_OBJECT_PROVIDER: &str = "MasterObjectProvider";

pub(crate) fn ioc_module() -> ModuleDef {
    ModuleDef::builder(IOC_MODULE)
        .service(ServiceDef::builder::<RegistryStartup, _>(
            REGISTRY_STARTUP,
            |resources: &ServiceResources<'_>| -> Result<Arc<RegistryStartup>, DynError> {
                let hooks = resources.ordered_configuration::<StartupHook>()?;
                Ok(Arc::new(RegistryStartup::new(hooks)))
            },
        ))
        .service(ServiceDef::builder::<MasterObjectProvider, _>(
            MASTER_OBJECT_PROVIDER,
            |resources: &ServiceResources<'_>| -> Result<Arc<MasterObjectProvider>, DynError> {
                let providers = resources.ordered_configuration::<Arc<dyn ObjectProvider>>()?;
                Ok(Arc::new(MasterObjectProvider::new(providers)))
            },
        ))
        .build()
}
