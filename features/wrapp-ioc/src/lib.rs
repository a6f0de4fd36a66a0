//! A service registry built from modules.
//!
//! Modules define services under unique, case-insensitive ids. A service is built by its
//! factory the first time somebody asks for it, its scope decides whether that instance is
//! shared or rebuilt. On top of that modules can
//! - decorate services of other modules ([decorator::DecoratorDef])
//! - advise methods of advisable services ([advice::AdvisorDef])
//! - contribute configuration to services ([contribution::ContributionDef])
//! - hook into registry startup ([def::ModuleDefBuilder::startup])
//!
//! ```
//! use std::sync::Arc;
//! use wrapp_ioc::{DynError, ModuleDef, Registry, ServiceDef, ServiceResources};
//!
//! let module = ModuleDef::builder("greetings")
//!     .service(ServiceDef::builder::<String, _>(
//!         "Greeting",
//!         |_: &ServiceResources<'_>| -> Result<Arc<String>, DynError> {
//!             Ok(Arc::new("hello".to_string()))
//!         },
//!     ))
//!     .build();
//!
//! let registry = Registry::builder().add_module(module).build().unwrap();
//! assert_eq!(*registry.service::<String>("greeting").unwrap(), "hello");
//! ```

pub mod activity;
pub mod advice;
pub mod autobuild;
pub mod configuration;
pub mod contribution;
pub mod decorator;
pub mod def;
pub mod errors;
pub mod factories;
pub mod id_matcher;
pub mod ioc_module;
pub mod jit;
pub mod lifecycle;
pub mod lock;
pub mod logger;
pub mod markers;
mod module;
pub mod object_provider;
pub mod orderer;
pub mod perthread;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod resources;
pub mod service_def;
pub mod shutdown;
pub mod startup;
pub mod tracker;
pub mod types;

pub use autobuild::{Autobuild, Constructor};
pub use def::{ModuleDef, ModuleDefBuilder};
pub use errors::{ConfigurationError, LockedError, RegistryError};
pub use registry::{Registry, RegistryBuilder, RegistryState};
pub use resolver::{Injector, Lazy, Marked, Resolver};
pub use resources::ServiceResources;
pub use service_def::ServiceDef;
pub use types::{DynError, Injectable, TypeInfo};
