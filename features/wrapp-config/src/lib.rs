//! Type-keyed application configs, injectable into autobuilt services.
//!
//! Two parts:
//! 1. [provider::ConfigProvider]: holds one config per type and registers itself with the
//!    service registry as the builtin service `"ConfigProvider"`
//! 2. [config::Config]: constructor parameter resolving a config from the provider
//!
//! # Examples
//!
//! ```rust
//! use wrapp_config::provider::{ConfigProvider, CONFIG_PROVIDER};
//! use wrapp_ioc::Registry;
//!
//! struct AppConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! let mut configs = ConfigProvider::new();
//! configs
//!     .add_config(AppConfig {
//!         host: "localhost".to_string(),
//!         port: 8080_u16,
//!     })
//!     .unwrap();
//!
//! let registry = configs.register(Registry::builder()).build().unwrap();
//! let provider = registry.service::<ConfigProvider>(CONFIG_PROVIDER).unwrap();
//! let app = provider.get_config::<AppConfig>().unwrap().unwrap();
//! assert_eq!(app.host, "localhost");
//! assert_eq!(app.port, 8080);
//! ```

pub mod config;
pub mod errors;
pub mod provider;
