use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
};

use wrapp_ioc::{RegistryBuilder, TypeInfo};

use crate::errors::ConfigError;

/// Id of the builtin service the provider is registered as
pub const CONFIG_PROVIDER: &str = "ConfigProvider";

/// A provider to register all configs.
///
/// Configs can be registered and retrieved based on type.
#[derive(Default)]
pub struct ConfigProvider {
    configs: HashMap<TypeId, (TypeInfo, Arc<dyn Any + Send + Sync + 'static>)>,
}
impl Debug for ConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.configs.values().map(|(info, _)| info.type_name).collect();
        names.sort_unstable();
        f.debug_struct("ConfigProvider").field("configs", &names).finish()
    }
}

impl ConfigProvider {
    /// Initializes an empty Config Provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve a config with specified type.
    ///
    /// Returns `Ok(None)` if no config of type `T` was added
    pub fn get_config<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ConfigError> {
        let Some((info, entry)) = self.configs.get(&TypeId::of::<T>()) else {
            return Ok(None);
        };

        Arc::clone(entry)
            .downcast::<T>()
            .map(Some)
            .map_err(|_| ConfigError::TypeMismatch(*info))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.configs.contains_key(&TypeId::of::<T>())
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return a
    /// [`ConfigError::AlreadyRegistered`]
    pub fn add_config<T: Send + Sync + 'static>(
        &mut self,
        config: T,
    ) -> Result<&mut Self, ConfigError> {
        let info = TypeInfo::of::<T>();
        if self.configs.contains_key(&info.type_id) {
            return Err(ConfigError::AlreadyRegistered(info));
        }

        tracing::debug!(config = info.type_name, "Registered config");
        self.configs.insert(info.type_id, (info, Arc::new(config)));
        Ok(self)
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Send + Sync + 'static>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    /// Registers the provider as builtin service [CONFIG_PROVIDER]
    pub fn register(self, builder: RegistryBuilder) -> RegistryBuilder {
        builder.add_instance(CONFIG_PROVIDER, Arc::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Database {
        url: String,
    }

    #[test]
    fn configs_are_keyed_by_type() {
        let mut provider = ConfigProvider::new();
        provider
            .add_config(Database {
                url: "postgres://localhost".into(),
            })
            .unwrap()
            .add_config(8080u16)
            .unwrap()
            .maybe_add_config::<u32>(None)
            .unwrap();

        let database = provider.get_config::<Database>().unwrap().unwrap();
        assert_eq!(database.url, "postgres://localhost");
        assert_eq!(*provider.get_config::<u16>().unwrap().unwrap(), 8080);
        assert!(provider.get_config::<u32>().unwrap().is_none());
        assert!(!provider.contains::<u32>());
    }

    #[test]
    fn configs_can_not_be_replaced() {
        let mut provider = ConfigProvider::new();
        provider.add_config(1u8).unwrap();

        let err = provider.add_config(2u8).unwrap_err();
        assert_eq!(err, ConfigError::AlreadyRegistered(TypeInfo::of::<u8>()));
        assert_eq!(err.to_string(), "A config of type 'u8' is already registered");
        assert_eq!(*provider.get_config::<u8>().unwrap().unwrap(), 1);
    }
}
