use std::{any::type_name, ops::Deref, sync::Arc};

use wrapp_ioc::{types::DependencyInfo, Injectable, Injector, RegistryError, Resolver};

use crate::provider::{ConfigProvider, CONFIG_PROVIDER};

/// A wrapper type to allow for config injections
///
/// Resolves the config of type `T` from the [ConfigProvider] registered with the registry, so
/// autobuilt constructors can take configs as parameters. Wrap it in an `Option` for configs
/// which may be missing.
///
/// # Example
/// ```rust
/// use wrapp_config::{config::Config, provider::ConfigProvider};
/// use wrapp_ioc::{Autobuild, Constructor, Registry};
///
/// pub struct ServerConfig {
///     port: u16,
/// }
///
/// struct Server {
///     port: u16,
/// }
/// impl Autobuild for Server {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |(config,): (Config<ServerConfig>,)| {
///             Ok(Server { port: config.port })
///         })]
///     }
/// }
///
/// let mut configs = ConfigProvider::new();
/// configs.add_config(ServerConfig { port: 8080 }).unwrap();
///
/// let registry = configs.register(Registry::builder()).build().unwrap();
/// assert_eq!(registry.autobuild::<Server>().unwrap().port, 8080);
/// ```
pub struct Config<T> {
    inner: Arc<T>,
}
impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Config {
            inner: Arc::clone(&self.inner),
        }
    }
}
impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<T> Config<T> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

fn provider(injector: &Injector<'_>) -> Result<Arc<ConfigProvider>, RegistryError> {
    injector
        .registry()
        .service::<ConfigProvider>(CONFIG_PROVIDER)
}

impl<T: Injectable> Resolver for Config<T> {
    fn resolve(injector: &Injector<'_>) -> Result<Self, RegistryError> {
        let config_name = type_name::<T>();
        let config_provider = provider(injector)?;

        let config: Arc<T> = config_provider
            .get_config()
            .map_err(|err| RegistryError::resolve_failed(config_name, err))?
            .ok_or_else(|| RegistryError::NotProvided {
                dependency: config_name,
                provider: format!("the builtin service '{CONFIG_PROVIDER}'"),
            })?;

        Ok(Config { inner: config })
    }

    fn dependency_info() -> DependencyInfo {
        DependencyInfo::of::<Config<T>>()
    }

    fn is_resolvable(injector: &Injector<'_>) -> bool {
        provider(injector).is_ok_and(|provider| provider.contains::<T>())
    }
}

#[cfg(test)]
mod tests {
    use wrapp_ioc::{Autobuild, Constructor, Registry};

    use super::*;

    #[derive(Debug)]
    struct Database {
        url: String,
    }
    struct Pool {
        size: u8,
    }

    struct Repository {
        url: String,
        pool_size: Option<u8>,
    }
    impl Autobuild for Repository {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![
                Constructor::new("new", |(database,): (Config<Database>,)| {
                    Ok(Repository {
                        url: database.url.clone(),
                        pool_size: None,
                    })
                }),
                Constructor::new(
                    "pooled",
                    |(database, pool): (Config<Database>, Config<Pool>)| {
                        Ok(Repository {
                            url: database.url.clone(),
                            pool_size: Some(pool.size),
                        })
                    },
                ),
            ]
        }
    }

    fn registry(pool: Option<Pool>) -> Registry {
        let mut configs = ConfigProvider::new();
        configs
            .add_config(Database {
                url: "sqlite::memory:".into(),
            })
            .unwrap()
            .maybe_add_config(pool)
            .unwrap();
        configs.register(Registry::builder()).build().unwrap()
    }

    #[test]
    fn resolves_registered_configs() {
        let repository = registry(Some(Pool { size: 4 }))
            .autobuild::<Repository>()
            .unwrap();
        assert_eq!(repository.url, "sqlite::memory:");
        assert_eq!(repository.pool_size, Some(4));
    }

    #[test]
    fn missing_configs_rule_out_constructors() {
        let repository = registry(None).autobuild::<Repository>().unwrap();
        assert_eq!(repository.pool_size, None);
    }

    #[test]
    fn missing_configs_are_not_provided() {
        struct Optional(Option<Config<Pool>>);
        impl Autobuild for Optional {
            fn constructors() -> Vec<Constructor<Self>> {
                vec![Constructor::new("new", |(pool,): (Option<Config<Pool>>,)| {
                    Ok(Optional(pool))
                })]
            }
        }

        assert!(registry(None).autobuild::<Optional>().unwrap().0.is_none());

        #[derive(Debug)]
        struct Required;
        impl Autobuild for Required {
            fn constructors() -> Vec<Constructor<Self>> {
                vec![Constructor::new("new", |(_,): (Config<Pool>,)| Ok(Required))]
            }
        }

        let message = registry(None).autobuild::<Required>().unwrap_err().to_string();
        assert!(
            message.contains("is not provided by the builtin service 'ConfigProvider'"),
            "{message}"
        );
    }

    #[test]
    fn unregistered_provider_is_not_found() {
        #[derive(Debug)]
        struct Required;
        impl Autobuild for Required {
            fn constructors() -> Vec<Constructor<Self>> {
                vec![Constructor::new("new", |(_,): (Config<Database>,)| Ok(Required))]
            }
        }

        let registry = Registry::builder().build().unwrap();
        let message = registry.autobuild::<Required>().unwrap_err().to_string();
        assert!(message.contains("'ConfigProvider' is not defined"), "{message}");
    }
}
