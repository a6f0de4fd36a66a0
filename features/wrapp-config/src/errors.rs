use wrapp_ioc::TypeInfo;

/// Errors when registering or acquiring a config
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A config of the same type was added before
    #[error("A config of type '{0}' is already registered")]
    AlreadyRegistered(TypeInfo),
    /// The stored config is not of the type it is registered under
    #[error("The config registered for '{0}' has a different type")]
    TypeMismatch(TypeInfo),
}
