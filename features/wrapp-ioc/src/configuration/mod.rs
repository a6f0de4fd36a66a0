//! Configuration contributed to services by modules.
//!
//! A service collects exactly one flavour of configuration:
//! 1. [UnorderedConfiguration] - values in contribution order
//! 2. [OrderedConfiguration] - values ordered by id constraints, see [crate::orderer::Orderer]
//! 3. [MappedConfiguration] - key/value pairs, duplicate keys are an error
//!
//! Modules contribute through the typed views, the registry collects every contribution
//! (modules in registration order, contributions in declaration order) and checks each value
//! against the type the service asks for.

use std::{any::Any, fmt::Display};

use crate::types::TypeInfo;

pub mod mapped;
pub mod ordered;
pub mod unordered;

pub use mapped::{ConfigMap, MapKey, MappedConfiguration, TextKey};
pub use ordered::OrderedConfiguration;
pub use unordered::UnorderedConfiguration;

/// The flavour of a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigurationKind {
    Unordered,
    Ordered,
    Mapped,
}
impl Display for ConfigurationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConfigurationKind::Unordered => "unordered",
            ConfigurationKind::Ordered => "ordered",
            ConfigurationKind::Mapped => "mapped",
        })
    }
}

/// A contributed value whose type is checked once the collecting service asks for it
pub(crate) struct ContributedValue {
    pub(crate) info: TypeInfo,
    value: Box<dyn Any + Send>,
}
impl ContributedValue {
    pub(crate) fn new<V: Send + 'static>(value: V) -> Self {
        ContributedValue {
            info: TypeInfo::of::<V>(),
            value: Box::new(value),
        }
    }

    /// Returns the value, or the name of its actual type on mismatch
    pub(crate) fn downcast<V: 'static>(self) -> Result<V, &'static str> {
        let actual = self.info.type_name;
        self.value
            .downcast::<V>()
            .map(|value| *value)
            .map_err(|_| actual)
    }
}

/// Whether an entry adds to the configuration or replaces an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Add,
    Override,
}
