use std::{fmt::Debug, sync::Arc};

use crate::{
    configuration::{
        mapped::MappedEntry, ordered::OrderedEntry, ConfigurationKind, ContributedValue, MapKey,
        MappedConfiguration, OrderedConfiguration, UnorderedConfiguration,
    },
    resources::ServiceResources,
    types::DynError,
};

type Contribute<E> =
    dyn Fn(&ServiceResources<'_>, &mut Vec<E>) -> Result<(), DynError> + Send + Sync;

#[derive(Clone)]
pub(crate) enum ContributeFn {
    Unordered(Arc<Contribute<ContributedValue>>),
    Ordered(Arc<Contribute<OrderedEntry>>),
    Mapped(Arc<Contribute<MappedEntry>>),
}
impl ContributeFn {
    pub(crate) fn kind(&self) -> ConfigurationKind {
        match self {
            ContributeFn::Unordered(_) => ConfigurationKind::Unordered,
            ContributeFn::Ordered(_) => ConfigurationKind::Ordered,
            ContributeFn::Mapped(_) => ConfigurationKind::Mapped,
        }
    }
}

/// Contributes configuration to the service `target`
///
/// The contribution runs whenever the target service asks for its configuration, with the
/// resources of the contributing module.
#[derive(Clone)]
pub struct ContributionDef {
    pub(crate) target: String,
    pub(crate) label: Option<String>,
    pub(crate) location: String,
    pub(crate) contribute: ContributeFn,
}
impl Debug for ContributionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributionDef")
            .field("target", &self.target)
            .field("location", &self.location)
            .field("kind", &self.contribute.kind())
            .finish()
    }
}

impl ContributionDef {
    pub fn unordered<V, F>(target: &str, contribute: F) -> Self
    where
        V: Send + 'static,
        F: Fn(&ServiceResources<'_>, &mut UnorderedConfiguration<'_, V>) -> Result<(), DynError>
            + Send
            + Sync
            + 'static,
    {
        Self::with(
            target,
            ContributeFn::Unordered(Arc::new(
                move |resources: &ServiceResources<'_>,
                      values: &mut Vec<ContributedValue>|
                      -> Result<(), DynError> {
                    contribute(resources, &mut UnorderedConfiguration::new(values))
                },
            )),
        )
    }

    pub fn ordered<V, F>(target: &str, contribute: F) -> Self
    where
        V: Send + 'static,
        F: Fn(&ServiceResources<'_>, &mut OrderedConfiguration<'_, V>) -> Result<(), DynError>
            + Send
            + Sync
            + 'static,
    {
        Self::with(
            target,
            ContributeFn::Ordered(Arc::new(
                move |resources: &ServiceResources<'_>,
                      entries: &mut Vec<OrderedEntry>|
                      -> Result<(), DynError> {
                    contribute(resources, &mut OrderedConfiguration::new(entries))
                },
            )),
        )
    }

    pub fn mapped<K, V, F>(target: &str, contribute: F) -> Self
    where
        K: MapKey,
        V: Send + 'static,
        F: Fn(&ServiceResources<'_>, &mut MappedConfiguration<'_, K, V>) -> Result<(), DynError>
            + Send
            + Sync
            + 'static,
    {
        Self::with(
            target,
            ContributeFn::Mapped(Arc::new(
                move |resources: &ServiceResources<'_>,
                      entries: &mut Vec<MappedEntry>|
                      -> Result<(), DynError> {
                    contribute(resources, &mut MappedConfiguration::new(entries))
                },
            )),
        )
    }

    fn with(target: &str, contribute: ContributeFn) -> Self {
        ContributionDef {
            target: target.to_string(),
            label: None,
            location: String::new(),
            contribute,
        }
    }

    /// Names the contribution in errors, as `<module>::<label>`
    pub fn labelled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Where the contribution was made, set once it is added to a module
    pub fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn locate(&mut self, module: &str, number: usize) {
        self.location = match &self.label {
            Some(label) => format!("{module}::{label}"),
            None => format!("{module} (contribution #{number} to '{}')", self.target),
        };
    }
}
