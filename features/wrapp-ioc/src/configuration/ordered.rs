use std::marker::PhantomData;

use indexmap::{map::Entry, IndexMap};

use crate::{
    configuration::{ContributedValue, EntryKind},
    errors::ConfigurationError,
    orderer::Orderer,
};

pub(crate) struct OrderedEntry {
    kind: EntryKind,
    id: String,
    value: Option<ContributedValue>,
    constraints: Vec<String>,
}

/// View handed to ordered contributions
///
/// Constraints are `before:<ids>` / `after:<ids>`, see [crate::orderer::Orderer].
pub struct OrderedConfiguration<'a, V> {
    entries: &'a mut Vec<OrderedEntry>,
    _value: PhantomData<fn(V)>,
}
impl<'a, V: Send + 'static> OrderedConfiguration<'a, V> {
    pub(crate) fn new(entries: &'a mut Vec<OrderedEntry>) -> Self {
        OrderedConfiguration {
            entries,
            _value: PhantomData,
        }
    }

    pub fn add(&mut self, id: &str, value: V, constraints: &[&str]) {
        self.push(EntryKind::Add, id, Some(value), constraints);
    }

    /// Adds an id other entries can be ordered against, without a value
    pub fn add_placeholder(&mut self, id: &str, constraints: &[&str]) {
        self.push(EntryKind::Add, id, None, constraints);
    }

    /// Replaces the value and constraints contributed under `id`, possibly by another module
    pub fn override_value(&mut self, id: &str, value: V, constraints: &[&str]) {
        self.push(EntryKind::Override, id, Some(value), constraints);
    }

    fn push(&mut self, kind: EntryKind, id: &str, value: Option<V>, constraints: &[&str]) {
        self.entries.push(OrderedEntry {
            kind,
            id: id.to_string(),
            value: value.map(ContributedValue::new),
            constraints: constraints.iter().map(|c| c.to_string()).collect(),
        });
    }
}

struct Collected<V> {
    id: String,
    value: Option<V>,
    constraints: Vec<String>,
    location: String,
}

/// Collects ordered contributions for one service
pub(crate) struct OrderedCollector<V> {
    service_id: String,
    entries: IndexMap<String, Collected<V>>,
    overrides: IndexMap<String, Collected<V>>,
}
impl<V: 'static> OrderedCollector<V> {
    pub(crate) fn new(service_id: &str) -> Self {
        OrderedCollector {
            service_id: service_id.to_string(),
            entries: IndexMap::new(),
            overrides: IndexMap::new(),
        }
    }

    pub(crate) fn accept(
        &mut self,
        location: &str,
        contributed: Vec<OrderedEntry>,
    ) -> Result<(), ConfigurationError> {
        for entry in contributed {
            let value = entry
                .value
                .map(|value| value.downcast::<V>())
                .transpose()
                .map_err(|actual| ConfigurationError::ValueTypeMismatch {
                    service_id: self.service_id.clone(),
                    location: location.to_string(),
                    expected: std::any::type_name::<V>(),
                    actual,
                })?;
            let collected = Collected {
                id: entry.id,
                value,
                constraints: entry.constraints,
                location: location.to_string(),
            };

            let target = match entry.kind {
                EntryKind::Add => &mut self.entries,
                EntryKind::Override => &mut self.overrides,
            };
            match target.entry(collected.id.to_lowercase()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(collected);
                }
                Entry::Occupied(existing) => {
                    let existing = existing.get();
                    return Err(match entry.kind {
                        EntryKind::Add => ConfigurationError::DuplicateId {
                            service_id: self.service_id.clone(),
                            id: collected.id,
                            first: existing.location.clone(),
                            second: collected.location,
                        },
                        EntryKind::Override => ConfigurationError::DuplicateOverride {
                            service_id: self.service_id.clone(),
                            id: format!("'{}'", collected.id),
                            first: existing.location.clone(),
                            second: collected.location,
                        },
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<Vec<V>, ConfigurationError> {
        for (key, replacement) in self.overrides {
            match self.entries.get_mut(&key) {
                Some(entry) => {
                    tracing::debug!(
                        service = %self.service_id,
                        id = %entry.id,
                        overridden_by = %replacement.location,
                        "Overriding ordered configuration entry"
                    );
                    entry.value = replacement.value;
                    entry.constraints = replacement.constraints;
                    entry.location = replacement.location;
                }
                None => {
                    return Err(ConfigurationError::UnknownOverride {
                        service_id: self.service_id,
                        id: format!("'{}'", replacement.id),
                        location: replacement.location,
                    })
                }
            }
        }

        let mut orderer = Orderer::new(format!(
            "ordered configuration of service '{}'",
            self.service_id
        ));
        for entry in self.entries.into_values() {
            let constraints: Vec<&str> = entry.constraints.iter().map(String::as_str).collect();
            match entry.value {
                Some(value) => orderer.add(&entry.id, value, &constraints)?,
                None => orderer.add_placeholder(&entry.id, &constraints)?,
            }
        }

        Ok(orderer.get_ordered().into_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribute(f: impl FnOnce(&mut OrderedConfiguration<'_, &'static str>)) -> Vec<OrderedEntry> {
        let mut entries = Vec::new();
        f(&mut OrderedConfiguration::new(&mut entries));
        entries
    }

    #[test]
    fn orders_entries_from_all_contributions() {
        let mut collector = OrderedCollector::<&'static str>::new("Pipeline");
        collector
            .accept(
                "ModuleA",
                contribute(|c| c.add("Second", "second", &["after:First"])),
            )
            .unwrap();
        collector
            .accept("ModuleB", contribute(|c| c.add("First", "first", &[])))
            .unwrap();

        assert_eq!(collector.finish().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn duplicate_ids_name_both_contributions() {
        let mut collector = OrderedCollector::<&'static str>::new("Pipeline");
        collector
            .accept("ModuleA", contribute(|c| c.add("Step", "a", &[])))
            .unwrap();

        let err = collector
            .accept("ModuleB", contribute(|c| c.add("STEP", "b", &[])))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ordered configuration of service 'Pipeline' received id 'STEP' from both ModuleA and ModuleB"
        );
    }

    #[test]
    fn overrides_replace_value_and_constraints() {
        let mut collector = OrderedCollector::<&'static str>::new("Pipeline");
        collector
            .accept(
                "ModuleA",
                contribute(|c| {
                    c.add("A", "a", &[]);
                    c.add("B", "b", &[]);
                }),
            )
            .unwrap();
        collector
            .accept(
                "ModuleB",
                contribute(|c| c.override_value("a", "a2", &["after:B"])),
            )
            .unwrap();

        assert_eq!(collector.finish().unwrap(), vec!["b", "a2"]);
    }

    #[test]
    fn overrides_must_target_existing_entries() {
        let mut collector = OrderedCollector::<&'static str>::new("Pipeline");
        collector
            .accept(
                "ModuleB",
                contribute(|c| c.override_value("Missing", "x", &[])),
            )
            .unwrap();

        let err = collector.finish().unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownOverride { .. }));
    }

    #[test]
    fn overriding_twice_is_an_error() {
        let mut collector = OrderedCollector::<&'static str>::new("Pipeline");
        collector
            .accept("ModuleA", contribute(|c| c.override_value("A", "x", &[])))
            .unwrap();

        let err = collector
            .accept("ModuleB", contribute(|c| c.override_value("A", "y", &[])))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateOverride { .. }));
    }
}
