use std::{
    any::TypeId,
    borrow::Cow,
    fmt::Debug,
    hash::Hash,
    marker::PhantomData,
};

use indexmap::{map::Entry, IndexMap};

use crate::{
    configuration::{ContributedValue, EntryKind},
    errors::ConfigurationError,
};

/// Key of a mapped configuration
///
/// Keys are compared through their folded form, textual keys fold to lowercase which makes them
/// case-insensitive.
pub trait MapKey: Clone + Debug + Send + 'static {
    type Folded: Eq + Hash + Debug + Send + 'static;

    fn fold(&self) -> Self::Folded;
}

/// Keys which fold to lowercase text, see [ConfigMap::get_str]
pub trait TextKey: MapKey<Folded = String> {}

impl MapKey for String {
    type Folded = String;

    fn fold(&self) -> String {
        self.to_lowercase()
    }
}
impl TextKey for String {}

impl MapKey for &'static str {
    type Folded = String;

    fn fold(&self) -> String {
        self.to_lowercase()
    }
}
impl TextKey for &'static str {}

impl MapKey for Cow<'static, str> {
    type Folded = String;

    fn fold(&self) -> String {
        self.to_lowercase()
    }
}
impl TextKey for Cow<'static, str> {}

macro_rules! identity_keys {
    ($($ty:ty),*) => {
        $(
            impl MapKey for $ty {
                type Folded = $ty;

                fn fold(&self) -> $ty {
                    *self
                }
            }
        )*
    };
}
identity_keys!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, bool, TypeId);

/// Collected mapped configuration, in contribution order
#[derive(Clone)]
pub struct ConfigMap<K: MapKey, V> {
    entries: IndexMap<K::Folded, (K, V)>,
}
impl<K: MapKey, V: Debug> Debug for ConfigMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
impl<K: MapKey, V> Default for ConfigMap<K, V> {
    fn default() -> Self {
        ConfigMap {
            entries: IndexMap::new(),
        }
    }
}
impl<K: MapKey, V> ConfigMap<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(&key.fold()).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(&key.fold())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys are returned as contributed, not folded
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.values().map(|(key, value)| (key, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.values().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|(_, value)| value)
    }
}
impl<K: TextKey, V> ConfigMap<K, V> {
    /// Case-insensitive lookup by text
    pub fn get_str(&self, key: &str) -> Option<&V> {
        self.entries
            .get(&key.to_lowercase())
            .map(|(_, value)| value)
    }
}
impl<K: MapKey, V> IntoIterator for ConfigMap<K, V> {
    type Item = (K, V);
    type IntoIter = indexmap::map::IntoValues<K::Folded, (K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

pub(crate) struct MappedEntry {
    kind: EntryKind,
    key: ContributedValue,
    value: ContributedValue,
}

/// View handed to mapped contributions
pub struct MappedConfiguration<'a, K, V> {
    entries: &'a mut Vec<MappedEntry>,
    _types: PhantomData<fn(K, V)>,
}
impl<'a, K: MapKey, V: Send + 'static> MappedConfiguration<'a, K, V> {
    pub(crate) fn new(entries: &'a mut Vec<MappedEntry>) -> Self {
        MappedConfiguration {
            entries,
            _types: PhantomData,
        }
    }

    pub fn add(&mut self, key: K, value: V) {
        self.push(EntryKind::Add, key, value);
    }

    /// Replaces the value contributed under `key`, possibly by another module
    pub fn override_value(&mut self, key: K, value: V) {
        self.push(EntryKind::Override, key, value);
    }

    fn push(&mut self, kind: EntryKind, key: K, value: V) {
        self.entries.push(MappedEntry {
            kind,
            key: ContributedValue::new(key),
            value: ContributedValue::new(value),
        });
    }
}

struct Collected<K, V> {
    key: K,
    value: V,
    location: String,
}

/// Collects mapped contributions for one service
pub(crate) struct MappedCollector<K: MapKey, V> {
    service_id: String,
    entries: IndexMap<K::Folded, Collected<K, V>>,
    overrides: IndexMap<K::Folded, Collected<K, V>>,
}
impl<K: MapKey, V: 'static> MappedCollector<K, V> {
    pub(crate) fn new(service_id: &str) -> Self {
        MappedCollector {
            service_id: service_id.to_string(),
            entries: IndexMap::new(),
            overrides: IndexMap::new(),
        }
    }

    pub(crate) fn accept(
        &mut self,
        location: &str,
        contributed: Vec<MappedEntry>,
    ) -> Result<(), ConfigurationError> {
        for entry in contributed {
            let key =
                entry
                    .key
                    .downcast::<K>()
                    .map_err(|actual| ConfigurationError::KeyTypeMismatch {
                        service_id: self.service_id.clone(),
                        location: location.to_string(),
                        expected: std::any::type_name::<K>(),
                        actual,
                    })?;
            let value =
                entry
                    .value
                    .downcast::<V>()
                    .map_err(|actual| ConfigurationError::ValueTypeMismatch {
                        service_id: self.service_id.clone(),
                        location: location.to_string(),
                        expected: std::any::type_name::<V>(),
                        actual,
                    })?;

            let target = match entry.kind {
                EntryKind::Add => &mut self.entries,
                EntryKind::Override => &mut self.overrides,
            };
            match target.entry(key.fold()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(Collected {
                        key,
                        value,
                        location: location.to_string(),
                    });
                }
                Entry::Occupied(existing) => {
                    let first = existing.get().location.clone();
                    let key = format!("{key:?}");
                    return Err(match entry.kind {
                        EntryKind::Add => ConfigurationError::DuplicateKey {
                            service_id: self.service_id.clone(),
                            key,
                            first,
                            second: location.to_string(),
                        },
                        EntryKind::Override => ConfigurationError::DuplicateOverride {
                            service_id: self.service_id.clone(),
                            id: format!("key {key}"),
                            first,
                            second: location.to_string(),
                        },
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<ConfigMap<K, V>, ConfigurationError> {
        for (folded, replacement) in self.overrides {
            match self.entries.get_mut(&folded) {
                Some(entry) => {
                    tracing::debug!(
                        service = %self.service_id,
                        key = ?entry.key,
                        overridden_by = %replacement.location,
                        "Overriding mapped configuration entry"
                    );
                    entry.value = replacement.value;
                    entry.location = replacement.location;
                }
                None => {
                    return Err(ConfigurationError::UnknownOverride {
                        service_id: self.service_id,
                        id: format!("key {:?}", replacement.key),
                        location: replacement.location,
                    })
                }
            }
        }

        let entries = self
            .entries
            .into_iter()
            .map(|(folded, collected)| (folded, (collected.key, collected.value)))
            .collect();
        Ok(ConfigMap { entries })
    }
}
