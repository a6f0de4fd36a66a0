use std::marker::PhantomData;

use crate::{configuration::ContributedValue, errors::ConfigurationError};

/// View handed to unordered contributions
pub struct UnorderedConfiguration<'a, V> {
    values: &'a mut Vec<ContributedValue>,
    _value: PhantomData<fn(V)>,
}
impl<'a, V: Send + 'static> UnorderedConfiguration<'a, V> {
    pub(crate) fn new(values: &'a mut Vec<ContributedValue>) -> Self {
        UnorderedConfiguration {
            values,
            _value: PhantomData,
        }
    }

    pub fn add(&mut self, value: V) {
        self.values.push(ContributedValue::new(value));
    }
}

/// Collects unordered contributions for one service
pub(crate) struct UnorderedCollector<V> {
    service_id: String,
    values: Vec<V>,
}
impl<V: 'static> UnorderedCollector<V> {
    pub(crate) fn new(service_id: &str) -> Self {
        UnorderedCollector {
            service_id: service_id.to_string(),
            values: Vec::new(),
        }
    }

    pub(crate) fn accept(
        &mut self,
        location: &str,
        contributed: Vec<ContributedValue>,
    ) -> Result<(), ConfigurationError> {
        for value in contributed {
            let value =
                value
                    .downcast::<V>()
                    .map_err(|actual| ConfigurationError::ValueTypeMismatch {
                        service_id: self.service_id.clone(),
                        location: location.to_string(),
                        expected: std::any::type_name::<V>(),
                        actual,
                    })?;
            self.values.push(value);
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Vec<V> {
        self.values
    }
}
