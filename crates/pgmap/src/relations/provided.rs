//! Caller-supplied relation values.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::value::SqlValue;

/// Values for one provided relation property: foreign-key value → related
/// record, type-erased.
#[derive(Default, Clone)]
pub struct ProvidedValues {
    values: HashMap<SqlValue, Arc<dyn Any + Send + Sync>>,
}

impl ProvidedValues {
    pub fn contains(&self, key: &SqlValue) -> bool {
        self.values.contains_key(key)
    }

    pub(crate) fn get<P: Clone + 'static>(&self, key: &SqlValue) -> Option<P> {
        self.values
            .get(key)
            .and_then(|v| v.downcast_ref::<P>())
            .cloned()
    }
}

/// A per-query side channel of already-known to-one values.
///
/// When a to-one loader finds every foreign-key value of its batch in here, it
/// attaches directly and issues no secondary query. Built per query, consulted
/// during injection, discarded afterwards.
#[derive(Default, Clone)]
pub struct ProvidedProperties {
    map: HashMap<String, ProvidedValues>,
}

impl ProvidedProperties {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add values for `property`, merging with any already present.
    pub fn with<P, I>(mut self, property: &str, values: I) -> Self
    where
        P: Send + Sync + 'static,
        I: IntoIterator<Item = (SqlValue, P)>,
    {
        let slot = self.map.entry(property.to_string()).or_default();
        for (key, value) in values {
            slot.values.insert(key, Arc::new(value));
        }
        self
    }

    pub fn has_values_for(&self, property: &str) -> bool {
        self.map.contains_key(property)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn lookup(&self, property: &str) -> Option<&ProvidedValues> {
        self.map.get(property)
    }
}
