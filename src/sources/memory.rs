use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use super::{Source, SourceError};

/// Process-local source backed by a map that can be changed at runtime.
///
/// Changes are picked up the next time the source is read.
#[derive(Debug)]
pub struct MemorySource<V = String> {
    name: String,
    values: RwLock<HashMap<String, V>>,
}

impl<V> MemorySource<V> {
    /// Creates an empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_values(name, HashMap::new())
    }

    /// Creates a source holding `values`.
    pub fn with_values(name: impl Into<String>, values: HashMap<String, V>) -> Self {
        Self {
            name: name.into(),
            values: RwLock::new(values),
        }
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: V) -> Option<V> {
        self.write().insert(key.into(), value)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.write().remove(key)
    }

    /// Removes every key.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.read_values().len()
    }

    /// Returns true if the source holds no key.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_values(&self) -> RwLockReadGuard<'_, HashMap<String, V>> {
        match self.values.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        match self.values.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<V> Source for MemorySource<V>
where
    V: Clone + Send + Sync,
{
    type Value = V;

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<HashMap<String, V>, SourceError> {
        Ok(self.read_values().clone())
    }
}
