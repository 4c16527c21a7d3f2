use std::{collections::HashMap, fmt};

use tracing::debug;

use super::{Source, SourceError};

/// Several sources read as one, later layers overriding earlier ones.
///
/// Every layer is read on each call; if any layer fails the whole read fails
/// so a refresh cycle never publishes a partial merge.
pub struct LayeredSource<V> {
    name: String,
    layers: Vec<Box<dyn Source<Value = V>>>,
}

impl<V> LayeredSource<V> {
    /// Creates a source with no layers.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            layers: Vec::new(),
        }
    }

    /// Adds `layer` on top of the existing layers.
    pub fn with_layer(mut self, layer: impl Source<Value = V> + 'static) -> Self {
        self.push(Box::new(layer));
        self
    }

    /// Adds `layer` on top of the existing layers.
    pub fn push(&mut self, layer: Box<dyn Source<Value = V>>) {
        if !self.name.is_empty() {
            self.name.push_str(" > ");
        }
        self.name.push_str(layer.name());
        self.layers.push(layer);
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<V> Default for LayeredSource<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for LayeredSource<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredSource")
            .field("name", &self.name)
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl<V> Source for LayeredSource<V> {
    type Value = V;

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<HashMap<String, V>, SourceError> {
        let mut merged = HashMap::new();

        for layer in &self.layers {
            let values = layer.read()?;
            debug!(layer = layer.name(), keys = values.len(), "merged layer");
            merged.extend(values);
        }

        Ok(merged)
    }
}
