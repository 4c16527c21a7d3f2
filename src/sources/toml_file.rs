use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use toml::Value;
use tracing::debug;

use super::{Source, SourceError};

/// Reads a TOML document and exposes it as flat dotted keys.
#[derive(Debug, Clone)]
pub struct TomlFileSource {
    path: PathBuf,
    name: String,
}

impl TomlFileSource {
    /// Creates a source for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();

        Self { path, name }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for TomlFileSource {
    type Value = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<HashMap<String, String>, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|e| SourceError::io(&self.path, &e))?;
        let document: Value = toml::from_str(&text).map_err(|e| SourceError::Parse {
            location: self.name.clone(),
            details: e.to_string(),
        })?;

        let values = flatten_toml(&document);
        debug!(source = %self.name, keys = values.len(), "read toml file");
        Ok(values)
    }
}

/// Flattens nested tables into dotted keys.
///
/// Strings are taken verbatim; every other leaf, arrays included, is rendered
/// as its TOML text.
pub fn flatten_toml(document: &Value) -> HashMap<String, String> {
    let mut values = HashMap::new();
    if let Value::Table(table) = document {
        for (key, value) in table {
            flatten_into(key.clone(), value, &mut values);
        }
    }
    values
}

fn flatten_into(prefix: String, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Table(table) => {
            for (key, nested) in table {
                flatten_into(format!("{prefix}.{key}"), nested, out);
            }
        }
        Value::String(text) => {
            out.insert(prefix, text.clone());
        }
        other => {
            out.insert(prefix, other.to_string());
        }
    }
}
