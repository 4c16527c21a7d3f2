use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use super::{PropertiesFileSource, Source, SourceError, TomlFileSource};

/// On-disk format of a configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Pick the format from the file extension.
    #[default]
    Auto,
    /// `key=value` properties text.
    Properties,
    /// TOML document.
    Toml,
}

impl SourceFormat {
    /// Resolves `Auto` against `path`. Files ending in `.toml` are TOML,
    /// everything else is read as properties.
    pub fn resolve(self, path: &Path) -> Self {
        match self {
            Self::Auto => match path.extension().and_then(|ext| ext.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
                _ => Self::Properties,
            },
            explicit => explicit,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Properties => "properties",
            Self::Toml => "toml",
        };
        write!(f, "{name}")
    }
}

/// A file source whose reader is chosen by [`SourceFormat`].
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Properties file.
    Properties(PropertiesFileSource),
    /// TOML file.
    Toml(TomlFileSource),
}

impl FileSource {
    /// Creates the reader for `path` in `format`.
    pub fn open(path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        let path = path.into();
        match format.resolve(&path) {
            SourceFormat::Toml => Self::Toml(TomlFileSource::new(path)),
            SourceFormat::Auto | SourceFormat::Properties => {
                Self::Properties(PropertiesFileSource::new(path))
            }
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        match self {
            Self::Properties(source) => source.path(),
            Self::Toml(source) => source.path(),
        }
    }

    /// Resolved format of the backing file.
    pub fn format(&self) -> SourceFormat {
        match self {
            Self::Properties(_) => SourceFormat::Properties,
            Self::Toml(_) => SourceFormat::Toml,
        }
    }
}

impl Source for FileSource {
    type Value = String;

    fn name(&self) -> &str {
        match self {
            Self::Properties(source) => source.name(),
            Self::Toml(source) => source.name(),
        }
    }

    fn read(&self) -> Result<HashMap<String, String>, SourceError> {
        match self {
            Self::Properties(source) => source.read(),
            Self::Toml(source) => source.read(),
        }
    }
}
