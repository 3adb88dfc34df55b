//! Core type definitions: the error taxonomy and the typed configuration model.

use casc_yaml::{Scalar, SourceInfo};
use indexmap::IndexMap;
use thiserror::Error;

/// Errors that can occur while loading and merging configuration sources.
///
/// The first failure on any source aborts the whole load; nothing here is
/// retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be opened, read or decoded.
    #[error("Failed to read {source_label}")]
    Read {
        source_label: String,
        #[source]
        cause: std::io::Error,
    },

    /// A source descriptor that no reader can open.
    #[error("Unknown {source_label}: {reason}")]
    UnknownSource {
        source_label: String,
        reason: String,
    },

    /// Alias expansion exceeded the configured bound.
    #[error(
        "{message}\nYou can increase the maximum by setting an environment variable or property\n  ENV: {env_var}=\"100\"\n  PROPERTY: -D{property}=\"100\""
    )]
    AliasLimit {
        message: String,
        env_var: String,
        property: String,
    },

    /// Any other parse failure, passed through with the parser's message.
    #[error(transparent)]
    Syntax(#[from] casc_yaml::Error),

    /// Two sources define incompatible values at the same path.
    #[error("Found conflicting configuration at `{path}` ({reason}): {existing} conflicts with {incoming}")]
    Conflict {
        path: String,
        reason: String,
        existing: SourceInfo,
        incoming: SourceInfo,
    },

    /// The merged tree cannot be turned into a configuration model.
    #[error("Invalid configuration at {location}: {message}")]
    InvalidModel {
        message: String,
        location: SourceInfo,
    },
}

/// A typed configuration value.
///
/// Every value keeps the `SourceInfo` of the node it was built from, so a
/// consumer rejecting a value can still say which source defined it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue {
    pub value: ConfigValueKind,
    pub source_info: SourceInfo,
}

/// The kind of configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValueKind {
    Scalar(Scalar),
    Sequence(Vec<ConfigValue>),
    Mapping(Mapping),
}

/// An ordered configuration mapping with string keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: IndexMap<String, ConfigValue>,
}

impl ConfigValue {
    pub fn new_scalar(scalar: Scalar, source_info: SourceInfo) -> Self {
        Self {
            value: ConfigValueKind::Scalar(scalar),
            source_info,
        }
    }

    pub fn new_sequence(items: Vec<ConfigValue>, source_info: SourceInfo) -> Self {
        Self {
            value: ConfigValueKind::Sequence(items),
            source_info,
        }
    }

    pub fn new_mapping(mapping: Mapping, source_info: SourceInfo) -> Self {
        Self {
            value: ConfigValueKind::Mapping(mapping),
            source_info,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.value {
            ConfigValueKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().map(|s| s.text.as_str())
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match &self.value {
            ConfigValueKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match &self.value {
            ConfigValueKind::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }
}

impl Mapping {
    /// The empty configuration, returned when there is nothing to load.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) -> Option<ConfigValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Follow a path of keys through nested mappings.
    pub fn get_path(&self, path: &[&str]) -> Option<&ConfigValue> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.get(first)?, |value, key| value.as_mapping()?.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
