//! Case-insensitive plugin identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A `(publisher, name)` pair identifying one plugin across all registries.
///
/// Equality and hashing are case-insensitive; the original casing is kept
/// for display. The canonical rendering is `publisher.name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginId {
    publisher: String,
    name: String,
}

impl PluginId {
    pub fn new(publisher: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            publisher: publisher.into(),
            name: name.into(),
        }
    }

    /// Parse a `publisher.name` string. The name portion may itself contain
    /// dots; only the first dot separates publisher from name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((publisher, name)) if !publisher.is_empty() && !name.is_empty() => {
                Ok(Self::new(publisher, name))
            }
            _ => Err(Error::InvalidIdentifier(s.to_string())),
        }
    }

    /// Publisher with original casing.
    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Bare package name with original casing. Registries are keyed by this.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased `publisher.name`, the key used for every lookup and cache.
    pub fn key(&self) -> String {
        format!("{}.{}", self.publisher, self.name).to_lowercase()
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.publisher, self.name)
    }
}

impl PartialEq for PluginId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PluginId {}

impl std::hash::Hash for PluginId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
