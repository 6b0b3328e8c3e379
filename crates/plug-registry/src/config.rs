//! Registry configurations, the configuration-store seam, and release-channel
//! settings.

use std::collections::BTreeMap;

use plug_manifest::PluginId;
use plug_state::ExecutionLocation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Settings key holding the user-level registries array.
pub const REGISTRIES_KEY: &str = "pluginRegistries.registries";
/// Settings key holding the identifier-to-channel map.
pub const CHANNELS_KEY: &str = "pluginRegistries.channels";
/// Settings key holding per-plugin execution-location overrides.
pub const EXECUTION_OVERRIDES_KEY: &str = "pluginRegistries.executionOverrides";

/// The channel tracked when a plugin has no override configured.
pub const DEFAULT_CHANNEL: &str = "latest";

/// Default page size for registry searches.
pub const DEFAULT_RESULT_LIMIT: usize = 100;

/// Abstract get/set access to the editor's configuration storage.
///
/// The engine owns no persistence; everything it remembers between sessions
/// goes through here as JSON-compatible values.
pub trait ConfigurationStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// `None` removes the key.
    fn set(&self, key: &str, value: Option<Value>) -> std::result::Result<(), String>;
}

/// Search terms, accepted either as a single pre-joined string or as an
/// array of terms. `["foo", "bar"]` and `"foo bar"` are the same query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchQuery {
    One(String),
    Many(Vec<String>),
}

impl SearchQuery {
    /// Space-joined form used on the wire and for config equality.
    pub fn normalized(&self) -> String {
        match self {
            Self::One(s) => s.clone(),
            Self::Many(terms) => terms.join(" "),
        }
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::One("*".to_string())
    }
}

/// Provenance of a registry configuration; workspace registries sort before
/// user registries and shadow equal ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegistrySource {
    Workspace,
    User,
}

/// One configured registry endpoint plus its search-scoping options.
///
/// Configs are values: rebuilt whenever the underlying configuration source
/// changes, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Display name, unique within its defining scope.
    pub name: String,
    /// Endpoint URI; absent means the transport's default registry.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub query: SearchQuery,
    #[serde(default = "default_true", rename = "enablePagination")]
    pub enable_pagination: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Transport options passed through untouched (auth, proxy, ...).
    #[serde(default, flatten)]
    pub options: serde_json::Map<String, Value>,
}

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

impl RegistryConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            query: SearchQuery::default(),
            enable_pagination: true,
            limit: DEFAULT_RESULT_LIMIT,
            options: serde_json::Map::new(),
        }
    }

    /// Config equality for deduplication: normalized query, pagination flag,
    /// and endpoint (or both absent) all match. Display name is ignored.
    pub fn matches(&self, other: &Self) -> bool {
        self.enable_pagination == other.enable_pagination
            && self.query.normalized() == other.query.normalized()
            && self.endpoint == other.endpoint
    }
}

/// Parse the user-level registries setting.
///
/// A non-array top level is fatal: there is no safe partial interpretation.
/// A malformed entry aborts only that entry; it is logged with its index and
/// offending field, and enumeration continues.
pub fn user_registries_from_value(value: &Value) -> Result<Vec<RegistryConfig>> {
    let entries = value.as_array().ok_or_else(|| Error::RegistriesNotArray {
        actual: short_render(value),
    })?;

    let mut configs = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match registry_entry_from_value(index, entry) {
            Ok(config) => configs.push(config),
            Err(e) => tracing::warn!(error = %e, "skipping malformed registry entry"),
        }
    }
    Ok(configs)
}

/// Validate and parse one entry of the registries array.
pub fn registry_entry_from_value(index: usize, entry: &Value) -> Result<RegistryConfig> {
    let object = entry.as_object().ok_or_else(|| Error::RegistryEntry {
        index,
        field: "",
        expected: "object",
        actual: short_render(entry),
    })?;

    match object.get("name") {
        Some(Value::String(_)) => {}
        found => {
            return Err(Error::RegistryEntry {
                index,
                field: "name",
                expected: "string",
                actual: found.map_or_else(|| "undefined".to_string(), short_render),
            });
        }
    }
    if let Some(endpoint) = object.get("endpoint") {
        if !endpoint.is_string() {
            return Err(Error::RegistryEntry {
                index,
                field: "endpoint",
                expected: "string",
                actual: short_render(endpoint),
            });
        }
    }

    serde_json::from_value(entry.clone()).map_err(|e| Error::RegistryEntry {
        index,
        field: "",
        expected: "registry configuration",
        actual: e.to_string(),
    })
}

fn short_render(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 80 {
        let cut = (0..=80).rev().find(|i| text.is_char_boundary(*i));
        text.truncate(cut.unwrap_or(0));
        text.push('…');
    }
    text
}

/// The persisted identifier-to-channel map.
///
/// Absence of a key means "track the default channel"; setting a plugin back
/// to the default removes its key instead of storing `"latest"` explicitly.
#[derive(Debug, Clone, Default)]
pub struct ChannelSettings {
    map: BTreeMap<String, String>,
}

impl ChannelSettings {
    pub fn load(store: &dyn ConfigurationStore) -> Self {
        let map = store
            .get(CHANNELS_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Self { map }
    }

    #[cfg(test)]
    pub(crate) fn from_map(map: BTreeMap<String, String>) -> Self {
        Self { map }
    }

    /// Channel or pinned version tracked for `id`.
    pub fn tracked_channel(&self, id: &PluginId) -> &str {
        self.map
            .get(&id.key())
            .map_or(DEFAULT_CHANNEL, String::as_str)
    }

    /// Persist a new channel for `id`, keeping the stored map minimal.
    pub fn set_channel(
        store: &dyn ConfigurationStore,
        id: &PluginId,
        channel: &str,
    ) -> Result<()> {
        let mut settings = Self::load(store);
        if channel == DEFAULT_CHANNEL {
            settings.map.remove(&id.key());
        } else {
            settings.map.insert(id.key(), channel.to_string());
        }
        let value = if settings.map.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&settings.map).unwrap_or(Value::Null))
        };
        store
            .set(CHANNELS_KEY, value)
            .map_err(|reason| Error::SettingsWrite {
                key: CHANNELS_KEY.to_string(),
                reason,
            })
    }
}

/// Per-plugin execution-location overrides, keyed by lower-cased identifier.
/// Unparseable values are dropped rather than surfaced.
pub fn execution_overrides(store: &dyn ConfigurationStore) -> BTreeMap<String, ExecutionLocation> {
    let Some(value) = store.get(EXECUTION_OVERRIDES_KEY) else {
        return BTreeMap::new();
    };
    let Some(object) = value.as_object() else {
        return BTreeMap::new();
    };
    object
        .iter()
        .filter_map(|(id, v)| {
            let location = match v.as_str()? {
                "ui" => ExecutionLocation::Local,
                "workspace" => ExecutionLocation::Remote,
                _ => return None,
            };
            Some((id.to_lowercase(), location))
        })
        .collect()
}
