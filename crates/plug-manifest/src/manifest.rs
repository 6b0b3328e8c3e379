//! Typed plugin manifests built from validated registry metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PLUGIN_MARKER_FIELD;
use crate::error::{Error, Result};
use crate::schema::{FieldKind, FieldSpec, Schema};

/// Shape a metadata object must satisfy to count as a plugin at all.
///
/// Checked before [`CORE_SCHEMA`] so that a non-plugin package is classified
/// as [`Error::NotAPlugin`] even when its other fields are also malformed.
const MARKER_SCHEMA: Schema = Schema {
    required: &[FieldSpec {
        path: PLUGIN_MARKER_FIELD,
        kind: FieldKind::String,
    }],
    optional: &[],
};

/// Required and optional fields of a plugin manifest proper.
const CORE_SCHEMA: Schema = Schema {
    required: &[FieldSpec {
        path: "name",
        kind: FieldKind::String,
    }],
    optional: &[
        FieldSpec {
            path: "displayName",
            kind: FieldKind::String,
        },
        FieldSpec {
            path: "publisher",
            kind: FieldKind::String,
        },
        FieldSpec {
            path: "description",
            kind: FieldKind::String,
        },
        FieldSpec {
            path: "version",
            kind: FieldKind::String,
        },
        FieldSpec {
            path: "files",
            kind: FieldKind::StringArray,
        },
        FieldSpec {
            path: "osSpecificArtifact",
            kind: FieldKind::StringMap,
        },
        FieldSpec {
            path: "entryPoint",
            kind: FieldKind::String,
        },
        FieldSpec {
            path: "pluginDependencies",
            kind: FieldKind::StringArray,
        },
        FieldSpec {
            path: "preferredExecution",
            kind: FieldKind::String,
        },
    ],
};

/// Where the plugin declares it wants to run, relative to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPreference {
    /// Alongside the UI process.
    Ui,
    /// On the workspace (remote) host.
    Workspace,
}

/// The `engines` block; `hostVersion` is the plugin marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEngines {
    #[serde(rename = "hostVersion")]
    pub host_version: String,
}

/// One version's metadata, validated and typed.
///
/// Unknown fields are dropped; registries routinely attach scores, download
/// counts and other noise we have no use for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Files shipped in the published package, as path strings.
    #[serde(default)]
    pub files: Option<Vec<String>>,
    /// Platform-id to artifact-path map, with an optional `"default"` key.
    #[serde(default)]
    pub os_specific_artifact: Option<std::collections::BTreeMap<String, String>>,
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub plugin_dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub preferred_execution: Option<ExecutionPreference>,
    pub engines: PluginEngines,
}

impl PluginManifest {
    /// Validate and type a decoded metadata object.
    ///
    /// The plugin-marker shape is checked first: a package without
    /// `engines.hostVersion` fails with [`Error::NotAPlugin`] regardless of
    /// what else is wrong with it. Everything after that failing is a
    /// malformed *plugin* and reported as a type error.
    pub fn from_value(value: &Value) -> Result<Self> {
        if MARKER_SCHEMA.check(value).is_err() {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>");
            return Err(Error::NotAPlugin {
                name: name.to_string(),
                marker: PLUGIN_MARKER_FIELD,
            });
        }
        CORE_SCHEMA.check(value)?;
        if let Some(pref) = value.get("preferredExecution").and_then(Value::as_str) {
            if pref != "ui" && pref != "workspace" {
                return Err(Error::TypeMismatch {
                    path: "preferredExecution".to_string(),
                    expected: "\"ui\" or \"workspace\"",
                    actual: format!("\"{pref}\""),
                });
            }
        }
        serde_json::from_value(value.clone()).map_err(|e| Error::TypeMismatch {
            path: String::new(),
            expected: "plugin manifest",
            actual: e.to_string(),
        })
    }
}

/// Minimal per-hit info from a registry's search endpoint.
///
/// Not enough to decide installability; the full per-version metadata has to
/// be fetched before a package can be constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSearchResult {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}
