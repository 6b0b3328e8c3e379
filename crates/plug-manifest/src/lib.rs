//! Plugin identifiers and manifest validation.
//!
//! This crate provides the typed view of untrusted registry metadata:
//! case-insensitive plugin identifiers, a schema-validation layer for
//! decoded JSON, and the [`PluginManifest`] built from a validated
//! per-version metadata object.

pub mod error;
pub mod ident;
pub mod manifest;
pub mod schema;

/// Nested field whose presence marks a metadata object as a plugin manifest.
///
/// Registries serve packages of all kinds; only objects declaring a host
/// engine requirement are plugins. Absence is classified as
/// [`Error::NotAPlugin`](error::Error::NotAPlugin), never as a generic
/// validation failure.
pub const PLUGIN_MARKER_FIELD: &str = "engines.hostVersion";

pub use error::Error;
pub use ident::PluginId;
pub use manifest::{ExecutionPreference, PluginEngines, PluginManifest, RawSearchResult};
pub use schema::{FieldKind, FieldSpec, Schema};
