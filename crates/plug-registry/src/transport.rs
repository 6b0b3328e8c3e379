//! Transport seam between the resolution engine and actual registries.
//!
//! Registries follow the common package-registry convention: a free-text
//! search endpoint with offset/limit paging, a metadata endpoint returning a
//! dist-tags map plus a per-version object map, and a tarball fetch. The
//! engine never speaks HTTP itself; it consumes this trait.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plug_manifest::RawSearchResult;
use serde::Deserialize;
use serde_json::Value;

use crate::config::RegistryConfig;

/// Errors surfaced by a transport implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 404-equivalent: the registry answered and does not have the package.
    #[error("package '{0}' not found by this registry")]
    NotFound(String),

    /// Any other request failure (network, auth, malformed response).
    #[error("registry request failed: {0}")]
    Request(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Full metadata for one package: the dist-tag map, the untyped per-version
/// objects, and optional publish timestamps keyed by version.
///
/// Per-version objects stay [`serde_json::Value`] here; they are untrusted
/// until they pass manifest validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, Value>,
    #[serde(default)]
    pub time: BTreeMap<String, DateTime<Utc>>,
}

impl PackageMetadata {
    /// Version string a dist-tag points at, if the tag exists.
    pub fn tagged_version(&self, tag: &str) -> Option<&str> {
        self.dist_tags.get(tag).map(String::as_str)
    }
}

/// One registry endpoint's wire operations.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Fetch up to `limit` search hits starting at offset `from`.
    async fn search(
        &self,
        query: &str,
        from: usize,
        limit: usize,
    ) -> TransportResult<Vec<RawSearchResult>>;

    /// Fetch the full metadata document for a package name.
    async fn metadata(&self, name: &str) -> TransportResult<PackageMetadata>;

    /// Fetch and extract the artifact for `spec` (`name@version`) into
    /// `dest`. The destination's parent directories already exist.
    async fn extract(&self, spec: &str, dest: &Path) -> TransportResult<()>;
}

/// Builds a transport for a registry configuration.
///
/// The engine is generic over how configs become live endpoints; production
/// wires an HTTP client here, tests wire in-memory fakes.
pub trait TransportFactory: Send + Sync {
    fn create(&self, config: &RegistryConfig) -> Arc<dyn RegistryTransport>;
}
