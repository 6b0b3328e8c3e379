//! In-memory fakes shared by the unit tests in this crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use plug_manifest::{PluginId, RawSearchResult};
use plug_state::{
    ExecutionLocation, HostPluginManager, InstalledPluginInfo, PluginStateService,
};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::config::RegistryConfig;
use crate::transport::{PackageMetadata, RegistryTransport, TransportError, TransportResult};

/// A per-version metadata object that passes manifest validation.
pub(crate) fn manifest_value(
    publisher: &str,
    name: &str,
    version: &str,
    files: Value,
) -> Value {
    json!({
        "name": name,
        "publisher": publisher,
        "version": version,
        "files": files,
        "engines": { "hostVersion": "^1.0.0" }
    })
}

/// A full metadata document: versions plus dist-tags.
pub(crate) fn metadata_doc(name: &str, versions: &[(&str, Value)], tags: &[(&str, &str)]) -> Value {
    let versions: serde_json::Map<String, Value> = versions
        .iter()
        .map(|(v, doc)| (v.to_string(), doc.clone()))
        .collect();
    let tags: serde_json::Map<String, Value> = tags
        .iter()
        .map(|(tag, v)| (tag.to_string(), json!(v)))
        .collect();
    json!({"name": name, "dist-tags": tags, "versions": versions})
}

pub(crate) struct StubHost {
    plugins: StdMutex<HashMap<String, InstalledPluginInfo>>,
    tx: broadcast::Sender<()>,
}

#[async_trait]
impl HostPluginManager for StubHost {
    async fn get_installed(
        &self,
        id: &PluginId,
    ) -> plug_state::error::Result<Option<InstalledPluginInfo>> {
        Ok(self.plugins.lock().unwrap().get(&id.key()).cloned())
    }

    async fn install(&self, _artifact: &Path) -> plug_state::error::Result<()> {
        Ok(())
    }

    async fn uninstall(&self, _id: &PluginId) -> plug_state::error::Result<()> {
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

/// A state service whose host reports exactly the given installed plugins.
pub(crate) fn state_service_with(
    installed: &[(&str, &str, ExecutionLocation)],
) -> PluginStateService {
    let (tx, _) = broadcast::channel(4);
    let plugins = installed
        .iter()
        .map(|(id, version, location)| {
            let id = PluginId::parse(id).unwrap();
            let info = InstalledPluginInfo {
                id: id.clone(),
                location: *location,
                version: semver::Version::parse(version).unwrap(),
            };
            (id.key(), info)
        })
        .collect();
    let host = Arc::new(StubHost {
        plugins: StdMutex::new(plugins),
        tx,
    });
    PluginStateService::new(host, None)
}

/// Scripted registry transport.
///
/// `docs` maps package names to metadata documents; `fallback_doc`, when set,
/// answers any unknown name (used by the endless-search pagination tests).
#[derive(Default)]
pub(crate) struct MockTransport {
    pub docs: HashMap<String, Value>,
    pub fallback_doc: Option<Value>,
    pub search_hits: Vec<RawSearchResult>,
    /// Always return a full page of synthetic hits, like a server that
    /// ignores pagination parameters.
    pub endless_search: bool,
    pub search_calls: AtomicUsize,
    pub extract_calls: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn with_doc(name: &str, doc: Value) -> Self {
        Self {
            docs: HashMap::from([(name.to_string(), doc)]),
            ..Self::default()
        }
    }

    pub(crate) fn hit(name: &str) -> RawSearchResult {
        RawSearchResult {
            name: name.to_string(),
            version: None,
            description: None,
            keywords: None,
        }
    }
}

#[async_trait]
impl RegistryTransport for MockTransport {
    async fn search(
        &self,
        _query: &str,
        from: usize,
        limit: usize,
    ) -> TransportResult<Vec<RawSearchResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.endless_search {
            return Ok((from..from + limit)
                .map(|i| Self::hit(&format!("pkg{i}")))
                .collect());
        }
        let end = (from + limit).min(self.search_hits.len());
        Ok(self.search_hits.get(from..end).unwrap_or(&[]).to_vec())
    }

    async fn metadata(&self, name: &str) -> TransportResult<PackageMetadata> {
        let doc = self
            .docs
            .get(name)
            .or(self.fallback_doc.as_ref())
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        serde_json::from_value(doc.clone()).map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn extract(&self, _spec: &str, dest: &Path) -> TransportResult<()> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("artifact.marker"), b"extracted")?;
        Ok(())
    }
}

/// Factory handing out pre-registered transports keyed by config name.
pub(crate) struct MockFactory {
    pub transports: HashMap<String, Arc<MockTransport>>,
}

impl crate::transport::TransportFactory for MockFactory {
    fn create(&self, config: &RegistryConfig) -> Arc<dyn RegistryTransport> {
        match self.transports.get(&config.name) {
            Some(transport) => Arc::clone(transport) as Arc<dyn RegistryTransport>,
            None => Arc::new(MockTransport::default()),
        }
    }
}
