//! End-to-end flows: discovery, install, update detection, and channel
//! switching against in-memory registries and an in-memory editor host.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use plug_manifest::{PluginId, RawSearchResult};
use plug_registry::{
    ChannelSettings, ConfigurationStore, PackageMetadata, PackageRef, PackageState,
    REGISTRIES_KEY, Registry, RegistryConfig, RegistryProvider, RegistryTransport,
    SessionContext, TransportFactory, TransportError, find_package, get_package_channels,
};
use plug_registry::transport::TransportResult;
use plug_state::{
    ExecutionLocation, HostPluginManager, InstalledPluginInfo, PluginStateService,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::broadcast;

// --- In-memory collaborators ---------------------------------------------

struct MemStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemStore {
    fn new() -> Self {
        Self {
            values: Mutex::new(BTreeMap::new()),
        }
    }
}

impl ConfigurationStore for MemStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<Value>) -> Result<(), String> {
        let mut values = self.values.lock().unwrap();
        match value {
            Some(v) => {
                values.insert(key.to_string(), v);
            }
            None => {
                values.remove(key);
            }
        }
        Ok(())
    }
}

struct MemRegistry {
    docs: HashMap<String, Value>,
}

#[async_trait]
impl RegistryTransport for MemRegistry {
    async fn search(
        &self,
        _query: &str,
        from: usize,
        limit: usize,
    ) -> TransportResult<Vec<RawSearchResult>> {
        let mut names: Vec<&String> = self.docs.keys().collect();
        names.sort();
        Ok(names
            .into_iter()
            .skip(from)
            .take(limit)
            .map(|name| RawSearchResult {
                name: name.clone(),
                version: None,
                description: None,
                keywords: None,
            })
            .collect())
    }

    async fn metadata(&self, name: &str) -> TransportResult<PackageMetadata> {
        let doc = self
            .docs
            .get(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        serde_json::from_value(doc.clone()).map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn extract(&self, spec: &str, dest: &Path) -> TransportResult<()> {
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("spec"), spec)?;
        Ok(())
    }
}

struct MemFactory {
    transports: HashMap<String, Arc<MemRegistry>>,
}

impl TransportFactory for MemFactory {
    fn create(&self, config: &RegistryConfig) -> Arc<dyn RegistryTransport> {
        Arc::clone(self.transports.get(&config.name).expect("unknown registry"))
            as Arc<dyn RegistryTransport>
    }
}

struct EditorHost {
    installed: Mutex<HashMap<String, InstalledPluginInfo>>,
    tx: broadcast::Sender<()>,
}

impl EditorHost {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(8);
        Self {
            installed: Mutex::new(HashMap::new()),
            tx,
        }
    }

    fn put(&self, id: &str, version: &str) {
        let id = PluginId::parse(id).unwrap();
        let info = InstalledPluginInfo {
            id: id.clone(),
            location: ExecutionLocation::Local,
            version: semver::Version::parse(version).unwrap(),
        };
        self.installed.lock().unwrap().insert(id.key(), info);
        let _ = self.tx.send(());
    }
}

#[async_trait]
impl HostPluginManager for EditorHost {
    async fn get_installed(
        &self,
        id: &PluginId,
    ) -> plug_state::error::Result<Option<InstalledPluginInfo>> {
        Ok(self.installed.lock().unwrap().get(&id.key()).cloned())
    }

    async fn install(&self, artifact: &Path) -> plug_state::error::Result<()> {
        // Derive name@version from the spec the transport wrote.
        let spec = std::fs::read_to_string(artifact.join("spec"))
            .map_err(|e| plug_state::Error::Host(e.to_string()))?;
        let (name, version) = spec
            .split_once('@')
            .ok_or_else(|| plug_state::Error::Host(format!("bad spec '{spec}'")))?;
        self.put(&format!("acme.{name}"), version);
        Ok(())
    }

    async fn uninstall(&self, id: &PluginId) -> plug_state::error::Result<()> {
        self.installed.lock().unwrap().remove(&id.key());
        let _ = self.tx.send(());
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

// --- Fixture ---------------------------------------------------------------

fn manifest(name: &str, version: &str) -> Value {
    json!({
        "name": name,
        "publisher": "acme",
        "displayName": format!("Acme {name}"),
        "version": version,
        "files": [format!("{name}-{version}.tgz")],
        "engines": { "hostVersion": "^1.0.0" }
    })
}

fn doc(name: &str, versions: &[(&str, &str)]) -> Value {
    // versions: (version, tag) pairs; every version gets a manifest.
    let mut version_map = serde_json::Map::new();
    let mut tags = serde_json::Map::new();
    for (version, tag) in versions {
        version_map.insert((*version).to_string(), manifest(name, version));
        if !tag.is_empty() {
            tags.insert((*tag).to_string(), json!(version));
        }
    }
    json!({"name": name, "dist-tags": tags, "versions": version_map})
}

struct Fixture {
    store: Arc<MemStore>,
    host: Arc<EditorHost>,
    states: Arc<PluginStateService>,
    provider: RegistryProvider,
    cache_dir: tempfile::TempDir,
}

fn fixture(docs: HashMap<String, Value>) -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let store = Arc::new(MemStore::new());
    store
        .set(REGISTRIES_KEY, Some(json!([{"name": "main"}])))
        .unwrap();
    let host = Arc::new(EditorHost::new());
    let states = Arc::new(PluginStateService::new(host.clone(), None));
    let cache_dir = tempfile::TempDir::new().unwrap();
    let ctx = Arc::new(SessionContext::new(
        store.clone(),
        states.clone(),
        "linux-x64".to_string(),
        Some(cache_dir.path().to_path_buf()),
    ));
    let factory = Arc::new(MemFactory {
        transports: HashMap::from([("main".to_string(), Arc::new(MemRegistry { docs }))]),
    });
    let provider = RegistryProvider::new(ctx, factory, vec![]);
    Fixture {
        store,
        host,
        states,
        provider,
        cache_dir,
    }
}

async fn registries(fixture: &Fixture) -> Vec<Registry> {
    fixture.provider.get_registries().await.unwrap()
}

// --- Flows -----------------------------------------------------------------

#[tokio::test]
async fn test_discovery_lists_available_packages() {
    let f = fixture(HashMap::from([
        ("foo".to_string(), doc("foo", &[("1.0.0", "latest")])),
        ("bar".to_string(), doc("bar", &[("2.1.0", "latest")])),
    ]));

    let packages = f.provider.get_unique_packages().await.unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0].display_name(), "Acme bar");
    assert_eq!(packages[1].display_name(), "Acme foo");
    assert!(packages.iter().all(|p| p.state() == PackageState::Available));
}

#[tokio::test]
async fn test_install_flow_reaches_installed_state() {
    let f = fixture(HashMap::from([(
        "foo".to_string(),
        doc("foo", &[("1.0.0", "latest")]),
    )]));
    let registries = registries(&f).await;

    let package = find_package(&registries, "acme.foo", None).await.unwrap();
    let artifact = registries[0]
        .download_package(&PackageRef::Resolved(Box::new(package.clone())))
        .await
        .unwrap();
    assert!(artifact.starts_with(f.cache_dir.path()));

    let host = f.host.clone();
    let states = f.states.clone();
    f.states
        .wait_for_plugin_change_with(
            async move {
                host.install(&artifact).await.unwrap();
                states.handle_local_change().await;
            },
            Duration::from_secs(5),
        )
        .await;

    let mut package = find_package(&registries, "acme.foo", None).await.unwrap();
    package.update_state(&f.states).await.unwrap();
    assert_eq!(package.state(), PackageState::Installed);
    assert_eq!(
        package.installed_version(),
        Some(&semver::Version::new(1, 0, 0))
    );
}

#[tokio::test]
async fn test_update_detection_and_confirmation() {
    let f = fixture(HashMap::from([(
        "foo".to_string(),
        doc("foo", &[("1.1.0", "latest")]),
    )]));
    f.host.put("acme.foo", "1.0.0");
    let registries = registries(&f).await;

    let mut package = find_package(&registries, "acme.foo", None).await.unwrap();
    package.update_state(&f.states).await.unwrap();
    assert_eq!(package.state(), PackageState::UpdateAvailable);

    // The editor applies the update behind our back; ground truth moves on.
    f.host.put("acme.foo", "1.1.0");
    f.states.handle_local_change().await;

    let nominal = semver::Version::new(1, 0, 0);
    let updated = f
        .states
        .did_plugin_update(package.id(), &nominal)
        .await
        .unwrap();
    assert!(updated);

    package.update_state(&f.states).await.unwrap();
    assert_eq!(package.state(), PackageState::Installed);
}

#[tokio::test]
async fn test_channel_switch_resolves_prerelease() {
    let f = fixture(HashMap::from([(
        "foo".to_string(),
        doc("foo", &[("1.0.0", "latest"), ("2.0.0-beta.0", "insiders")]),
    )]));
    let regs = registries(&f).await;

    let package = find_package(&regs, "acme.foo", None).await.unwrap();
    assert_eq!(package.spec(), "foo@1.0.0");

    let id = PluginId::parse("acme.foo").unwrap();
    ChannelSettings::set_channel(f.store.as_ref(), &id, "insiders").unwrap();
    f.provider.handle_settings_change().await;

    let regs = registries(&f).await;
    let mut package = find_package(&regs, "acme.foo", None).await.unwrap();
    assert_eq!(package.spec(), "foo@2.0.0-beta.0");
    assert_eq!(package.channel(), "insiders");

    f.host.put("acme.foo", "2.0.0-beta.0");
    f.states.handle_local_change().await;
    package.update_state(&f.states).await.unwrap();
    assert_eq!(package.state(), PackageState::InstalledPrerelease);
}

#[tokio::test]
async fn test_channel_listing_via_resolver() {
    let f = fixture(HashMap::from([(
        "foo".to_string(),
        doc("foo", &[("1.0.0", "latest"), ("2.0.0-beta.0", "insiders")]),
    )]));
    let registries = registries(&f).await;

    let channels = get_package_channels(&registries, "acme.foo").await.unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels["latest"].version, semver::Version::new(1, 0, 0));
    assert_eq!(
        channels["insiders"].version,
        semver::Version::parse("2.0.0-beta.0").unwrap()
    );
}

#[tokio::test]
async fn test_uninstall_returns_package_to_available() {
    let f = fixture(HashMap::from([(
        "foo".to_string(),
        doc("foo", &[("1.0.0", "latest")]),
    )]));
    f.host.put("acme.foo", "1.0.0");
    let registries = registries(&f).await;

    let mut package = find_package(&registries, "acme.foo", None).await.unwrap();
    package.update_state(&f.states).await.unwrap();
    assert_eq!(package.state(), PackageState::Installed);

    let host = f.host.clone();
    let states = f.states.clone();
    let id = package.id().clone();
    f.states
        .wait_for_plugin_change_with(
            async move {
                host.uninstall(&id).await.unwrap();
                states.handle_local_change().await;
            },
            Duration::from_secs(5),
        )
        .await;

    package.update_state(&f.states).await.unwrap();
    assert_eq!(package.state(), PackageState::Available);
}
