//! Aggregation of registries from every configuration source.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{Mutex, broadcast};

use crate::FOLDER_CONFIG_FILENAME;
use crate::config::{
    REGISTRIES_KEY, RegistryConfig, RegistrySource, user_registries_from_value,
};
use crate::context::SessionContext;
use crate::error::{Error, Result};
use crate::jsonc;
use crate::package::Package;
use crate::registry::Registry;
use crate::transport::TransportFactory;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Shape of a folder's `.plugin-registries.json`, strict once the lenient
/// pre-pass has run.
#[derive(Debug, Default, Deserialize)]
struct FolderConfig {
    #[serde(default)]
    registries: Vec<RegistryConfig>,
    /// Plugin identifiers this folder recommends installing.
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Default)]
struct Cached {
    registries: Vec<Registry>,
    recommendations: Vec<String>,
}

/// Unified view over workspace-folder and user registry configuration.
///
/// Folder-defined registries come first (in folder order), then user-defined
/// ones, deduplicated keeping the first of any
/// [`Registry::matches`]-equivalent pair — so workspace registries shadow
/// duplicate user registries.
///
/// The provider holds no live file watchers itself; the editor observes the
/// config file and settings changes and calls the `handle_*` methods, which
/// invalidate the cached lists and fire a payloadless change event.
pub struct RegistryProvider {
    ctx: Arc<SessionContext>,
    factory: Arc<dyn TransportFactory>,
    folders: Mutex<Vec<PathBuf>>,
    cache: Mutex<Option<Arc<Cached>>>,
    change_tx: broadcast::Sender<()>,
}

impl RegistryProvider {
    pub fn new(
        ctx: Arc<SessionContext>,
        factory: Arc<dyn TransportFactory>,
        folders: Vec<PathBuf>,
    ) -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            ctx,
            factory,
            folders: Mutex::new(folders),
            cache: Mutex::new(None),
            change_tx,
        }
    }

    /// Subscribe to the registries-changed notification. The event carries
    /// no delta; consumers recompute lazily on their next read.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.change_tx.subscribe()
    }

    /// All configured registries, deduplicated, workspace before user.
    pub async fn get_registries(&self) -> Result<Vec<Registry>> {
        Ok(self.cached().await?.registries.clone())
    }

    /// Plugin identifiers recommended by the workspace folders, first
    /// occurrence wins.
    pub async fn recommended_plugins(&self) -> Result<Vec<String>> {
        Ok(self.cached().await?.recommendations.clone())
    }

    /// Every unique package across all registries, folded by identifier with
    /// later registries overwriting earlier ones, sorted by display name.
    ///
    /// A registry that fails its search is logged and skipped; one broken
    /// endpoint must not blank the whole listing.
    pub async fn get_unique_packages(&self) -> Result<Vec<Package>> {
        let registries = self.get_registries().await?;
        let mut unique: HashMap<String, Package> = HashMap::new();
        for registry in &registries {
            match registry.get_packages().await {
                Ok(packages) => {
                    for package in packages {
                        unique.insert(package.id().key(), package);
                    }
                }
                Err(e) => {
                    tracing::warn!(registry = %registry.name(), error = %e, "skipping registry in package listing");
                }
            }
        }
        let mut packages: Vec<Package> = unique.into_values().collect();
        packages.sort_by(Package::compare);
        Ok(packages)
    }

    /// A workspace folder was added or removed.
    pub async fn set_folders(&self, folders: Vec<PathBuf>) {
        *self.folders.lock().await = folders;
        self.invalidate().await;
    }

    /// A folder's config file was created, changed, or deleted.
    pub async fn handle_folder_config_change(&self) {
        self.invalidate().await;
    }

    /// A registries- or channels-related settings key changed.
    pub async fn handle_settings_change(&self) {
        self.invalidate().await;
    }

    async fn invalidate(&self) {
        *self.cache.lock().await = None;
        let _ = self.change_tx.send(());
    }

    async fn cached(&self) -> Result<Arc<Cached>> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let rebuilt = Arc::new(self.rebuild().await?);
        *cache = Some(Arc::clone(&rebuilt));
        Ok(rebuilt)
    }

    async fn rebuild(&self) -> Result<Cached> {
        let folders = self.folders.lock().await.clone();
        let mut configs: Vec<(RegistryConfig, RegistrySource)> = Vec::new();
        let mut recommendations: Vec<String> = Vec::new();

        for folder in &folders {
            match self.read_folder_config(folder).await {
                Ok(Some(folder_config)) => {
                    configs.extend(
                        folder_config
                            .registries
                            .into_iter()
                            .map(|c| (c, RegistrySource::Workspace)),
                    );
                    for rec in folder_config.recommendations {
                        if !recommendations.iter().any(|r| r.eq_ignore_ascii_case(&rec)) {
                            recommendations.push(rec);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(folder = %folder.display(), error = %e, "skipping unreadable folder registry config");
                }
            }
        }

        if let Some(value) = self.ctx.settings.get(REGISTRIES_KEY) {
            // Malformed top-level user config is fatal; a bad entry is not.
            configs.extend(
                user_registries_from_value(&value)?
                    .into_iter()
                    .map(|c| (c, RegistrySource::User)),
            );
        }

        let mut registries: Vec<Registry> = Vec::new();
        for (config, source) in configs {
            let transport = self.factory.create(&config);
            let registry = Registry::new(config, source, transport, Arc::clone(&self.ctx));
            if registries.iter().any(|existing| existing.matches(&registry)) {
                tracing::debug!(registry = %registry.name(), "dropping duplicate registry config");
            } else {
                registries.push(registry);
            }
        }

        Ok(Cached {
            registries,
            recommendations,
        })
    }

    async fn read_folder_config(&self, folder: &std::path::Path) -> Result<Option<FolderConfig>> {
        let path = folder.join(FOLDER_CONFIG_FILENAME);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let config = serde_json::from_str(&jsonc::strip(&text)).map_err(|e| {
            Error::FolderConfig {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Some(config))
    }
}
