//! The installed-state reconciliation service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use plug_manifest::PluginId;
use tokio::sync::{Mutex, broadcast};

use crate::bridge::{RemoteBridge, RemotePluginQuery};
use crate::error::{Error, Result};
use crate::host::{ExecutionLocation, HostPluginManager, InstalledPluginInfo};

/// How long to wait for a change notification after an install/uninstall
/// command resolves, before falling back to re-querying ground truth.
pub const CHANGE_WAIT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Capacity of the unified change broadcast. Events carry no payload, so a
/// lagging receiver only ever misses redundant wake-ups.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Cached knowledge about one identifier. A missing map entry means the
/// identifier has not been queried this session.
#[derive(Debug, Clone)]
enum CacheEntry {
    /// Queried; not installed on either machine.
    Absent,
    /// Queried; installed with this ground truth.
    Present(InstalledPluginInfo),
}

/// Caches which plugins are installed where, across the local machine and an
/// optional remote host.
///
/// Install and uninstall are inherently racy against the editor's own
/// bookkeeping, so the cache is invalidated by change events rather than by
/// the commands that caused the change. Each machine's change event
/// invalidates only the entries that machine could have affected: confirmed
/// absences (the plugin may have just appeared there) and entries attributed
/// to that machine. Entries attributed to the machine that did *not* change
/// stay cached.
pub struct PluginStateService {
    host: Arc<dyn HostPluginManager>,
    bridge: Option<Arc<dyn RemoteBridge>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    change_tx: broadcast::Sender<()>,
}

impl PluginStateService {
    pub fn new(host: Arc<dyn HostPluginManager>, bridge: Option<Arc<dyn RemoteBridge>>) -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            host,
            bridge,
            cache: Mutex::new(HashMap::new()),
            change_tx,
        }
    }

    /// Forward the host's and bridge's change notifications into this
    /// service's invalidation logic for the lifetime of the service.
    pub fn spawn_listeners(self: &Arc<Self>) {
        let service = Arc::clone(self);
        let mut local_rx = self.host.subscribe_changes();
        tokio::spawn(async move {
            while local_rx.recv().await.is_ok() {
                service.handle_local_change().await;
            }
        });
        if let Some(bridge) = &self.bridge {
            let service = Arc::clone(self);
            let mut remote_rx = bridge.subscribe_changes();
            tokio::spawn(async move {
                while remote_rx.recv().await.is_ok() {
                    service.handle_remote_change().await;
                }
            });
        }
    }

    /// Subscribe to the unified "something changed" notification.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.change_tx.subscribe()
    }

    /// Installed-plugin lookup with caching, including explicit absence.
    ///
    /// On a miss the local machine is queried first; only when it reports
    /// nothing and a remote host is attached is the bridge consulted. Bridge
    /// failures are logged and treated as "not installed remotely".
    pub async fn get_plugin(&self, id: &PluginId) -> Result<Option<InstalledPluginInfo>> {
        let key = id.key();
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.get(&key) {
            return Ok(match entry {
                CacheEntry::Absent => None,
                CacheEntry::Present(info) => Some(info.clone()),
            });
        }

        let mut found = self.host.get_installed(id).await?;
        if found.is_none() {
            if let Some(bridge) = &self.bridge {
                found = self.query_remote(bridge, id).await;
            }
        }

        let entry = match &found {
            Some(info) => CacheEntry::Present(info.clone()),
            None => CacheEntry::Absent,
        };
        tracing::debug!(id = %id, present = found.is_some(), "caching installed-state lookup");
        cache.insert(key, entry);
        Ok(found)
    }

    async fn query_remote(
        &self,
        bridge: &Arc<dyn RemoteBridge>,
        id: &PluginId,
    ) -> Option<InstalledPluginInfo> {
        let query = RemotePluginQuery { id: id.key() };
        let reply = match bridge.get_plugin(query).await {
            Ok(reply) => reply?,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "remote plugin lookup failed; assuming not installed");
                return None;
            }
        };
        match semver::Version::parse(&reply.version) {
            Ok(version) => Some(InstalledPluginInfo {
                id: id.clone(),
                location: ExecutionLocation::Remote,
                version,
            }),
            Err(source) => {
                let e = Error::RemoteVersion {
                    id: reply.id,
                    version: reply.version,
                    source,
                };
                tracing::warn!(error = %e, "discarding unusable remote reply");
                None
            }
        }
    }

    /// The local machine's installed set changed: drop confirmed absences and
    /// entries attributed to the local machine, then notify.
    pub async fn handle_local_change(&self) {
        self.invalidate(ExecutionLocation::Local).await;
    }

    /// The remote host's installed set changed: drop confirmed absences and
    /// entries attributed to the remote host, then notify.
    pub async fn handle_remote_change(&self) {
        self.invalidate(ExecutionLocation::Remote).await;
    }

    async fn invalidate(&self, changed: ExecutionLocation) {
        let mut cache = self.cache.lock().await;
        cache.retain(|_, entry| match entry {
            CacheEntry::Absent => false,
            CacheEntry::Present(info) => info.location != changed,
        });
        drop(cache);
        // Nobody listening is fine; the event is a pure invalidation signal.
        let _ = self.change_tx.send(());
    }

    /// Run `task` while concurrently waiting for the unified change event or
    /// the default timeout, whichever fires first. Returns the task's result
    /// either way.
    ///
    /// The editor's install/uninstall commands resolve before their
    /// bookkeeping does, so "command finished" is not a readiness signal;
    /// after this returns the caller re-queries ground truth.
    pub async fn wait_for_plugin_change<T>(&self, task: impl Future<Output = T>) -> T {
        self.wait_for_plugin_change_with(task, CHANGE_WAIT_TIMEOUT)
            .await
    }

    /// [`wait_for_plugin_change`](Self::wait_for_plugin_change) with an
    /// explicit timeout.
    pub async fn wait_for_plugin_change_with<T>(
        &self,
        task: impl Future<Output = T>,
        timeout: Duration,
    ) -> T {
        // Subscribe before starting the task so a change fired while the
        // task runs is not missed.
        let mut rx = self.change_tx.subscribe();
        let wait = async move {
            tokio::select! {
                _ = rx.recv() => {}
                _ = tokio::time::sleep(timeout) => {
                    tracing::debug!("no plugin change observed within {timeout:?}");
                }
            }
            // Receiver dropped here; the subscription does not outlive the wait.
        };
        let (result, ()) = tokio::join!(task, wait);
        result
    }

    /// Re-fetch ground truth and report whether the installed version now
    /// exceeds `nominal` (the version the package was showing before an
    /// update).
    ///
    /// Missing ground truth right after an install should not happen; it is
    /// logged and reported as `false` rather than raised.
    pub async fn did_plugin_update(
        &self,
        id: &PluginId,
        nominal: &semver::Version,
    ) -> Result<bool> {
        self.cache.lock().await.remove(&id.key());
        match self.get_plugin(id).await? {
            Some(info) => Ok(info.version > *nominal),
            None => {
                tracing::warn!(id = %id, "plugin missing after update; reporting not updated");
                Ok(false)
            }
        }
    }
}
