//! Interface to the editor's native plugin manager.

use async_trait::async_trait;
use plug_manifest::PluginId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// Whether a plugin instance runs with the UI or on the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionLocation {
    Local,
    Remote,
}

/// Ground truth about one installed plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPluginInfo {
    pub id: PluginId,
    pub location: ExecutionLocation,
    pub version: semver::Version,
}

/// The editor's install surface, local machine only.
///
/// The install/uninstall commands resolve before the editor's own bookkeeping
/// necessarily reflects the change; callers must not treat their completion
/// as a readiness signal. See
/// [`PluginStateService::wait_for_plugin_change`](crate::PluginStateService::wait_for_plugin_change).
#[async_trait]
pub trait HostPluginManager: Send + Sync {
    /// Look up an installed plugin by identifier, case-insensitively.
    async fn get_installed(&self, id: &PluginId) -> Result<Option<InstalledPluginInfo>>;

    /// Install from a downloaded artifact on the local filesystem.
    async fn install(&self, artifact: &std::path::Path) -> Result<()>;

    /// Uninstall by identifier.
    async fn uninstall(&self, id: &PluginId) -> Result<()>;

    /// Subscribe to the payloadless "installed set changed" notification for
    /// the local machine.
    fn subscribe_changes(&self) -> broadcast::Receiver<()>;
}
