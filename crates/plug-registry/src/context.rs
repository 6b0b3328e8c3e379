//! Shared session context for registry operations.

use std::path::PathBuf;
use std::sync::Arc;

use plug_state::PluginStateService;

use crate::config::ConfigurationStore;

/// Everything a [`Registry`](crate::Registry) needs besides its own config:
/// settings access, the installed-state service, the platform id used for
/// artifact selection, and the download cache root.
///
/// Owned explicitly and passed by reference; lifecycle is tied to the editor
/// session, not the process.
pub struct SessionContext {
    pub settings: Arc<dyn ConfigurationStore>,
    pub plugin_states: Arc<PluginStateService>,
    /// Platform identifier artifacts are selected for (e.g. `linux-x64`).
    /// When a remote host is attached this is the remote's platform.
    pub platform: String,
    pub cache_root: PathBuf,
}

impl SessionContext {
    pub fn new(
        settings: Arc<dyn ConfigurationStore>,
        plugin_states: Arc<PluginStateService>,
        platform: String,
        cache_root: Option<PathBuf>,
    ) -> Self {
        let cache_root = cache_root.unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("plugin-registries")
        });
        Self {
            settings,
            plugin_states,
            platform,
            cache_root,
        }
    }

    /// Platform id of the machine this process runs on.
    pub fn local_platform() -> String {
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }
}
