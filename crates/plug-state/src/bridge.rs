//! RPC-style client for the helper running on the remote execution host.
//!
//! When the session is attached to a remote host, plugins can be installed
//! there without the local machine knowing. A small helper on the remote side
//! answers lookup requests over a message round-trip; this module gives that
//! round-trip a typed request/response surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// Request: look up a plugin on the remote host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePluginQuery {
    /// Lower-cased `publisher.name` identifier.
    pub id: String,
}

/// Response: the remote helper's lightweight view of an installed plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePluginReply {
    pub id: String,
    pub version: String,
}

/// Message bridge to the remote helper.
///
/// Failures here are logged and treated as "not installed remotely" by the
/// caller; a dead bridge must never take down a search.
#[async_trait]
pub trait RemoteBridge: Send + Sync {
    /// Round-trip a plugin lookup. `Ok(None)` means the remote host answered
    /// and the plugin is not installed there.
    async fn get_plugin(&self, query: RemotePluginQuery) -> Result<Option<RemotePluginReply>>;

    /// Platform identifier of the remote host (e.g. `linux-x64`), used for
    /// artifact selection when plugins will run remotely.
    async fn platform(&self) -> Result<String>;

    /// Subscribe to the proxied "remote installed set changed" notification.
    fn subscribe_changes(&self) -> broadcast::Receiver<()>;
}
