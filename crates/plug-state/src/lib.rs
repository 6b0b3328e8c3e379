//! Installed-plugin state reconciliation.
//!
//! Ground truth about what is installed lives with the host editor, split
//! across the local machine and an optional remote execution host. This crate
//! caches that knowledge, invalidates it selectively as either machine
//! changes, and provides the change-wait protocol install flows need.

pub mod bridge;
pub mod error;
pub mod host;
pub mod service;

pub use bridge::{RemoteBridge, RemotePluginQuery, RemotePluginReply};
pub use error::Error;
pub use host::{ExecutionLocation, HostPluginManager, InstalledPluginInfo};
pub use service::PluginStateService;
