//! Registry aggregation and package resolution for editor plugins.
//!
//! Plugins are distributed through arbitrary package registries rather than a
//! curated marketplace. This crate aggregates the configured registries,
//! resolves identifiers to concrete downloadable artifacts for a tracked
//! release channel, and computes the UI-facing state of each package against
//! the reconciled installed-state ground truth from `plug-state`.

pub mod config;
pub mod context;
pub mod error;
pub mod jsonc;
pub mod package;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

/// Name of the per-workspace-folder registry configuration file.
pub const FOLDER_CONFIG_FILENAME: &str = ".plugin-registries.json";

pub use config::{
    CHANNELS_KEY, ChannelSettings, ConfigurationStore, DEFAULT_CHANNEL, EXECUTION_OVERRIDES_KEY,
    REGISTRIES_KEY, RegistryConfig, RegistrySource, SearchQuery, execution_overrides,
    user_registries_from_value,
};
pub use context::SessionContext;
pub use error::Error;
pub use package::{ArtifactError, Package, PackageRef, PackageState};
pub use provider::RegistryProvider;
pub use registry::{MAX_SEARCH_RESULTS, Registry, VersionInfo};
pub use resolver::{find_package, get_package_channels, get_package_versions};
pub use transport::{PackageMetadata, RegistryTransport, TransportError, TransportFactory};
