use std::path::PathBuf;

use crate::transport::TransportError;

/// Errors that can occur while resolving registries and packages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Manifest validation failure, including the not-a-plugin case that
    /// enumeration loops skip silently.
    #[error(transparent)]
    Manifest(#[from] plug_manifest::Error),

    /// Installed-state lookup failure.
    #[error(transparent)]
    State(#[from] plug_state::Error),

    /// Registry transport failure. A 404-equivalent is not fatal in
    /// multi-registry searches; see [`Error::is_not_found`].
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The requested channel or version does not exist for this plugin.
    ///
    /// Distinct from other failures so callers can point the user at their
    /// channel setting instead of showing a generic error.
    #[error(
        "plugin '{name}' has no version or channel '{requested}'; \
         check the release channel configured for this plugin"
    )]
    VersionMissing { name: String, requested: String },

    /// No configured registry has the package.
    #[error("cannot find package '{name}' in any known registry")]
    PackageNotFound { name: String },

    /// The user-level registries setting is not an array. There is no safe
    /// partial interpretation, so this is fatal to the whole read.
    #[error("registries setting: expected an array, got {actual}")]
    RegistriesNotArray { actual: String },

    /// One entry of the user-level registries array is malformed.
    #[error("registries[{index}]: field '{field}' expected {expected}, got {actual}")]
    RegistryEntry {
        index: usize,
        field: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// A workspace folder's registry configuration file failed to parse.
    #[error("failed to parse {}: {reason}", path.display())]
    FolderConfig { path: PathBuf, reason: String },

    /// Filesystem failure in the download cache.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a setting back to the configuration store failed.
    #[error("failed to update setting '{key}': {reason}")]
    SettingsWrite { key: String, reason: String },
}

impl Error {
    /// Whether this is a registry answering "no such package", which
    /// multi-registry searches treat as "try the next one".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Transport(t) if t.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
