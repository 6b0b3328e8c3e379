//! One resolvable version of a plugin, with its computed UI state.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use plug_manifest::{ExecutionPreference, PluginId, PluginManifest};
use plug_state::{ExecutionLocation, InstalledPluginInfo, PluginStateService};
use serde_json::Value;

use crate::config::DEFAULT_CHANNEL;
use crate::error::Result;
use crate::registry::Registry;

/// UI-facing state of a package, computed against reconciled installed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Available,
    Installed,
    InstalledRemote,
    /// Installed while tracking a non-default channel.
    InstalledPrerelease,
    UpdateAvailable,
    Invalid,
}

/// Why no artifact could be selected for this package.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    #[error("no artifact for platform '{0}' and no default entry")]
    MissingForPlatform(String),
    #[error("no distributable artifact in the files list")]
    MissingFromFiles,
}

/// File extensions recognized as distributable artifacts when scanning the
/// manifest's `files` list.
const ARTIFACT_EXTENSIONS: &[&str] = &[".bin", ".tgz", ".tar.gz", ".zip"];

fn is_artifact_name(name: &str) -> bool {
    ARTIFACT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// One resolved version of a plugin's registry manifest.
///
/// Everything except the installed-state snapshot is fixed at construction;
/// packages are recreated, not mutated, when registry data changes. Call
/// [`update_state`](Self::update_state) before trusting any state-dependent
/// getter.
#[derive(Debug, Clone)]
pub struct Package {
    manifest: PluginManifest,
    registry_name: String,
    channel: String,
    id: PluginId,
    artifact: std::result::Result<String, ArtifactError>,
    installed: Option<InstalledPluginInfo>,
}

impl Package {
    /// Validate an untyped per-version metadata object and construct the
    /// package tracking `channel`.
    ///
    /// Validation failure is a hard failure here:
    /// [`NotAPlugin`](plug_manifest::Error::NotAPlugin) for non-plugin
    /// packages, a type error for malformed plugins. Artifact selection for
    /// `platform` happens once, now; the result never changes afterwards.
    pub fn from_value(
        value: &Value,
        registry_name: &str,
        channel: &str,
        platform: &str,
    ) -> Result<Self> {
        let manifest = PluginManifest::from_value(value)?;
        let artifact = select_artifact(&manifest, platform);
        let id = PluginId::new(
            manifest.publisher.clone().unwrap_or_default(),
            manifest.name.clone(),
        );
        Ok(Self {
            manifest,
            registry_name: registry_name.to_string(),
            channel: channel.to_string(),
            id,
            artifact,
            installed: None,
        })
    }

    /// Canonical `publisher.name` identifier.
    pub fn id(&self) -> &PluginId {
        &self.id
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Display name, falling back to the bare package name.
    pub fn display_name(&self) -> &str {
        self.manifest
            .display_name
            .as_deref()
            .unwrap_or(&self.manifest.name)
    }

    /// Description, falling back to the bare package name.
    pub fn description(&self) -> &str {
        self.manifest
            .description
            .as_deref()
            .unwrap_or(&self.manifest.name)
    }

    /// `name@version` spec for downloads; just the name when the manifest
    /// carries no version.
    pub fn spec(&self) -> String {
        match &self.manifest.version {
            Some(version) => format!("{}@{}", self.manifest.name, version),
            None => self.manifest.name.clone(),
        }
    }

    /// The manifest's own version, when present and parseable.
    pub fn version(&self) -> Option<semver::Version> {
        self.manifest
            .version
            .as_deref()
            .and_then(|v| semver::Version::parse(v).ok())
    }

    /// Name of the registry this package was resolved from.
    pub fn registry_name(&self) -> &str {
        &self.registry_name
    }

    /// Channel this package tracks (a dist-tag name or a pinned version).
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Artifact path selected at construction.
    pub fn artifact_file(&self) -> std::result::Result<&str, &ArtifactError> {
        self.artifact.as_deref()
    }

    /// A package is valid when it has a publisher and a selectable artifact.
    pub fn is_valid(&self) -> bool {
        self.manifest.publisher.as_deref().is_some_and(|p| !p.is_empty())
            && self.artifact.is_ok()
    }

    /// Refresh the installed-state snapshot from ground truth.
    ///
    /// Safe to call repeatedly; idempotent modulo underlying changes.
    pub async fn update_state(&mut self, states: &PluginStateService) -> Result<()> {
        self.installed = states.get_plugin(&self.id).await?;
        Ok(())
    }

    /// Installed version, after [`update_state`](Self::update_state).
    pub fn installed_version(&self) -> Option<&semver::Version> {
        self.installed.as_ref().map(|info| &info.version)
    }

    /// Where the installed instance runs, after
    /// [`update_state`](Self::update_state).
    pub fn installed_location(&self) -> Option<ExecutionLocation> {
        self.installed.as_ref().map(|info| info.location)
    }

    /// Whether the last state refresh found the plugin installed.
    pub fn is_installed(&self) -> bool {
        self.installed.is_some()
    }

    /// Pure function of the current fields; call
    /// [`update_state`](Self::update_state) first.
    ///
    /// Invalid dominates everything. An installed older version shows as
    /// UpdateAvailable; an installed package on a non-default channel as
    /// InstalledPrerelease; otherwise Installed/InstalledRemote by location,
    /// or Available when not installed.
    pub fn state(&self) -> PackageState {
        if !self.is_valid() {
            return PackageState::Invalid;
        }
        let Some(installed) = &self.installed else {
            return PackageState::Available;
        };
        if let Some(manifest_version) = self.version() {
            if installed.version < manifest_version {
                return PackageState::UpdateAvailable;
            }
        }
        if self.channel != DEFAULT_CHANNEL {
            return PackageState::InstalledPrerelease;
        }
        match installed.location {
            ExecutionLocation::Local => PackageState::Installed,
            ExecutionLocation::Remote => PackageState::InstalledRemote,
        }
    }

    /// Advisory execution location before any ground truth exists, mirroring
    /// the host's own inference rules. Once real install state is known it
    /// overrides this heuristic.
    pub fn inferred_location(
        &self,
        overrides: &BTreeMap<String, ExecutionLocation>,
    ) -> ExecutionLocation {
        if let Some(location) = overrides.get(&self.id.key()) {
            return *location;
        }
        if let Some(pref) = self.manifest.preferred_execution {
            return match pref {
                ExecutionPreference::Ui => ExecutionLocation::Local,
                ExecutionPreference::Workspace => ExecutionLocation::Remote,
            };
        }
        if self.manifest.entry_point.is_some() {
            return ExecutionLocation::Remote;
        }
        if self
            .manifest
            .plugin_dependencies
            .as_ref()
            .is_some_and(|deps| !deps.is_empty())
        {
            return ExecutionLocation::Remote;
        }
        ExecutionLocation::Local
    }

    /// Case-insensitive ordering on display name, for stable list sorting.
    pub fn compare(a: &Self, b: &Self) -> Ordering {
        a.display_name()
            .to_lowercase()
            .cmp(&b.display_name().to_lowercase())
    }
}

fn select_artifact(
    manifest: &PluginManifest,
    platform: &str,
) -> std::result::Result<String, ArtifactError> {
    if let Some(map) = &manifest.os_specific_artifact {
        // An explicit map wins even when empty; files are not a fallback.
        return map
            .get(platform)
            .or_else(|| map.get("default"))
            .cloned()
            .ok_or_else(|| ArtifactError::MissingForPlatform(platform.to_string()));
    }
    manifest
        .files
        .iter()
        .flatten()
        .find(|f| is_artifact_name(f))
        .cloned()
        .ok_or(ArtifactError::MissingFromFiles)
}

/// A package argument that may already be resolved or may still be a bare
/// identifier string.
#[derive(Debug, Clone)]
pub enum PackageRef {
    Resolved(Box<Package>),
    ById(String),
}

impl PackageRef {
    /// Resolve to a concrete package, fetching from `registry` when only an
    /// identifier is known.
    pub async fn resolve(self, registry: &Registry) -> Result<Package> {
        match self {
            Self::Resolved(package) => Ok(*package),
            Self::ById(id) => {
                let name = id.split_once('.').map_or(id.as_str(), |(_, name)| name);
                registry.get_package(name, None).await
            }
        }
    }

    /// Download spec without resolving: the package's `name@version`, or the
    /// raw string as given.
    pub fn spec(&self) -> String {
        match self {
            Self::Resolved(package) => package.spec(),
            Self::ById(id) => id.clone(),
        }
    }
}
