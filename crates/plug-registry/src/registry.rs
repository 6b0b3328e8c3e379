//! A single configured registry endpoint.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use plug_manifest::PluginId;
use tokio::sync::Mutex;

use crate::config::{ChannelSettings, DEFAULT_CHANNEL, RegistryConfig, RegistrySource};
use crate::context::SessionContext;
use crate::error::{Error, Result};
use crate::package::{Package, PackageRef};
use crate::transport::{PackageMetadata, RegistryTransport};

/// Hard cap on aggregated search results. A registry that keeps handing back
/// full pages past this point is ignoring pagination parameters.
pub const MAX_SEARCH_RESULTS: usize = 1000;

/// A version with its optional publish timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: semver::Version,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One registry endpoint plus its search-scoping options.
///
/// Owns no state worth preserving; registries are rebuilt from configuration
/// whenever it changes. The download cache on disk is the only thing that
/// outlives an instance.
#[derive(Clone)]
pub struct Registry {
    config: RegistryConfig,
    source: RegistrySource,
    transport: Arc<dyn RegistryTransport>,
    ctx: Arc<SessionContext>,
    /// Per-destination locks serializing the exists-check-then-extract
    /// sequence in [`download_package`](Self::download_package).
    download_locks: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl Registry {
    pub fn new(
        config: RegistryConfig,
        source: RegistrySource,
        transport: Arc<dyn RegistryTransport>,
        ctx: Arc<SessionContext>,
    ) -> Self {
        Self {
            config,
            source,
            transport,
            ctx,
            download_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn source(&self) -> RegistrySource {
        self.source
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Equality for deduplication; see [`RegistryConfig::matches`].
    pub fn matches(&self, other: &Self) -> bool {
        self.config.matches(&other.config)
    }

    /// Enumerate every package this registry's search query yields.
    ///
    /// Pages through the search endpoint until a short page, the configured
    /// single-page mode, or the [`MAX_SEARCH_RESULTS`] cap. Each hit's full
    /// metadata is fetched, validated, and wrapped into a [`Package`] with
    /// its installed state already refreshed. Non-plugins are skipped
    /// silently; any other per-hit failure is logged and skipped, keeping
    /// partial failure non-fatal to the enumeration.
    pub async fn get_packages(&self) -> Result<Vec<Package>> {
        let raw = self.search_all().await?;
        let channels = ChannelSettings::load(self.ctx.settings.as_ref());

        let mut packages = Vec::with_capacity(raw.len());
        for hit in &raw {
            match self.resolve_by_name(&hit.name, None, &channels).await {
                Ok(package) => packages.push(package),
                Err(e) if matches!(e, Error::Manifest(plug_manifest::Error::NotAPlugin { .. })) => {
                    tracing::debug!(name = %hit.name, "skipping non-plugin search result");
                }
                Err(e) => {
                    tracing::warn!(name = %hit.name, error = %e, "skipping search result");
                }
            }
        }

        self.refresh_states(&mut packages).await?;
        Ok(packages)
    }

    async fn search_all(&self) -> Result<Vec<plug_manifest::RawSearchResult>> {
        let query = self.config.query.normalized();
        let limit = self.config.limit.max(1);
        let mut raw = Vec::new();
        let mut from = 0;
        loop {
            let page = self.transport.search(&query, from, limit).await?;
            let fetched = page.len();
            raw.extend(page);
            if raw.len() >= MAX_SEARCH_RESULTS {
                tracing::warn!(
                    registry = %self.config.name,
                    cap = MAX_SEARCH_RESULTS,
                    "registry returned too many results; it may be ignoring \
                     pagination parameters — consider disabling pagination for it"
                );
                raw.truncate(MAX_SEARCH_RESULTS);
                break;
            }
            if !self.config.enable_pagination || fetched < limit {
                break;
            }
            from += fetched;
        }
        Ok(raw)
    }

    /// Warm the installed-state cache for all packages concurrently, then
    /// snapshot each one.
    async fn refresh_states(&self, packages: &mut [Package]) -> Result<()> {
        let mut warmups = tokio::task::JoinSet::new();
        for package in packages.iter() {
            let states = Arc::clone(&self.ctx.plugin_states);
            let id = package.id().clone();
            warmups.spawn(async move {
                let _ = states.get_plugin(&id).await;
            });
        }
        while warmups.join_next().await.is_some() {}

        for package in packages.iter_mut() {
            package.update_state(&self.ctx.plugin_states).await?;
        }
        Ok(())
    }

    /// Resolve one package by bare name.
    ///
    /// With no explicit version or channel, the channel configured for the
    /// plugin (default `latest`) is used. The requested channel is resolved
    /// against the dist-tag map first, then treated as a literal version key;
    /// when neither resolves the failure is [`Error::VersionMissing`], which
    /// callers surface with a channel-setting remediation hint.
    pub async fn get_package(&self, name: &str, version_or_channel: Option<&str>) -> Result<Package> {
        let channels = ChannelSettings::load(self.ctx.settings.as_ref());
        self.resolve_by_name(name, version_or_channel, &channels).await
    }

    async fn resolve_by_name(
        &self,
        name: &str,
        version_or_channel: Option<&str>,
        channels: &ChannelSettings,
    ) -> Result<Package> {
        let meta = self.transport.metadata(name).await?;
        let requested = match version_or_channel {
            Some(requested) => requested.to_string(),
            None => effective_channel(&meta, channels),
        };

        let version = meta
            .tagged_version(&requested)
            .map(str::to_string)
            .or_else(|| {
                meta.versions
                    .contains_key(&requested)
                    .then(|| requested.clone())
            })
            .ok_or_else(|| Error::VersionMissing {
                name: meta.name.clone(),
                requested: requested.clone(),
            })?;
        let value = meta.versions.get(&version).ok_or_else(|| Error::VersionMissing {
            name: meta.name.clone(),
            requested: requested.clone(),
        })?;

        Package::from_value(value, &self.config.name, &requested, &self.ctx.platform)
    }

    /// All published versions, newest first.
    pub async fn get_package_versions(&self, name: &str) -> Result<Vec<VersionInfo>> {
        let meta = self.transport.metadata(name).await?;
        let mut versions: Vec<VersionInfo> = meta
            .versions
            .keys()
            .filter_map(|raw| match semver::Version::parse(raw) {
                Ok(version) => Some(VersionInfo {
                    version,
                    timestamp: meta.time.get(raw).copied(),
                }),
                Err(_) => {
                    tracing::debug!(name, version = %raw, "ignoring unparseable version");
                    None
                }
            })
            .collect();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    /// The dist-tag map reshaped to channel-name → version info.
    pub async fn get_package_channels(&self, name: &str) -> Result<BTreeMap<String, VersionInfo>> {
        let meta = self.transport.metadata(name).await?;
        let mut channels = BTreeMap::new();
        for (tag, raw) in &meta.dist_tags {
            match semver::Version::parse(raw) {
                Ok(version) => {
                    channels.insert(
                        tag.clone(),
                        VersionInfo {
                            version,
                            timestamp: meta.time.get(raw).copied(),
                        },
                    );
                }
                Err(_) => {
                    tracing::debug!(name, tag, version = %raw, "ignoring unparseable dist-tag");
                }
            }
        }
        Ok(channels)
    }

    /// Download and extract a package's artifact, reusing a previous
    /// download when the destination already exists.
    ///
    /// The exists-check and extraction are serialized per destination so two
    /// interleaved calls cannot both start extracting to the same path.
    pub async fn download_package(&self, package: &PackageRef) -> Result<PathBuf> {
        let spec = package.spec();
        let dest = self
            .ctx
            .cache_root
            .join(sanitize(self.identity()))
            .join(sanitize(&spec));

        let lock = {
            let mut locks = self.download_locks.lock().await;
            Arc::clone(
                locks
                    .entry(dest.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let _guard = lock.lock().await;

        if tokio::fs::try_exists(&dest).await? {
            tracing::debug!(spec, dest = %dest.display(), "reusing cached download");
            return Ok(dest);
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.transport.extract(&spec, &dest).await?;
        Ok(dest)
    }

    /// Stable identity for on-disk cache paths: the endpoint when configured,
    /// else the display name.
    fn identity(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(&self.config.name)
    }
}

// The transport and context are trait objects with nothing useful to print.
impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Channel to track for a plugin with no explicit request: look up the
/// per-plugin override keyed by the latest release's publisher, defaulting
/// to `latest`.
fn effective_channel(meta: &PackageMetadata, channels: &ChannelSettings) -> String {
    let publisher = meta
        .tagged_version(DEFAULT_CHANNEL)
        .and_then(|version| meta.versions.get(version))
        .and_then(|value| value.get("publisher"))
        .and_then(|value| value.as_str())
        .unwrap_or_default();
    let id = PluginId::new(publisher, meta.name.clone());
    channels.tracked_channel(&id).to_string()
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
