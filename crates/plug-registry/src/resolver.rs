//! Package lookup across an ordered list of registries.
//!
//! Registries are keyed by bare package name, so identifiers are stripped of
//! their publisher before lookup. A registry answering "no such package" is
//! not an error; the next registry is tried. Any other failure is fatal to
//! the whole lookup.

use std::collections::BTreeMap;

use plug_manifest::PluginId;

use crate::error::{Error, Result};
use crate::package::Package;
use crate::registry::{Registry, VersionInfo};

/// Bare package name from an identifier that may carry a publisher.
fn bare_name(identifier: &str) -> &str {
    match PluginId::parse(identifier) {
        Ok(_) => identifier
            .split_once('.')
            .map_or(identifier, |(_, name)| name),
        Err(_) => identifier,
    }
}

/// Resolve `identifier` against `registries` in order, returning the first
/// registry's match.
pub async fn find_package(
    registries: &[Registry],
    identifier: &str,
    version_or_channel: Option<&str>,
) -> Result<Package> {
    let name = bare_name(identifier);
    for registry in registries {
        match registry.get_package(name, version_or_channel).await {
            Ok(package) => return Ok(package),
            Err(e) if e.is_not_found() => {
                tracing::debug!(registry = %registry.name(), name, "package not in registry; trying next");
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::PackageNotFound {
        name: name.to_string(),
    })
}

/// All versions of `identifier` across every registry that has it, merged
/// and deduplicated by version (later registries overwrite), newest first.
pub async fn get_package_versions(
    registries: &[Registry],
    identifier: &str,
) -> Result<Vec<VersionInfo>> {
    let name = bare_name(identifier);
    let mut merged: BTreeMap<semver::Version, VersionInfo> = BTreeMap::new();
    let mut found = false;
    for registry in registries {
        match registry.get_package_versions(name).await {
            Ok(versions) => {
                found = true;
                for info in versions {
                    merged.insert(info.version.clone(), info);
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }
    if !found {
        return Err(Error::PackageNotFound {
            name: name.to_string(),
        });
    }
    Ok(merged.into_values().rev().collect())
}

/// All channels of `identifier` across every registry that has it, merged by
/// channel name (later registries overwrite).
pub async fn get_package_channels(
    registries: &[Registry],
    identifier: &str,
) -> Result<BTreeMap<String, VersionInfo>> {
    let name = bare_name(identifier);
    let mut merged: BTreeMap<String, VersionInfo> = BTreeMap::new();
    let mut found = false;
    for registry in registries {
        match registry.get_package_channels(name).await {
            Ok(channels) => {
                found = true;
                merged.extend(channels);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }
    if !found {
        return Err(Error::PackageNotFound {
            name: name.to_string(),
        });
    }
    Ok(merged)
}
