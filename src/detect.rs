//! Detection of already-installed companion packages.

use crate::manifest::contains_dependency;
use crate::package_kind::PackageKind;
use futures::future::join_all;
use regex::Regex;
use semver::Version;
use std::path::{Path, PathBuf};

/// Metadata for a companion package found in the host project.
#[derive(Debug, Clone)]
pub struct PackageStatus {
    /// Which package was found.
    pub kind: PackageKind,
    /// Checkout folder inside the packages directory.
    pub path: PathBuf,
    /// Version parsed from the package's own manifest, when readable.
    pub version: Option<Version>,
}

/// Overall verdict on the host project.
///
/// `Satisfied` means every companion package is already present; the
/// bootstrap has nothing to do and skips the run entirely. This is a
/// verdict, not an error.
#[derive(Debug, Clone)]
pub enum EnvironmentStatus {
    /// Every companion package is present.
    Satisfied {
        /// The packages that were found.
        packages: Vec<PackageStatus>,
    },
    /// At least one companion package is missing.
    Missing {
        /// The packages that were not found.
        absent: Vec<PackageKind>,
    },
}

impl EnvironmentStatus {
    /// Whether the toolkit is already fully installed.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }
}

/// Detect a single companion package.
///
/// A package counts as present when its id appears in the project manifest
/// and its checkout folder exists in the packages directory. The version is
/// best-effort metadata read from the checkout's own `package.json`;
/// failure to parse it does not make the package absent.
pub async fn detect_package(
    kind: PackageKind,
    manifest_path: &Path,
    packages_dir: &Path,
) -> Option<PackageStatus> {
    let source = kind.source();

    let in_manifest = contains_dependency(manifest_path, source.manifest_id).unwrap_or(false);
    if !in_manifest {
        return None;
    }

    let path = packages_dir.join(source.folder_name);
    if !path.exists() {
        return None;
    }

    let version = std::fs::read_to_string(path.join("package.json"))
        .ok()
        .and_then(|content| parse_package_version(&content));

    Some(PackageStatus { kind, path, version })
}

/// Detect all companion packages and form the overall verdict.
///
/// Packages are probed concurrently; the verdict is `Satisfied` only when
/// every package is present.
///
/// # Example
///
/// ```rust,no_run
/// use relaykit_bootstrap::detect_environment;
/// use std::path::Path;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let status = detect_environment(
///         Path::new("Packages/manifest.json"),
///         Path::new("Packages"),
///     )
///     .await;
///     println!("already installed: {}", status.is_satisfied());
/// }
/// ```
pub async fn detect_environment(manifest_path: &Path, packages_dir: &Path) -> EnvironmentStatus {
    let probes: Vec<_> = PackageKind::all()
        .map(|kind| async move { (kind, detect_package(kind, manifest_path, packages_dir).await) })
        .collect();

    let mut packages = Vec::new();
    let mut absent = Vec::new();
    for (kind, status) in join_all(probes).await {
        match status {
            Some(found) => packages.push(found),
            None => absent.push(kind),
        }
    }

    if absent.is_empty() {
        EnvironmentStatus::Satisfied { packages }
    } else {
        EnvironmentStatus::Missing { absent }
    }
}

/// Extract a semantic version from a package manifest body.
fn parse_package_version(content: &str) -> Option<Version> {
    let re = Regex::new(r#""version"\s*:\s*"(\d+\.\d+\.\d+)""#).expect("Invalid version regex");
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Version::parse(m.as_str()).ok())
}
