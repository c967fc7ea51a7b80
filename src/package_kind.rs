//! Companion package identities for the Relay Kit toolkit.

use crate::install::InstallStep;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Static source information for a companion package.
///
/// Everything needed to stage one package into a host project: the id
/// written into the project manifest, the git repository it is fetched
/// from, and the folder name of its checkout inside the packages
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageSource {
    /// Identifier written under the manifest's `"dependencies"` key.
    pub manifest_id: &'static str,

    /// Git repository URL the package is cloned from.
    pub git_url: &'static str,

    /// Checkout folder name inside the host's packages directory.
    pub folder_name: &'static str,
}

/// The companion packages staged by the bootstrap.
///
/// Each variant corresponds to one git-hosted package that must be present
/// in the host project before the bundled installer can take over.
///
/// # Example
///
/// ```rust
/// use relaykit_bootstrap::PackageKind;
///
/// for kind in PackageKind::all() {
///     println!("{}: {}", kind.display_name(), kind.source().git_url);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
pub enum PackageKind {
    /// The toolkit runtime and editor integration.
    CoreKit,
    /// The bundled installer that finishes the setup after bootstrap.
    InstallerKit,
}

impl PackageKind {
    /// Source information for this package.
    pub fn source(&self) -> PackageSource {
        match self {
            Self::CoreKit => PackageSource {
                manifest_id: "com.relaykit.core",
                git_url: "https://github.com/relaykit/relaykit-core.git",
                folder_name: "com.relaykit.core",
            },
            Self::InstallerKit => PackageSource {
                manifest_id: "com.relaykit.installer",
                git_url: "https://github.com/relaykit/relaykit-installer.git",
                folder_name: "com.relaykit.installer",
            },
        }
    }

    /// Human-readable display name, suitable for progress surfaces.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CoreKit => "Relay Core Kit",
            Self::InstallerKit => "Relay Installer",
        }
    }

    /// The install step announced while this package is being fetched.
    pub fn fetch_step(&self) -> InstallStep {
        match self {
            Self::CoreKit => InstallStep::FetchCoreKit,
            Self::InstallerKit => InstallStep::FetchInstallerKit,
        }
    }

    /// Iterator over all companion packages, in staging order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use relaykit_bootstrap::PackageKind;
    ///
    /// let packages: Vec<_> = PackageKind::all().collect();
    /// assert_eq!(packages.len(), 2);
    /// ```
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}
