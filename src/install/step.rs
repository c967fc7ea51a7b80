//! Coarse install steps shown to the operator.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Step code the bundled installer reports when it has finished.
///
/// The bundled installer reports fine-grained numeric step codes while it
/// runs; only the final code changes the coarse step shown here.
pub const INSTALLER_DONE_CODE: i32 = 11;

/// Coarse phases of a bootstrap run, in execution order.
///
/// `Idle` is the pre-run sentinel and takes no part in progress math.
/// Within one run the step never regresses; [`crate::InstallStateMachine`]
/// enforces this, and `reset` is the only way back to `Idle`.
///
/// # Example
///
/// ```rust
/// use relaykit_bootstrap::InstallStep;
///
/// assert!(InstallStep::CheckEnvironment < InstallStep::Complete);
/// assert_eq!(InstallStep::Complete.fraction(), 1.0);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
)]
pub enum InstallStep {
    /// No run in progress.
    Idle,
    /// Checking whether the toolkit is already installed.
    CheckEnvironment,
    /// Preparing the package downloads.
    DownloadPackages,
    /// Fetching the core kit package.
    FetchCoreKit,
    /// Fetching the bundled installer package.
    FetchInstallerKit,
    /// Waiting for package resolution and locating the bundled installer.
    LaunchInstaller,
    /// The bundled installer is running.
    RunInstaller,
    /// The bootstrap run finished.
    Complete,
}

impl InstallStep {
    /// Ordinal of this step among the real (non-`Idle`) steps.
    ///
    /// Returns `None` for the `Idle` sentinel.
    pub fn ordinal(&self) -> Option<usize> {
        if *self == Self::Idle {
            return None;
        }
        Self::iter().position(|s| s == *self).map(|i| i - 1)
    }

    /// Progress fraction this step alone accounts for: `ordinal / (steps - 1)`.
    ///
    /// `Idle` maps to 0.0 and `Complete` to 1.0.
    pub fn fraction(&self) -> f64 {
        let last = Self::iter().count() - 2;
        match self.ordinal() {
            Some(i) => i as f64 / last as f64,
            None => 0.0,
        }
    }

    /// Human-readable label for progress surfaces.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::CheckEnvironment => "Checking environment",
            Self::DownloadPackages => "Preparing downloads",
            Self::FetchCoreKit => "Fetching core kit",
            Self::FetchInstallerKit => "Fetching installer package",
            Self::LaunchInstaller => "Launching installer",
            Self::RunInstaller => "Running installer",
            Self::Complete => "Complete",
        }
    }

    /// Map a step code reported by the bundled installer onto a coarse step.
    ///
    /// The installer reports codes 0 through 11 while it runs. Code 11 means
    /// it finished; everything else, including codes this crate has never
    /// seen, collapses to [`InstallStep::RunInstaller`]. Total function,
    /// never fails.
    ///
    /// # Example
    ///
    /// ```rust
    /// use relaykit_bootstrap::InstallStep;
    ///
    /// assert_eq!(InstallStep::from_installer_code(11), InstallStep::Complete);
    /// assert_eq!(InstallStep::from_installer_code(4), InstallStep::RunInstaller);
    /// assert_eq!(InstallStep::from_installer_code(-3), InstallStep::RunInstaller);
    /// ```
    pub fn from_installer_code(code: i32) -> Self {
        if code == INSTALLER_DONE_CODE {
            Self::Complete
        } else {
            Self::RunInstaller
        }
    }
}
