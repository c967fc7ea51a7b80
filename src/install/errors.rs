//! Error types for bootstrap runs.
//!
//! Each variant carries contextual information about what went wrong plus a
//! `fix` field with an actionable suggestion for the operator. Stage-level
//! failures are usually tolerated (recorded into the run state while the
//! sequence continues); a run only returns one of these when it cannot make
//! further progress.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can end a bootstrap run.
///
/// # Example
///
/// ```rust
/// use relaykit_bootstrap::InstallError;
///
/// fn report(error: InstallError) {
///     eprintln!("bootstrap failed: {}", error);
///     eprintln!("to fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstallError {
    /// A required tool is missing from the system.
    ///
    /// The bootstrap needs a working `git` to fetch the companion packages.
    #[error("Missing prerequisite: {name}")]
    PrerequisiteMissing {
        /// Name of the missing tool (e.g., "git").
        name: String,
        /// URL where the tool can be obtained.
        install_url: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A network error occurred while fetching a package.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
        /// Standard error output from the failed command, if available.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An external process failed or could not be spawned.
    #[error("Process failed: {message}")]
    ProcessFailed {
        /// Description of the failure.
        message: String,
        /// Exit code, if the process ran to completion.
        exit_code: Option<i32>,
        /// Captured standard output, if available.
        stdout: Option<String>,
        /// Captured standard error, if available.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The host project has no package manifest at the expected path.
    #[error("Manifest not found at {path}")]
    ManifestNotFound {
        /// Where the manifest was expected.
        path: PathBuf,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The manifest exists but could not be patched.
    #[error("Failed to patch manifest at {path}: {message}")]
    ManifestPatch {
        /// The manifest that was being patched.
        path: PathBuf,
        /// What went wrong.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The bundled installer never became available for the handoff.
    ///
    /// The only failure with built-in retry: the bootstrap re-polls with
    /// escalating backoff before surfacing this.
    #[error("Bundled installer not available after {cycles} poll cycles")]
    InstallerUnavailable {
        /// Poll cycles spent waiting.
        cycles: u32,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The bundled installer was invoked and reported a failure.
    #[error("Bundled installer failed: {message}")]
    HandoffFailed {
        /// The installer's failure message.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

impl InstallError {
    /// Get an actionable suggestion for fixing this error.
    ///
    /// Every variant includes a fix suggestion the operator can follow.
    ///
    /// # Example
    ///
    /// ```rust
    /// use relaykit_bootstrap::InstallError;
    ///
    /// let error = InstallError::InstallerUnavailable {
    ///     cycles: 3,
    ///     fix: "Re-open the project and run the bootstrap again".to_string(),
    /// };
    /// assert!(error.fix_suggestion().contains("again"));
    /// ```
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::PrerequisiteMissing { fix, .. } => fix,
            Self::Network { fix, .. } => fix,
            Self::ProcessFailed { fix, .. } => fix,
            Self::ManifestNotFound { fix, .. } => fix,
            Self::ManifestPatch { fix, .. } => fix,
            Self::InstallerUnavailable { fix, .. } => fix,
            Self::HandoffFailed { fix, .. } => fix,
        }
    }
}
