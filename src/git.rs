//! Git operations used to fetch companion packages.

use crate::install::InstallError;
use crate::process::{find_executable, ProcessRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Thin wrapper over the system `git` binary.
///
/// Locating the binary happens once at construction; every clone goes
/// through the shared [`ProcessRunner`] so the whole git surface can be
/// faked in tests.
pub struct GitClient {
    runner: Arc<dyn ProcessRunner>,
    program: PathBuf,
}

impl GitClient {
    /// Locate `git` and build a client.
    ///
    /// Returns [`InstallError::PrerequisiteMissing`] when no git binary can
    /// be found in PATH or the usual fallback locations.
    pub fn locate(runner: Arc<dyn ProcessRunner>) -> Result<Self, InstallError> {
        let program = find_executable("git").ok_or_else(|| InstallError::PrerequisiteMissing {
            name: "git".to_string(),
            install_url: Some("https://git-scm.com/downloads".to_string()),
            fix: "Install git from https://git-scm.com/downloads and re-run the bootstrap"
                .to_string(),
        })?;
        debug!(git = %program.display(), "located git binary");
        Ok(Self { runner, program })
    }

    /// Build a client around an already-known git path.
    ///
    /// Mostly useful in tests, where the runner is a fake and the path is
    /// never executed.
    pub fn with_program(runner: Arc<dyn ProcessRunner>, program: PathBuf) -> Self {
        Self { runner, program }
    }

    /// Clone `url` into `dest`, waiting at most `limit`.
    ///
    /// Network-looking failures are classified as [`InstallError::Network`];
    /// everything else surfaces as [`InstallError::ProcessFailed`] with the
    /// captured output attached.
    pub async fn clone_into(
        &self,
        url: &str,
        dest: &Path,
        limit: Duration,
    ) -> Result<(), InstallError> {
        let cwd = dest.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let args = vec![
            "clone".to_string(),
            "--depth".to_string(),
            "1".to_string(),
            url.to_string(),
            dest.to_string_lossy().to_string(),
        ];

        let output = self
            .runner
            .run(&self.program, &args, &cwd, limit)
            .await
            .map_err(|e| InstallError::ProcessFailed {
                message: format!("failed to run git: {}", e),
                exit_code: None,
                stdout: None,
                stderr: None,
                fix: "Check that git runs from a shell and try again".to_string(),
            })?;

        if output.success() {
            debug!(url, dest = %dest.display(), "clone finished");
            return Ok(());
        }

        warn!(url, code = ?output.exit_code, "git clone failed");
        if looks_like_network_error(&output.stderr) {
            return Err(InstallError::Network {
                message: format!("network error while cloning {}", url),
                stderr: Some(output.stderr),
                fix: "Check your internet connection and try again".to_string(),
            });
        }

        Err(InstallError::ProcessFailed {
            message: format!("git clone exited with code {:?}", output.exit_code),
            exit_code: output.exit_code,
            stdout: Some(output.stdout),
            stderr: Some(output.stderr),
            fix: "See the git output above for details".to_string(),
        })
    }
}

/// Detect network failures from git's stderr.
fn looks_like_network_error(stderr: &str) -> bool {
    stderr.contains("network")
        || stderr.contains("connection")
        || stderr.contains("resolve")
        || stderr.contains("Could not resolve host")
        || stderr.contains("ETIMEDOUT")
        || stderr.contains("ENOTFOUND")
}
