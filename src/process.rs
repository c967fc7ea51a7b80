//! Process execution seam.
//!
//! External commands run through the [`ProcessRunner`] trait so the
//! orchestration can be driven against fakes in tests. The shipped
//! implementation uses `tokio::process` with piped output and a timeout.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// System fallback paths to check if an executable is not found in PATH.
const FALLBACK_PATHS: &[&str] = &["/usr/local/bin", "/usr/bin"];

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Exit code, if the process ran to completion.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RunOutput {
    /// Whether the process exited with code zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a command to completion and captures its output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` in `cwd`, waiting at most `limit`.
    ///
    /// A timeout maps to an [`std::io::ErrorKind::TimedOut`] error; other
    /// spawn failures surface as their underlying I/O error.
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
        limit: Duration,
    ) -> std::io::Result<RunOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
        limit: Duration,
    ) -> std::io::Result<RunOutput> {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = timeout(limit, command.output())
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{} timed out after {:?}", program.display(), limit),
                )
            })??;

        Ok(RunOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Find an executable by name.
///
/// Primary lookup goes through the system PATH via the `which` crate, which
/// handles symlinks and platform differences. If that fails, common system
/// locations and user home directories are probed directly.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    for dir in FALLBACK_PATHS {
        let path = PathBuf::from(dir).join(name);
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let home_paths = [
            format!("{}/.local/bin/{}", home, name),
            format!("{}/bin/{}", home, name),
        ];
        for p in home_paths {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }
    }

    None
}
