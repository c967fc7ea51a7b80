//! # relaykit-bootstrap
//!
//! Bootstrap installer for the Relay Kit editor toolkit.
//!
//! This crate takes a host project from "nothing installed" to "the
//! toolkit's own installer is running": it detects whether the companion
//! packages are already present, stages git downloads for the missing ones,
//! patches the project's package manifest, waits out the host package
//! manager's resolution, and hands off to the bundled installer injected by
//! the host.
//!
//! ## Features
//!
//! - `InstallStateMachine` owning the observable state of one run: coarse
//!   step, progress fraction, bounded log, error flags
//! - `StageSequencer` executing the fetch stages in order, tolerating
//!   per-stage failure
//! - `ReadinessPoller` bounding the wait for package resolution, which the
//!   host never acknowledges
//! - Collaborator traits (`ProcessRunner`, `PackageManagerClient`,
//!   `SecondaryInstaller`, `ProgressSink`) so every external system can be
//!   faked in tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use relaykit_bootstrap::{
//!     install, GitClient, InstallContext, InstallOptions, InstallStateMachine,
//!     NullPackageManager, NullSink, StaticProvider, SystemProcessRunner,
//! };
//! use std::path::PathBuf;
//! use std::sync::{Arc, Mutex};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = Arc::new(SystemProcessRunner);
//!     let ctx = InstallContext {
//!         manifest_path: PathBuf::from("Packages/manifest.json"),
//!         packages_dir: PathBuf::from("Packages"),
//!         git: Arc::new(GitClient::locate(runner)?),
//!         package_manager: Arc::new(NullPackageManager),
//!         installer_provider: Arc::new(StaticProvider::empty()),
//!     };
//!     let machine = Arc::new(Mutex::new(InstallStateMachine::new(
//!         Arc::new(NullSink),
//!         Default::default(),
//!     )));
//!
//!     install(ctx, InstallOptions::default(), machine.clone()).await?;
//!     Ok(())
//! }
//! ```

mod detect;
mod git;
mod install;
mod manifest;
mod options;
mod package_kind;
mod package_manager;
mod process;
mod secondary;

pub use detect::{detect_environment, detect_package, EnvironmentStatus, PackageStatus};
pub use git::GitClient;
pub use install::{
    install, InstallContext, InstallError, InstallState, InstallStateMachine, InstallStep,
    LogEntry, NullSink, PollVerdict, ProgressSink, ReadinessPoller, SharedStateMachine, Stage,
    StageDone, StageSequencer, INSTALLER_DONE_CODE, LOG_CAPACITY,
};
pub use manifest::{contains_dependency, ensure_dependency, ManifestError, PatchOutcome};
pub use options::{InstallOptions, ProgressSpan, ProgressSpans};
pub use package_kind::{PackageKind, PackageSource};
pub use package_manager::{NullPackageManager, PackageManagerClient, PackageManagerError};
pub use process::{find_executable, ProcessRunner, RunOutput, SystemProcessRunner};
pub use secondary::{
    SecondaryError, SecondaryInstaller, SecondaryProvider, StaticProvider, StepReport,
};
