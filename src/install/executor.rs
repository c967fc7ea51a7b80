//! Bootstrap run orchestration.
//!
//! This module wires the pieces together: environment detection, the
//! sequenced package fetch stages, the resolution wait, and the handoff to
//! the bundled installer. One call to [`install`] is one run.

use crate::detect::{detect_environment, EnvironmentStatus};
use crate::git::GitClient;
use crate::install::errors::InstallError;
use crate::install::poller::ReadinessPoller;
use crate::install::sequencer::{Stage, StageSequencer};
use crate::install::state::InstallStateMachine;
use crate::install::step::{InstallStep, INSTALLER_DONE_CODE};
use crate::manifest::{ensure_dependency, ManifestError, PatchOutcome};
use crate::options::InstallOptions;
use crate::package_kind::PackageKind;
use crate::package_manager::PackageManagerClient;
use crate::secondary::{SecondaryInstaller, SecondaryProvider, StepReport};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Install state shared between the driver, the stage tasks, and the
/// handoff callback.
pub type SharedStateMachine = Arc<Mutex<InstallStateMachine>>;

/// The collaborators and paths one run operates on.
#[derive(Clone)]
pub struct InstallContext {
    /// The host project's package manifest.
    pub manifest_path: PathBuf,
    /// Directory the companion packages are checked out into.
    pub packages_dir: PathBuf,
    /// Git client used to fetch packages.
    pub git: Arc<GitClient>,
    /// The host's package manager.
    pub package_manager: Arc<dyn PackageManagerClient>,
    /// Source of the bundled installer for the handoff.
    pub installer_provider: Arc<dyn SecondaryProvider>,
}

fn lock(machine: &SharedStateMachine) -> MutexGuard<'_, InstallStateMachine> {
    machine.lock().expect("install state lock poisoned")
}

/// Run one bootstrap install.
///
/// The run proceeds through the coarse steps in order: environment check
/// (an already-installed toolkit ends the run successfully right there),
/// sequenced fetch stages for each companion package, the resolution wait,
/// and the handoff to the bundled installer.
///
/// Per-stage failures (a clone that fails, a manifest that cannot be
/// patched) are recorded into the shared state and the sequence continues;
/// an operator watching the progress surface sees every failure without the
/// run stopping at the first one. The returned `Result` reflects only
/// terminal failures: the installer never becoming available, or the
/// installer itself reporting an error.
///
/// # Example
///
/// ```rust,no_run
/// use relaykit_bootstrap::{
///     install, GitClient, InstallContext, InstallOptions, InstallStateMachine,
///     NullPackageManager, NullSink, StaticProvider, SystemProcessRunner,
/// };
/// use std::path::PathBuf;
/// use std::sync::{Arc, Mutex};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let runner = Arc::new(SystemProcessRunner);
///     let ctx = InstallContext {
///         manifest_path: PathBuf::from("Packages/manifest.json"),
///         packages_dir: PathBuf::from("Packages"),
///         git: Arc::new(GitClient::locate(runner)?),
///         package_manager: Arc::new(NullPackageManager),
///         installer_provider: Arc::new(StaticProvider::empty()),
///     };
///     let machine = Arc::new(Mutex::new(InstallStateMachine::new(
///         Arc::new(NullSink),
///         Default::default(),
///     )));
///     install(ctx, InstallOptions::default(), machine).await?;
///     Ok(())
/// }
/// ```
pub async fn install(
    ctx: InstallContext,
    options: InstallOptions,
    machine: SharedStateMachine,
) -> Result<(), InstallError> {
    lock(&machine).reset();
    lock(&machine).set_step(
        InstallStep::CheckEnvironment,
        "checking for an existing install",
    );

    let env = detect_environment(&ctx.manifest_path, &ctx.packages_dir).await;
    if let EnvironmentStatus::Satisfied { packages } = env {
        let mut m = lock(&machine);
        for found in &packages {
            m.add_log(format!(
                "{} already installed at {}",
                found.kind.display_name(),
                found.path.display()
            ));
        }
        m.set_step(InstallStep::Complete, "toolkit already installed");
        return Ok(());
    }

    lock(&machine).set_step(InstallStep::DownloadPackages, "staging package downloads");

    let kinds: Vec<_> = PackageKind::all().collect();
    let total = kinds.len();
    let (sequence_tx, sequence_rx) = oneshot::channel();

    let stages = kinds
        .iter()
        .enumerate()
        .map(|(index, &kind)| {
            let ctx = ctx.clone();
            let machine = machine.clone();
            let clone_timeout = options.clone_timeout;
            Stage::new(kind.source().manifest_id, kind.display_name(), move |done| {
                tokio::spawn(async move {
                    fetch_package(ctx, machine, kind, index, total, clone_timeout).await;
                    done.finish();
                });
            })
        })
        .collect();

    let terminal_machine = machine.clone();
    let sequencer = StageSequencer::new(stages, move || {
        lock(&terminal_machine).set_step(
            InstallStep::LaunchInstaller,
            "waiting for package resolution",
        );
        let _ = sequence_tx.send(());
    });
    sequencer.run();
    if sequence_rx.await.is_err() {
        warn!("stage sequence dropped before completing");
    }

    ctx.package_manager.resolve();
    lock(&machine).add_log("asked the package manager to resolve dependencies");

    let installer = wait_for_installer(&ctx, &options, &machine).await?;

    lock(&machine).set_step(InstallStep::RunInstaller, "running the bundled installer");
    let report: StepReport = {
        let machine = machine.clone();
        Arc::new(move |code| {
            let step = InstallStep::from_installer_code(code);
            let mut m = machine.lock().expect("install state lock poisoned");
            if step == InstallStep::Complete {
                m.set_step(step, "bundled installer finished");
            } else {
                m.set_step(step, format!("installer step {}", code));
                if code >= 0 {
                    m.set_package_progress(
                        code as usize,
                        INSTALLER_DONE_CODE as usize,
                        "bundled installer",
                    );
                }
            }
        })
    };
    if let Err(e) = installer.run(report).await {
        lock(&machine).set_error(format!("bundled installer failed: {}", e));
        return Err(InstallError::HandoffFailed {
            message: e.to_string(),
            fix: "See the run log for the installer's output".to_string(),
        });
    }

    lock(&machine).set_step(InstallStep::Complete, "bootstrap finished");
    Ok(())
}

/// Fetch one companion package: clear any stale registration, clone the
/// repository unless a checkout is already on disk, and ensure the manifest
/// entry. Failures are recorded and tolerated.
async fn fetch_package(
    ctx: InstallContext,
    machine: SharedStateMachine,
    kind: PackageKind,
    index: usize,
    total: usize,
    clone_timeout: std::time::Duration,
) {
    let source = kind.source();
    {
        let mut m = lock(&machine);
        m.set_step(kind.fetch_step(), format!("fetching {}", kind.display_name()));
        m.set_package_progress(index, total, kind.display_name());
    }

    // A previously-resolved registry copy of the same id would shadow the
    // git entry; clearing it is best-effort.
    if let Err(e) = ctx.package_manager.remove(source.manifest_id).await {
        lock(&machine).add_log(format!(
            "could not remove existing registration of {}: {}",
            source.manifest_id, e
        ));
    }

    let dest = ctx.packages_dir.join(source.folder_name);
    if dest.exists() {
        lock(&machine).add_log(format!(
            "{} checkout already present, skipping clone",
            kind.display_name()
        ));
    } else if let Err(e) = GitClient::clone_into(&ctx.git, source.git_url, &dest, clone_timeout).await {
        lock(&machine).set_error(format!("failed to fetch {}: {}", kind.display_name(), e));
        return;
    }

    match ensure_dependency(&ctx.manifest_path, source.manifest_id, source.git_url) {
        Ok(PatchOutcome::Added) => {
            lock(&machine).add_log(format!("added {} to the manifest", source.manifest_id));
        }
        Ok(PatchOutcome::AlreadyPresent) => {
            debug!(id = source.manifest_id, "manifest entry already present");
        }
        Err(e) => {
            let err = manifest_install_error(e);
            lock(&machine).set_error(format!("{} ({})", err, err.fix_suggestion()));
        }
    }
}

/// Lift a manifest module error into the run's error taxonomy.
fn manifest_install_error(err: ManifestError) -> InstallError {
    match err {
        ManifestError::NotFound { path } => InstallError::ManifestNotFound {
            path,
            fix: "Open the project once so the host generates its manifest, then re-run"
                .to_string(),
        },
        ManifestError::MissingDependencies { path } => InstallError::ManifestPatch {
            path,
            message: "no dependencies object".to_string(),
            fix: "Restore the manifest from version control and re-run".to_string(),
        },
        ManifestError::Io { path, source } => InstallError::ManifestPatch {
            path,
            message: source.to_string(),
            fix: "Check file permissions on the manifest and re-run".to_string(),
        },
    }
}

/// Wait for the bundled installer to become available.
///
/// Each cycle runs one presumed-settled poll, then asks the provider. Up to
/// `handoff_retries` cycles, separated by the escalating backoff ladder;
/// exhausting them is the terminal [`InstallError::InstallerUnavailable`].
async fn wait_for_installer(
    ctx: &InstallContext,
    options: &InstallOptions,
    machine: &SharedStateMachine,
) -> Result<Arc<dyn SecondaryInstaller>, InstallError> {
    let cycles = options.handoff_retries.max(1);
    for cycle in 0..cycles {
        if cycle > 0 {
            let backoff = options.backoff_for_cycle(cycle as usize - 1);
            lock(machine).add_log(format!(
                "installer not loaded yet, retrying in {:?}",
                backoff
            ));
            tokio::time::sleep(backoff).await;
        }

        let mut poller = ReadinessPoller::new(options.settle_threshold, options.max_poll_attempts);
        let verdict = loop {
            tokio::time::sleep(options.poll_interval).await;
            if let Some(verdict) = poller.tick() {
                break verdict;
            }
        };
        if verdict.timed_out {
            lock(machine).add_log(format!(
                "gave up waiting for resolution after {} ticks",
                verdict.attempts
            ));
        } else {
            debug!(attempts = verdict.attempts, "resolution presumed settled");
        }

        if let Some(installer) = ctx.installer_provider.get() {
            return Ok(installer);
        }
    }

    lock(machine).set_error("bundled installer never became available");
    Err(InstallError::InstallerUnavailable {
        cycles,
        fix: "Re-open the project so the installer package loads, then run the bootstrap again"
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::progress::NullSink;
    use crate::options::ProgressSpans;
    use crate::package_manager::PackageManagerError;
    use crate::process::{ProcessRunner, RunOutput};
    use crate::secondary::{SecondaryError, StaticProvider};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    struct FakeRunner {
        exit_code: i32,
        stderr: &'static str,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(
            &self,
            _program: &Path,
            _args: &[String],
            _cwd: &Path,
            _limit: Duration,
        ) -> std::io::Result<RunOutput> {
            *self.calls.lock().unwrap() += 1;
            Ok(RunOutput {
                exit_code: Some(self.exit_code),
                stdout: String::new(),
                stderr: self.stderr.to_string(),
            })
        }
    }

    struct RecordingPackageManager {
        removed: Mutex<Vec<String>>,
        resolved: Mutex<u32>,
    }

    impl RecordingPackageManager {
        fn new() -> Self {
            Self {
                removed: Mutex::new(Vec::new()),
                resolved: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl PackageManagerClient for RecordingPackageManager {
        fn resolve(&self) {
            *self.resolved.lock().unwrap() += 1;
        }

        async fn remove(&self, id: &str) -> Result<(), PackageManagerError> {
            self.removed.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    struct CodeReportingInstaller {
        codes: Vec<i32>,
        fail: bool,
    }

    #[async_trait]
    impl SecondaryInstaller for CodeReportingInstaller {
        async fn run(&self, report: StepReport) -> Result<(), SecondaryError> {
            for &code in &self.codes {
                report(code);
            }
            if self.fail {
                return Err(SecondaryError {
                    message: "installer step 7 failed".to_string(),
                });
            }
            Ok(())
        }
    }

    fn fast_options() -> InstallOptions {
        InstallOptions {
            clone_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(1),
            settle_threshold: 2,
            max_poll_attempts: 3,
            handoff_retries: 2,
            handoff_backoff: vec![Duration::from_millis(1)],
            spans: ProgressSpans::default(),
        }
    }

    fn project() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let packages_dir = dir.path().join("Packages");
        std::fs::create_dir_all(&packages_dir).unwrap();
        let manifest_path = packages_dir.join("manifest.json");
        std::fs::write(&manifest_path, "{\n  \"dependencies\": {}\n}\n").unwrap();
        (dir, manifest_path, packages_dir)
    }

    fn context(
        manifest_path: PathBuf,
        packages_dir: PathBuf,
        runner: Arc<dyn ProcessRunner>,
        provider: Arc<dyn SecondaryProvider>,
        pm: Arc<dyn PackageManagerClient>,
    ) -> InstallContext {
        InstallContext {
            manifest_path,
            packages_dir,
            git: Arc::new(GitClient::with_program(runner, PathBuf::from("/usr/bin/git"))),
            package_manager: pm,
            installer_provider: provider,
        }
    }

    fn machine() -> SharedStateMachine {
        Arc::new(Mutex::new(InstallStateMachine::new(
            Arc::new(NullSink),
            ProgressSpans::default(),
        )))
    }

    #[tokio::test]
    async fn test_happy_path_reaches_complete() {
        let (_dir, manifest_path, packages_dir) = project();
        let runner = Arc::new(FakeRunner {
            exit_code: 0,
            stderr: "",
            calls: Mutex::new(0),
        });
        let pm = Arc::new(RecordingPackageManager::new());
        let provider = Arc::new(StaticProvider::new(Arc::new(CodeReportingInstaller {
            codes: vec![0, 3, 7, 11],
            fail: false,
        })));
        let ctx = context(
            manifest_path.clone(),
            packages_dir,
            runner.clone(),
            provider,
            pm.clone(),
        );
        let machine = machine();

        install(ctx, fast_options(), machine.clone()).await.unwrap();

        let m = lock(&machine);
        assert!(m.state().complete);
        assert_eq!(m.state().progress, 1.0);
        assert!(!m.state().failed);
        drop(m);

        // both packages were cloned, deregistered, and added to the manifest
        assert_eq!(*runner.calls.lock().unwrap(), 2);
        assert_eq!(pm.removed.lock().unwrap().len(), 2);
        assert_eq!(*pm.resolved.lock().unwrap(), 1);
        let manifest = std::fs::read_to_string(&manifest_path).unwrap();
        assert!(manifest.contains("com.relaykit.core"));
        assert!(manifest.contains("com.relaykit.installer"));
    }

    #[tokio::test]
    async fn test_satisfied_environment_skips_run() {
        let (_dir, manifest_path, packages_dir) = project();
        // make both packages present
        for kind in PackageKind::all() {
            let source = kind.source();
            ensure_dependency(&manifest_path, source.manifest_id, source.git_url).unwrap();
            std::fs::create_dir_all(packages_dir.join(source.folder_name)).unwrap();
        }
        let runner = Arc::new(FakeRunner {
            exit_code: 0,
            stderr: "",
            calls: Mutex::new(0),
        });
        let pm = Arc::new(RecordingPackageManager::new());
        let ctx = context(
            manifest_path,
            packages_dir,
            runner.clone(),
            Arc::new(StaticProvider::empty()),
            pm.clone(),
        );
        let machine = machine();

        install(ctx, fast_options(), machine.clone()).await.unwrap();

        let m = lock(&machine);
        assert!(m.state().complete);
        assert!(!m.state().failed);
        drop(m);
        // nothing was cloned or resolved
        assert_eq!(*runner.calls.lock().unwrap(), 0);
        assert_eq!(*pm.resolved.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clone_failure_is_tolerated_and_sequence_continues() {
        let (_dir, manifest_path, packages_dir) = project();
        let runner = Arc::new(FakeRunner {
            exit_code: 128,
            stderr: "fatal: repository not found",
            calls: Mutex::new(0),
        });
        let pm = Arc::new(RecordingPackageManager::new());
        let provider = Arc::new(StaticProvider::new(Arc::new(CodeReportingInstaller {
            codes: vec![11],
            fail: false,
        })));
        let ctx = context(manifest_path, packages_dir, runner.clone(), provider, pm);
        let machine = machine();

        // both clones fail, yet the run still reaches the handoff and finishes
        install(ctx, fast_options(), machine.clone()).await.unwrap();

        let m = lock(&machine);
        assert!(m.state().complete);
        assert!(m.state().failed);
        assert!(m.state().error.is_some());
        drop(m);
        // the second stage ran despite the first stage's failure
        assert_eq!(*runner.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_installer_never_available_is_terminal() {
        let (_dir, manifest_path, packages_dir) = project();
        let runner = Arc::new(FakeRunner {
            exit_code: 0,
            stderr: "",
            calls: Mutex::new(0),
        });
        let pm = Arc::new(RecordingPackageManager::new());
        let ctx = context(
            manifest_path,
            packages_dir,
            runner,
            Arc::new(StaticProvider::empty()),
            pm,
        );
        let machine = machine();

        let err = install(ctx, fast_options(), machine.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::InstallerUnavailable { cycles: 2, .. }));

        let m = lock(&machine);
        assert!(!m.state().complete);
        assert!(m.state().failed);
    }

    #[tokio::test]
    async fn test_installer_failure_surfaces_as_handoff_error() {
        let (_dir, manifest_path, packages_dir) = project();
        let runner = Arc::new(FakeRunner {
            exit_code: 0,
            stderr: "",
            calls: Mutex::new(0),
        });
        let pm = Arc::new(RecordingPackageManager::new());
        let provider = Arc::new(StaticProvider::new(Arc::new(CodeReportingInstaller {
            codes: vec![0, 3],
            fail: true,
        })));
        let ctx = context(manifest_path, packages_dir, runner, provider, pm);
        let machine = machine();

        let err = install(ctx, fast_options(), machine.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::HandoffFailed { .. }));
        assert!(lock(&machine).state().failed);
    }

    #[tokio::test]
    async fn test_missing_manifest_is_recorded_but_not_terminal() {
        let (_dir, manifest_path, packages_dir) = project();
        std::fs::remove_file(&manifest_path).unwrap();
        let runner = Arc::new(FakeRunner {
            exit_code: 0,
            stderr: "",
            calls: Mutex::new(0),
        });
        let pm = Arc::new(RecordingPackageManager::new());
        let provider = Arc::new(StaticProvider::new(Arc::new(CodeReportingInstaller {
            codes: vec![11],
            fail: false,
        })));
        let ctx = context(manifest_path, packages_dir, runner, provider, pm);
        let machine = machine();

        // the patch fails on every stage, yet the run presses on to the handoff
        install(ctx, fast_options(), machine.clone()).await.unwrap();

        let m = lock(&machine);
        assert!(m.state().complete);
        assert!(m.state().failed);
        assert!(m
            .state()
            .error
            .as_ref()
            .is_some_and(|e| e.contains("Manifest not found")));
    }

    #[tokio::test]
    async fn test_existing_checkout_skips_clone() {
        let (_dir, manifest_path, packages_dir) = project();
        // core kit checkout already on disk, installer kit absent
        std::fs::create_dir_all(
            packages_dir.join(PackageKind::CoreKit.source().folder_name),
        )
        .unwrap();
        let runner = Arc::new(FakeRunner {
            exit_code: 0,
            stderr: "",
            calls: Mutex::new(0),
        });
        let pm = Arc::new(RecordingPackageManager::new());
        let provider = Arc::new(StaticProvider::new(Arc::new(CodeReportingInstaller {
            codes: vec![11],
            fail: false,
        })));
        let ctx = context(manifest_path, packages_dir, runner.clone(), provider, pm);
        let machine = machine();

        install(ctx, fast_options(), machine).await.unwrap();

        // only the missing package was cloned
        assert_eq!(*runner.calls.lock().unwrap(), 1);
    }
}
