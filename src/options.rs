//! Bootstrap configuration.
//!
//! This module gathers every tuned constant of a run into [`InstallOptions`]
//! so hosts can adjust timeouts, poll behavior, and the progress layout
//! without touching the install logic. Use [`Default::default()`] for the
//! shipped tuning.

use crate::install::InstallStep;
use std::time::Duration;

/// One slice of the overall `[0, 1]` progress axis.
///
/// Multi-item steps report item progress inside their own slice instead of
/// the step-linear fraction. The slices are uneven; the phases are not
/// equally expensive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSpan {
    /// Where the slice starts on the progress axis.
    pub base: f64,
    /// Length of the slice.
    pub len: f64,
}

impl ProgressSpan {
    /// Progress value for `index` of `total` items inside this slice.
    ///
    /// A zero `total` is treated as a single item so the math never divides
    /// by zero.
    pub fn at(&self, index: usize, total: usize) -> f64 {
        let total = total.max(1) as f64;
        (self.base + self.len * (index as f64 / total)).clamp(0.0, 1.0)
    }
}

/// Progress slices owned by the multi-item steps.
///
/// The package-fetch phase and the bundled installer's run each own a
/// disjoint slice of the progress axis. Steps without a slice fall back to
/// the step-linear fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSpans {
    /// Slice covering the package-fetch stages.
    pub package_fetch: ProgressSpan,
    /// Slice covering the bundled installer's own package work.
    pub installer_run: ProgressSpan,
}

impl ProgressSpans {
    /// The slice owned by `step`, if it reports per-item progress.
    pub fn for_step(&self, step: InstallStep) -> Option<ProgressSpan> {
        match step {
            InstallStep::DownloadPackages
            | InstallStep::FetchCoreKit
            | InstallStep::FetchInstallerKit => Some(self.package_fetch),
            InstallStep::RunInstaller => Some(self.installer_run),
            _ => None,
        }
    }
}

impl Default for ProgressSpans {
    fn default() -> Self {
        Self {
            package_fetch: ProgressSpan { base: 0.2, len: 0.3 },
            installer_run: ProgressSpan { base: 0.5, len: 0.5 },
        }
    }
}

/// Options controlling a bootstrap run.
///
/// # Example
///
/// ```rust
/// use relaykit_bootstrap::InstallOptions;
/// use std::time::Duration;
///
/// // Shipped tuning
/// let options = InstallOptions::default();
/// assert_eq!(options.settle_threshold, 10);
///
/// // Slower network: give clones more room
/// let options = InstallOptions {
///     clone_timeout: Duration::from_secs(600),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Maximum time one git clone may take.
    ///
    /// Default: 2 minutes.
    pub clone_timeout: Duration,

    /// Delay between readiness poll ticks.
    ///
    /// Default: 500 milliseconds.
    pub poll_interval: Duration,

    /// Ticks after which package resolution is presumed settled.
    ///
    /// There is no completion signal from the host package manager, so the
    /// poller waits this many ticks and presumes the resolve has finished.
    ///
    /// Default: 10.
    pub settle_threshold: u32,

    /// Hard cap on poll ticks within one poll cycle.
    ///
    /// Default: 40.
    pub max_poll_attempts: u32,

    /// How many poll cycles to run before giving up on the handoff.
    ///
    /// Default: 3.
    pub handoff_retries: u32,

    /// Escalating delays between poll cycles.
    ///
    /// Cycle `n` waits `handoff_backoff[n]` before re-polling; cycles beyond
    /// the ladder reuse the last entry.
    ///
    /// Default: 1s, 3s, 5s.
    pub handoff_backoff: Vec<Duration>,

    /// Progress slices for the multi-item steps.
    pub spans: ProgressSpans,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            clone_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
            settle_threshold: 10,
            max_poll_attempts: 40,
            handoff_retries: 3,
            handoff_backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
            spans: ProgressSpans::default(),
        }
    }
}

impl InstallOptions {
    /// Backoff before retry cycle `cycle` (zero-based).
    ///
    /// Cycles past the end of the ladder reuse its last entry; an empty
    /// ladder means no delay.
    pub fn backoff_for_cycle(&self, cycle: usize) -> Duration {
        self.handoff_backoff
            .get(cycle)
            .or_else(|| self.handoff_backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}
