//! Progress reporting for bootstrap runs.
//!
//! The state machine mirrors every mutation into a [`ProgressSink`], which
//! is how a host surface (a modal window, a TUI, a test harness) observes a
//! run. The sink receives events and never feeds anything back into the
//! core.

use crate::install::state::LogEntry;
use crate::install::InstallStep;

/// Observer for install state changes.
///
/// All handlers default to no-ops so a surface only implements what it
/// renders. Handlers are called synchronously from the mutating operation
/// and must not block.
///
/// # Example
///
/// ```rust
/// use relaykit_bootstrap::{InstallStep, LogEntry, ProgressSink};
///
/// struct ConsoleSink;
///
/// impl ProgressSink for ConsoleSink {
///     fn on_step(&self, step: InstallStep, detail: &str) {
///         println!("{}: {}", step.display_name(), detail);
///     }
///
///     fn on_progress(&self, fraction: f64) {
///         println!("{:.0}%", fraction * 100.0);
///     }
/// }
/// ```
pub trait ProgressSink: Send + Sync {
    /// The coarse step changed, or its detail text was updated.
    fn on_step(&self, _step: InstallStep, _detail: &str) {}

    /// The overall progress fraction changed.
    fn on_progress(&self, _fraction: f64) {}

    /// A line was appended to the run log.
    fn on_log(&self, _entry: &LogEntry) {}

    /// A failure was recorded. The run may still continue.
    fn on_error(&self, _message: &str) {}
}

/// Sink that discards every event.
///
/// Useful for headless runs and as a placeholder in tests that assert on
/// state rather than on events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {}
