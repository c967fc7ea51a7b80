//! Install run state and the state machine that owns it.

use crate::install::progress::ProgressSink;
use crate::install::InstallStep;
use crate::options::ProgressSpans;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Maximum number of retained log entries; oldest are evicted first.
pub const LOG_CAPACITY: usize = 100;

/// One line of the run log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// When the line was appended.
    pub timestamp: SystemTime,
    /// The message.
    pub message: String,
}

/// Snapshot of one bootstrap run.
///
/// Owned exclusively by [`InstallStateMachine`] and mutated only through its
/// operations. `progress` is kept in `[0, 1]` and never decreases within a
/// run. `failed` and `complete` are independent flags: a run can finish
/// with tolerated failures recorded along the way.
#[derive(Debug, Clone, Serialize)]
pub struct InstallState {
    /// Current coarse step.
    pub step: InstallStep,
    /// Operator-facing detail for the current step.
    pub detail: String,
    /// Overall progress fraction in `[0, 1]`.
    pub progress: f64,
    /// Zero-based index of the package currently being processed.
    pub package_index: usize,
    /// Total packages in the current multi-item step.
    pub package_total: usize,
    /// The run reached [`InstallStep::Complete`].
    pub complete: bool,
    /// At least one failure was recorded.
    pub failed: bool,
    /// Most recent failure message.
    pub error: Option<String>,
}

impl Default for InstallState {
    fn default() -> Self {
        Self {
            step: InstallStep::Idle,
            detail: String::new(),
            progress: 0.0,
            package_index: 0,
            package_total: 0,
            complete: false,
            failed: false,
            error: None,
        }
    }
}

/// Owns the [`InstallState`] of one run and mirrors every mutation into a
/// [`ProgressSink`].
///
/// The machine enforces the two run invariants: the step never regresses
/// (a lower-ordinal step is ignored) and the progress fraction never
/// decreases. [`reset`](Self::reset) is the only way back to the initial
/// state and marks the start of a new run.
///
/// No operation blocks or suspends; the machine is plain mutable state and
/// callers that share it across tasks wrap it in `Arc<Mutex<_>>`.
///
/// # Example
///
/// ```rust
/// use relaykit_bootstrap::{InstallStateMachine, InstallStep, NullSink};
/// use std::sync::Arc;
///
/// let mut machine = InstallStateMachine::new(Arc::new(NullSink), Default::default());
/// machine.set_step(InstallStep::CheckEnvironment, "looking for an existing install");
/// machine.set_step(InstallStep::Complete, "nothing to do");
///
/// assert!(machine.state().complete);
/// assert_eq!(machine.state().progress, 1.0);
/// ```
pub struct InstallStateMachine {
    state: InstallState,
    logs: VecDeque<LogEntry>,
    sink: Arc<dyn ProgressSink>,
    spans: ProgressSpans,
}

impl InstallStateMachine {
    /// Create a machine in the initial state.
    pub fn new(sink: Arc<dyn ProgressSink>, spans: ProgressSpans) -> Self {
        Self {
            state: InstallState::default(),
            logs: VecDeque::with_capacity(LOG_CAPACITY),
            sink,
            spans,
        }
    }

    /// Current state.
    pub fn state(&self) -> &InstallState {
        &self.state
    }

    /// Retained log entries, oldest first.
    pub fn logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter()
    }

    /// Clear the state back to its initial values and drop the log.
    ///
    /// Marks the start of a new run; the sink observes the rollback.
    pub fn reset(&mut self) {
        self.state = InstallState::default();
        self.logs.clear();
        self.sink.on_step(InstallStep::Idle, "");
        self.sink.on_progress(0.0);
    }

    /// Advance to `step` with the given detail text.
    ///
    /// The progress fraction is recomputed from the step's position among
    /// the non-sentinel steps and clamped so it never decreases.
    /// [`InstallStep::Complete`] forces progress to 1.0 and sets the
    /// completion flag. A step behind the current one is ignored.
    pub fn set_step(&mut self, step: InstallStep, detail: impl Into<String>) {
        if step < self.state.step {
            debug!(?step, current = ?self.state.step, "ignoring step regression");
            return;
        }
        self.state.step = step;
        self.state.detail = detail.into();
        self.state.progress = self.state.progress.max(step.fraction());
        if step == InstallStep::Complete {
            self.state.progress = 1.0;
            self.state.complete = true;
        }
        let line = if self.state.detail.is_empty() {
            step.display_name().to_string()
        } else {
            format!("{}: {}", step.display_name(), self.state.detail)
        };
        self.push_log(line);
        self.sink.on_step(step, &self.state.detail);
        self.sink.on_progress(self.state.progress);
    }

    /// Report per-item progress inside the current step.
    ///
    /// Multi-item steps own a configured slice of the progress axis; the
    /// fraction moves inside that slice as `index` advances toward `total`.
    /// Steps without a slice keep their step-level fraction. Progress never
    /// decreases.
    pub fn set_package_progress(&mut self, index: usize, total: usize, name: &str) {
        self.state.package_index = index;
        self.state.package_total = total;
        self.state.detail = format!("{} ({}/{})", name, index + 1, total.max(1));
        if let Some(span) = self.spans.for_step(self.state.step) {
            self.state.progress = self.state.progress.max(span.at(index, total));
        }
        self.push_log(self.state.detail.clone());
        self.sink.on_step(self.state.step, &self.state.detail);
        self.sink.on_progress(self.state.progress);
    }

    /// Append a timestamped line to the run log.
    ///
    /// The log holds at most [`LOG_CAPACITY`] entries; the oldest entry is
    /// evicted once the capacity is exceeded.
    pub fn add_log(&mut self, message: impl Into<String>) {
        self.push_log(message.into());
    }

    /// Record a failure.
    ///
    /// Sets the failure flag and message and logs the error. The machine
    /// keeps running (whether to stop the sequence is the caller's
    /// decision) and a completion already reached is not revoked.
    pub fn set_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.state.failed = true;
        self.state.error = Some(message.clone());
        self.push_log(format!("error: {}", message));
        self.sink.on_error(&message);
    }

    fn push_log(&mut self, message: String) {
        let entry = LogEntry {
            timestamp: SystemTime::now(),
            message,
        };
        self.sink.on_log(&entry);
        self.logs.push_back(entry);
        while self.logs.len() > LOG_CAPACITY {
            self.logs.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::progress::NullSink;
    use std::sync::Mutex;

    fn machine() -> InstallStateMachine {
        InstallStateMachine::new(Arc::new(NullSink), ProgressSpans::default())
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_step(&self, step: InstallStep, detail: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("step {:?} {}", step, detail));
        }

        fn on_progress(&self, fraction: f64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress {:.3}", fraction));
        }

        fn on_log(&self, entry: &LogEntry) {
            self.events.lock().unwrap().push(format!("log {}", entry.message));
        }

        fn on_error(&self, message: &str) {
            self.events.lock().unwrap().push(format!("error {}", message));
        }
    }

    #[test]
    fn test_initial_state() {
        let m = machine();
        assert_eq!(m.state().step, InstallStep::Idle);
        assert_eq!(m.state().progress, 0.0);
        assert!(!m.state().complete);
        assert!(!m.state().failed);
        assert_eq!(m.logs().count(), 0);
    }

    #[test]
    fn test_progress_is_monotone_over_step_sequences() {
        let mut m = machine();
        let sequence = [
            InstallStep::CheckEnvironment,
            InstallStep::DownloadPackages,
            InstallStep::FetchCoreKit,
            // out-of-order calls must not move progress backwards
            InstallStep::CheckEnvironment,
            InstallStep::RunInstaller,
            InstallStep::FetchInstallerKit,
            InstallStep::Complete,
        ];
        let mut last = 0.0;
        for step in sequence {
            m.set_step(step, "");
            assert!(
                m.state().progress >= last,
                "progress regressed at {:?}",
                step
            );
            last = m.state().progress;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_step_regression_is_ignored() {
        let mut m = machine();
        m.set_step(InstallStep::RunInstaller, "running");
        m.set_step(InstallStep::CheckEnvironment, "too late");
        assert_eq!(m.state().step, InstallStep::RunInstaller);
        assert_eq!(m.state().detail, "running");
    }

    #[test]
    fn test_complete_forces_full_progress() {
        let mut m = machine();
        m.set_step(InstallStep::Complete, "done");
        assert_eq!(m.state().progress, 1.0);
        assert!(m.state().complete);

        // also from a mid-run state
        let mut m = machine();
        m.set_step(InstallStep::FetchCoreKit, "");
        m.set_step(InstallStep::Complete, "done");
        assert_eq!(m.state().progress, 1.0);
        assert!(m.state().complete);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut m = machine();
        m.set_step(InstallStep::RunInstaller, "running");
        m.set_error("clone failed");
        m.reset();
        assert_eq!(m.state().step, InstallStep::Idle);
        assert_eq!(m.state().progress, 0.0);
        assert!(!m.state().failed);
        assert!(m.state().error.is_none());
        assert_eq!(m.logs().count(), 0);
        // after reset the run starts over
        m.set_step(InstallStep::CheckEnvironment, "");
        assert_eq!(m.state().step, InstallStep::CheckEnvironment);
    }

    #[test]
    fn test_log_capacity_evicts_oldest() {
        let mut m = machine();
        for i in 1..=101 {
            m.add_log(format!("line {}", i));
        }
        assert_eq!(m.logs().count(), LOG_CAPACITY);
        let messages: Vec<_> = m.logs().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.first(), Some(&"line 2"));
        assert_eq!(messages.last(), Some(&"line 101"));
    }

    #[test]
    fn test_log_preserves_append_order() {
        let mut m = machine();
        m.add_log("first");
        m.add_log("second");
        m.add_log("third");
        let messages: Vec<_> = m.logs().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_package_progress_moves_within_span() {
        let spans = ProgressSpans::default();
        let mut m = InstallStateMachine::new(Arc::new(NullSink), spans);
        m.set_step(InstallStep::FetchCoreKit, "");
        m.set_package_progress(0, 2, "Relay Core Kit");
        let at_first = m.state().progress;
        m.set_package_progress(1, 2, "Relay Installer");
        let at_second = m.state().progress;

        let span = spans.package_fetch;
        assert!((at_first - span.at(0, 2)).abs() < 1e-9 || at_first > span.at(0, 2));
        assert!(at_second > at_first);
        assert!(at_second <= span.base + span.len + 1e-9);
        assert_eq!(m.state().package_index, 1);
        assert_eq!(m.state().package_total, 2);
        assert_eq!(m.state().detail, "Relay Installer (2/2)");
    }

    #[test]
    fn test_package_progress_without_span_keeps_fraction() {
        let mut m = machine();
        m.set_step(InstallStep::CheckEnvironment, "");
        let before = m.state().progress;
        m.set_package_progress(0, 3, "probe");
        assert_eq!(m.state().progress, before);
        assert_eq!(m.state().package_total, 3);
    }

    #[test]
    fn test_error_does_not_clear_completion() {
        let mut m = machine();
        m.set_step(InstallStep::Complete, "");
        m.set_error("late failure");
        assert!(m.state().complete);
        assert!(m.state().failed);
        assert_eq!(m.state().error.as_deref(), Some("late failure"));
        assert_eq!(m.state().progress, 1.0);
    }

    #[test]
    fn test_every_mutation_reaches_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let mut m = InstallStateMachine::new(sink.clone(), ProgressSpans::default());
        m.set_step(InstallStep::CheckEnvironment, "probing");
        m.set_package_progress(0, 1, "Relay Core Kit");
        m.add_log("plain line");
        m.set_error("boom");

        let events = sink.events.lock().unwrap();
        assert!(events.iter().any(|e| e.starts_with("step")));
        assert!(events.iter().any(|e| e.starts_with("progress")));
        assert!(events.iter().any(|e| e == "log plain line"));
        assert!(events.iter().any(|e| e == "error boom"));
    }

    #[test]
    fn test_timestamps_are_recent() {
        let mut m = machine();
        m.add_log("now");
        let entry = m.logs().next().unwrap();
        let age = SystemTime::now()
            .duration_since(entry.timestamp)
            .expect("timestamp should be in the past");
        assert!(age.as_secs() < 60);
    }
}
