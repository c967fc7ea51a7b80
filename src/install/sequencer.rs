//! Ordered execution of install stages.
//!
//! A run is a fixed list of stages executed exactly once each, in order.
//! A stage finishes by consuming its [`StageDone`] token, either
//! synchronously from inside its action or later from another task, and
//! only then does the next stage start. After the last stage the terminal
//! hook runs once.

use std::sync::{Arc, Mutex};
use tracing::debug;

type StageAction = Box<dyn FnOnce(StageDone) + Send>;
type FinishHook = Box<dyn FnOnce() + Send>;

/// One unit of the install sequence.
///
/// The action receives the stage's completion token and owns the policy for
/// its own failures: a stage that wants the sequence to continue records the
/// error elsewhere (typically via
/// [`InstallStateMachine::set_error`](crate::InstallStateMachine::set_error))
/// and finishes its token anyway.
pub struct Stage {
    id: &'static str,
    display_name: String,
    action: Option<StageAction>,
}

impl Stage {
    /// Create a stage from an identifier, a display name, and its action.
    pub fn new(
        id: &'static str,
        display_name: impl Into<String>,
        action: impl FnOnce(StageDone) + Send + 'static,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            action: Some(Box::new(action)),
        }
    }

    /// Stable identifier of this stage.
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Operator-facing name of this stage.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Completion token for the active stage.
///
/// [`finish`](Self::finish) consumes the token, so a stage cannot complete
/// twice; the skipped-stages hazard of callback sequencing is ruled out at
/// compile time. Dropping the token without finishing stalls the sequence
/// permanently: later stages never start and the terminal hook never runs,
/// which surfaces as frozen progress rather than a crash.
pub struct StageDone {
    core: Arc<Mutex<Core>>,
}

impl StageDone {
    /// Mark the active stage complete and let the sequence advance.
    pub fn finish(self) {
        StageSequencer::signal(&self.core);
    }
}

struct Core {
    stages: Vec<Stage>,
    next: usize,
    signals: u32,
    started: bool,
    draining: bool,
    finished: bool,
    on_finished: Option<FinishHook>,
}

enum NextWork {
    Stage(&'static str, StageAction),
    Finish(Option<FinishHook>),
    Idle,
}

/// Drives an ordered list of [`Stage`]s.
///
/// Stage `n`'s completion is always observed before stage `n + 1` begins,
/// whether the action finishes its token synchronously or hands it to
/// another task. The sequencer carries no failure policy of its own.
///
/// # Example
///
/// ```rust
/// use relaykit_bootstrap::{Stage, StageSequencer};
/// use std::sync::{Arc, Mutex};
///
/// let order = Arc::new(Mutex::new(Vec::new()));
/// let stages = ["unpack", "link"]
///     .into_iter()
///     .map(|id| {
///         let order = order.clone();
///         Stage::new(id, id, move |done| {
///             order.lock().unwrap().push(id);
///             done.finish();
///         })
///     })
///     .collect();
///
/// let finished = order.clone();
/// let sequencer = StageSequencer::new(stages, move || {
///     finished.lock().unwrap().push("done");
/// });
/// sequencer.run();
///
/// assert_eq!(*order.lock().unwrap(), vec!["unpack", "link", "done"]);
/// ```
pub struct StageSequencer {
    core: Arc<Mutex<Core>>,
}

impl StageSequencer {
    /// Create a sequencer over `stages` with a terminal hook.
    ///
    /// `on_finished` runs exactly once, after the last stage completes (or
    /// immediately on [`run`](Self::run) when `stages` is empty).
    pub fn new(stages: Vec<Stage>, on_finished: impl FnOnce() + Send + 'static) -> Self {
        Self {
            core: Arc::new(Mutex::new(Core {
                stages,
                next: 0,
                signals: 0,
                started: false,
                draining: false,
                finished: false,
                on_finished: Some(Box::new(on_finished)),
            })),
        }
    }

    /// Start the sequence at stage 0. Subsequent calls are no-ops.
    pub fn run(&self) {
        {
            let mut core = self.core.lock().expect("sequencer state poisoned");
            if core.started {
                return;
            }
            core.started = true;
        }
        Self::signal(&self.core);
    }

    /// Whether the terminal hook has run.
    pub fn is_finished(&self) -> bool {
        self.core.lock().expect("sequencer state poisoned").finished
    }

    /// Record one advancement signal and drain pending work.
    ///
    /// The drain loop is held by a single caller at a time; a completion
    /// signalled from inside a stage action only increments the counter and
    /// lets the active drain pick it up, so actions are never invoked
    /// reentrantly and no lock is held while an action runs.
    fn signal(core: &Arc<Mutex<Core>>) {
        {
            let mut c = core.lock().expect("sequencer state poisoned");
            c.signals += 1;
            if c.draining {
                return;
            }
            c.draining = true;
        }

        loop {
            let work = {
                let mut c = core.lock().expect("sequencer state poisoned");
                if c.signals == 0 {
                    c.draining = false;
                    break;
                }
                c.signals -= 1;
                if c.next < c.stages.len() {
                    let index = c.next;
                    c.next += 1;
                    let stage = &mut c.stages[index];
                    match stage.action.take() {
                        Some(action) => NextWork::Stage(stage.id, action),
                        None => NextWork::Idle,
                    }
                } else if !c.finished {
                    c.finished = true;
                    NextWork::Finish(c.on_finished.take())
                } else {
                    NextWork::Idle
                }
            };

            match work {
                NextWork::Stage(id, action) => {
                    debug!(stage = id, "starting stage");
                    action(StageDone { core: core.clone() });
                }
                NextWork::Finish(hook) => {
                    debug!("all stages complete");
                    if let Some(hook) = hook {
                        hook();
                    }
                }
                NextWork::Idle => {}
            }
        }
    }
}
