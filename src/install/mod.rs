//! The install engine: run state, stage sequencing, the resolution poller,
//! and the orchestration that drives one bootstrap run end to end.
//!
//! # Example
//!
//! ```rust,no_run
//! use relaykit_bootstrap::{InstallStateMachine, InstallStep, NullSink};
//! use std::sync::Arc;
//!
//! let mut machine = InstallStateMachine::new(Arc::new(NullSink), Default::default());
//! machine.set_step(InstallStep::CheckEnvironment, "probing the project");
//! println!("{:.0}%", machine.state().progress * 100.0);
//! ```

mod errors;
mod executor;
mod poller;
mod progress;
mod sequencer;
mod state;
mod step;

pub use errors::InstallError;
pub use executor::{install, InstallContext, SharedStateMachine};
pub use poller::{PollVerdict, ReadinessPoller};
pub use progress::{NullSink, ProgressSink};
pub use sequencer::{Stage, StageDone, StageSequencer};
pub use state::{InstallState, InstallStateMachine, LogEntry, LOG_CAPACITY};
pub use step::{InstallStep, INSTALLER_DONE_CODE};
