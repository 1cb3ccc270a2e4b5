//! The state machine driver.
//!
//! A machine owns a table of keyed states and a pointer to the current one.
//! An external driver calls `step()` repeatedly; each step invokes exactly
//! one state, which must commit exactly one transition.
//!
//! # Key Concepts
//!
//! - **Table**: key to state mapping, pre-populated with ERROR, UNINITIALIZED and DONE
//! - **Progressed flag**: single-shot token enforcing one transition per activation
//! - **Stall**: an activation that committed no transition, reported as `step() == false`
//! - **Extension**: per-machine data that installs built-in states (see [`crate::stack`])

mod error;
mod shared;
mod state_machine;

pub use error::MachineError;
pub use shared::SharedMachine;
pub use state_machine::{Extension, StateMachine, TransitObserver};
