//! Stackwise: a resumable named-state execution engine
//!
//! Stackwise drives programs written as tables of named states. An external
//! loop calls `step()`; each step invokes exactly one state, and that state
//! must commit exactly one transition. Nothing runs between steps, so a
//! program can be paused, inspected or shared between threads at any step.
//!
//! # Core Concepts
//!
//! - **State**: named unit of behavior with a single `invoke` entry point
//! - **StateMachine**: key to state table plus the single-transition driver
//! - **StackMachine**: a state machine with an explicit frame stack,
//!   subroutine `call`/`call_return`, dynamic variables and `iterate`
//! - **History**: bounded record of every committed transition
//!
//! # Example
//!
//! ```rust
//! use stackwise::core::DONE;
//! use stackwise::stack::StackMachine;
//!
//! let mut machine = StackMachine::new_stack();
//! machine
//!     .add_fn("Start", |m| {
//!         m.set_var("collected", Vec::<String>::new())?;
//!         m.iterate(["a", "b", "c"], "Upper", "Finish")
//!     })
//!     .unwrap();
//! machine
//!     .add_fn("Upper", |m| {
//!         let item = m.argument::<&str>().map(|s| s.to_uppercase());
//!         if let (Some(item), Some(out)) = (item, m.get_var_mut::<Vec<String>>("collected")) {
//!             out.push(item);
//!         }
//!         m.call_return_empty()
//!     })
//!     .unwrap();
//! machine.add_link("Finish", DONE).unwrap();
//!
//! machine.set("Start").unwrap();
//! machine.step_until_done().unwrap();
//!
//! assert_eq!(
//!     machine.get_var::<Vec<String>>("collected"),
//!     Some(&vec!["A".to_string(), "B".to_string(), "C".to_string()])
//! );
//! ```

pub mod builder;
pub mod core;
pub mod machine;
pub mod stack;

// Re-export commonly used types
pub use crate::builder::{BuildError, MachineBuilder};
pub use crate::core::{State, StateRef, TransitionHistory, TransitionRecord};
pub use crate::machine::{MachineError, SharedMachine, StateMachine};
pub use crate::stack::{Frame, StackMachine};
