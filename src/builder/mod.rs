//! Builder API for configuring machines.
//!
//! This module provides a fluent builder and a declaration macro for
//! wiring up machines with minimal boilerplate.

pub mod error;
pub mod machine;
pub mod macros;

pub use error::BuildError;
pub use machine::MachineBuilder;

use crate::machine::{Extension, StateMachine};

/// Build a machine that walks `keys` in order and then reaches DONE.
///
/// # Example
///
/// ```
/// use stackwise::builder::chain;
///
/// let mut machine = chain(&["Fetch", "Parse", "Store"]).unwrap();
/// machine.set("Fetch").unwrap();
/// machine.step_until_done().unwrap();
///
/// assert_eq!(
///     machine.history().path(),
///     vec!["Fetch", "Parse", "Store", "DONE"]
/// );
/// ```
pub fn chain(keys: &[&str]) -> Result<StateMachine, BuildError> {
    chain_with(MachineBuilder::new(), keys)
}

/// Add a linear chain of links ending in DONE to `builder` and build it.
pub fn chain_with<X: Extension>(
    builder: MachineBuilder<X>,
    keys: &[&str],
) -> Result<StateMachine<X>, BuildError> {
    let next = keys
        .iter()
        .skip(1)
        .copied()
        .chain(std::iter::once(crate::core::DONE));
    keys.iter()
        .copied()
        .zip(next)
        .fold(builder, |builder, (tag, next)| builder.link(tag, next))
        .build()
}
