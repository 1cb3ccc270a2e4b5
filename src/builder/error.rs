//! Build errors for machine builders.

use crate::machine::MachineError;
use thiserror::Error;

/// Errors that can occur when building a machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("State key \"{key}\" is defined more than once")]
    DuplicateKey { key: String },

    #[error("Machine name must not be empty")]
    EmptyName,

    #[error(transparent)]
    Machine(#[from] MachineError),
}
