//! Errors raised by state and stack machines.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while wiring or driving a machine.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("Key \"{key}\" doesn't name a state in machine {machine}")]
    UnknownKey { key: String, machine: String },

    #[error("Cannot override constant state \"{key}\"")]
    ReservedKey { key: String },

    #[error("State \"{key}\" is already attached to machine {owner}")]
    AlreadyBound { key: String, owner: Uuid },

    #[error("State \"{key}\" is not registered with machine {machine}")]
    ForeignState { key: String, machine: String },

    #[error("Already progressed: \"{current}\" cannot also transit to \"{to}\"")]
    AlreadyProgressed { current: String, to: String },

    #[error("ERROR state entered from \"{from}\"")]
    EnterError { from: String },

    #[error("Machine {machine} is uninitialized")]
    Uninitialized { machine: String },

    #[error("Machine {machine} is stuck in ERROR state")]
    Stuck { machine: String },

    #[error("Constant state \"{key}\" must never be invoked")]
    ConstantInvoked { key: String },

    #[error("No stack frame in current state")]
    EmptyStack,

    #[error("Frame {depth} levels up does not exist (stack size {size})")]
    FrameOutOfRange { depth: usize, size: usize },

    #[error("Variable \"{name}\" is not bound in any frame")]
    UnboundVar { name: String },

    #[error("Argument passed to \"{state}\" is not a {expected}")]
    ArgumentType {
        state: String,
        expected: &'static str,
    },

    #[error("Return value already set for frame returning to \"{return_tag}\"")]
    ResultAlreadySet { return_tag: String },

    #[error("Stack underflow in machine {machine}: returned past the sentinel frame")]
    StackUnderflow {
        machine: String,
        #[source]
        source: Box<MachineError>,
    },

    #[error("Lock for machine {machine} was poisoned")]
    Poisoned { machine: String },

    #[error("History serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Fault(Box<dyn std::error::Error + Send + Sync>),

    #[error("Caught error in {machine} while invoking \"{state}\": {source}")]
    Invoke {
        machine: String,
        state: String,
        #[source]
        source: Box<MachineError>,
    },
}

impl MachineError {
    /// Wrap an application failure raised inside a state's `invoke`.
    pub fn fault<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Fault(error.into())
    }

    /// Strip any `Invoke` context layers and return the underlying error.
    pub fn root_cause(&self) -> &MachineError {
        match self {
            Self::Invoke { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True if this error (or its root cause) is a return past the sentinel frame.
    pub fn is_stack_underflow(&self) -> bool {
        matches!(self.root_cause(), Self::StackUnderflow { .. })
    }
}
