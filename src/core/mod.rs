//! Core state types.
//!
//! This module contains the pieces every machine is built from:
//! - The `State` trait and the `StateRef` handle the table stores
//! - The reserved constant states ERROR, UNINITIALIZED and DONE
//! - Bounded transition history

mod history;
mod state;

pub use history::{TransitionHistory, TransitionRecord, DEFAULT_HISTORY_LIMIT};
pub use state::{
    is_reserved, ConstantState, FnState, State, StateRef, DONE, ERROR, RESERVED_KEYS, UNINITIALIZED,
};
