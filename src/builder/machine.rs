//! Builder for configuring machines.

use crate::builder::error::BuildError;
use crate::core::{FnState, State, StateRef, TransitionHistory, DEFAULT_HISTORY_LIMIT};
use crate::machine::{Extension, MachineError, StateMachine, TransitObserver};
use crate::stack::Stack;
use std::collections::HashSet;

/// Builder for constructing machines with a fluent API.
pub struct MachineBuilder<X: Extension = ()> {
    name: Option<String>,
    extension: X,
    states: Vec<StateRef<X>>,
    initial: Option<String>,
    history_limit: usize,
    observers: Vec<TransitObserver>,
}

impl MachineBuilder {
    /// Builder for a flat state machine.
    pub fn new() -> Self {
        Self::with_extension(())
    }
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineBuilder<Stack> {
    /// Builder for a stack machine.
    pub fn stack() -> Self {
        Self::with_extension(Stack::new())
    }
}

impl<X: Extension> MachineBuilder<X> {
    pub fn with_extension(extension: X) -> Self {
        Self {
            name: None,
            extension,
            states: Vec::new(),
            initial: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            observers: Vec::new(),
        }
    }

    /// Name used in logs and error context.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register a state.
    pub fn state<S: State<X> + 'static>(mut self, state: S) -> Self {
        self.states.push(StateRef::new(state));
        self
    }

    /// Register a closure-backed state.
    pub fn state_fn<F>(self, key: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut StateMachine<X>) -> Result<(), MachineError> + Send + Sync + 'static,
    {
        self.state(FnState::new(key, body))
    }

    /// Register an existing handle.
    pub fn state_ref(mut self, state: StateRef<X>) -> Self {
        self.states.push(state);
        self
    }

    /// Register a state that unconditionally transits from `tag` to `next`.
    pub fn link(self, tag: impl Into<String>, next: impl Into<String>) -> Self {
        let next = next.into();
        self.state_fn(tag, move |machine| machine.transit(&next))
    }

    /// State selected once the machine is built (optional).
    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(key.into());
        self
    }

    /// Keep at most `limit` transition records.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Do not record transitions.
    pub fn without_history(self) -> Self {
        self.history_limit(0)
    }

    /// Register a callback fired after every committed `transit`.
    pub fn on_transit<F>(mut self, observer: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
        self
    }

    /// Build the machine.
    ///
    /// Fails on duplicate keys, reserved keys, already-bound handles and an
    /// unknown initial key. Transition targets inside states are not checked
    /// here; they are resolved when taken.
    pub fn build(self) -> Result<StateMachine<X>, BuildError> {
        let mut seen = HashSet::new();
        for state in &self.states {
            if !seen.insert(state.key()) {
                return Err(BuildError::DuplicateKey {
                    key: state.key().to_string(),
                });
            }
        }

        let mut machine = StateMachine::with_extension(self.extension);
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(BuildError::EmptyName);
            }
            machine.set_name(name);
        }
        machine.set_history(TransitionHistory::with_limit(self.history_limit));
        for observer in self.observers {
            machine.push_observer(observer);
        }
        for state in self.states {
            machine.add_ref(state)?;
        }
        if let Some(initial) = self.initial {
            machine.set(&initial)?;
        }

        Ok(machine)
    }
}
