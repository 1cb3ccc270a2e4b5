//! Single-transition state machine driver.

use crate::core::{
    is_reserved, ConstantState, FnState, State, StateRef, TransitionHistory, TransitionRecord,
    DONE, ERROR, UNINITIALIZED,
};
use crate::machine::error::MachineError;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

/// Callback notified after every committed `transit`, with the keys of the
/// state being left and the state being entered.
pub type TransitObserver = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Per-machine data that decides which built-in states a machine starts with.
///
/// `()` installs nothing. [`Stack`](crate::stack::Stack) installs the POP,
/// ITERATE and ITERATE1 pseudo-states.
pub trait Extension: Send + Sized + 'static {
    /// Register built-in states on a freshly constructed machine.
    fn install(_machine: &mut StateMachine<Self>) {}
}

impl Extension for () {}

/// Table of keyed states with a current-state pointer and a driver that
/// invokes exactly one state per step.
///
/// Each step clears the single-shot `progressed` flag and invokes the current
/// state, which must commit exactly one transition. Mutating methods take
/// `&mut self`; share a machine between threads with
/// [`SharedMachine`](crate::machine::SharedMachine).
///
/// # Example
///
/// ```rust
/// use stackwise::core::DONE;
/// use stackwise::machine::StateMachine;
///
/// let mut machine = StateMachine::new();
/// machine.add_link("A", "B").unwrap();
/// machine.add_link("B", DONE).unwrap();
///
/// machine.set("A").unwrap();
/// machine.step_until_done().unwrap();
///
/// assert!(machine.is_done());
/// assert_eq!(machine.history().path(), vec!["A", "B", "DONE"]);
/// ```
pub struct StateMachine<X = ()> {
    id: Uuid,
    name: String,
    table: HashMap<String, StateRef<X>>,
    current: StateRef<X>,
    progressed: bool,
    steps: u64,
    history: TransitionHistory,
    observers: Vec<TransitObserver>,
    extension: X,
}

impl StateMachine {
    /// Create a flat machine holding only the three reserved states.
    pub fn new() -> Self {
        Self::with_extension(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: Extension> StateMachine<X> {
    /// Create a machine around `extension` and let it install its built-ins.
    pub fn with_extension(extension: X) -> Self {
        let id = Uuid::new_v4();
        let simple = id.simple().to_string();
        let name = format!("machine-{}", &simple[..8]);

        let constant = |key: &'static str| StateRef::new_bound(ConstantState::new(key), id);
        let uninitialized = constant(UNINITIALIZED);
        let mut table = HashMap::new();
        table.insert(ERROR.to_string(), constant(ERROR));
        table.insert(DONE.to_string(), constant(DONE));
        table.insert(UNINITIALIZED.to_string(), uninitialized.clone());

        let mut machine = Self {
            id,
            name,
            table,
            current: uninitialized,
            progressed: false,
            steps: 0,
            history: TransitionHistory::default(),
            observers: Vec::new(),
            extension,
        };
        X::install(&mut machine);
        machine
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_history(&mut self, history: TransitionHistory) {
        self.history = history;
    }

    pub fn extension(&self) -> &X {
        &self.extension
    }

    pub fn extension_mut(&mut self) -> &mut X {
        &mut self.extension
    }

    /// The current state.
    pub fn state(&self) -> &StateRef<X> {
        &self.current
    }

    pub fn state_key(&self) -> &str {
        self.current.key()
    }

    pub fn is_done(&self) -> bool {
        self.current.key() == DONE
    }

    /// True if a transition has been committed since the last invoke began.
    pub fn progressed(&self) -> bool {
        self.progressed
    }

    /// Number of state invocations performed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn history(&self) -> &TransitionHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut TransitionHistory {
        &mut self.history
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    /// Keys of every registered state, reserved ones included.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Resolve a symbolic key to its registered state.
    pub fn decode_key(&self, key: &str) -> Result<StateRef<X>, MachineError> {
        self.table
            .get(key)
            .cloned()
            .ok_or_else(|| MachineError::UnknownKey {
                key: key.to_string(),
                machine: self.name.clone(),
            })
    }

    /// Add a state, replacing any state with the same key.
    ///
    /// Returns the replaced state, if any. Reserved keys are refused.
    pub fn add<S: State<X> + 'static>(
        &mut self,
        state: S,
    ) -> Result<Option<StateRef<X>>, MachineError> {
        self.add_ref(StateRef::new(state))
    }

    /// Add a state from a handle. The handle is bound to this machine and
    /// cannot be added anywhere else afterwards.
    pub fn add_ref(&mut self, state: StateRef<X>) -> Result<Option<StateRef<X>>, MachineError> {
        if is_reserved(state.key()) {
            return Err(MachineError::ReservedKey {
                key: state.key().to_string(),
            });
        }
        state.bind(self.id)?;
        debug!(machine = %self.name, state = state.key(), "state added");
        Ok(self.table.insert(state.key().to_string(), state))
    }

    /// Add a closure-backed state.
    pub fn add_fn<F>(
        &mut self,
        key: impl Into<String>,
        body: F,
    ) -> Result<Option<StateRef<X>>, MachineError>
    where
        F: Fn(&mut StateMachine<X>) -> Result<(), MachineError> + Send + Sync + 'static,
    {
        self.add(FnState::new(key, body))
    }

    /// Add a state that unconditionally transits from `tag` to `next`.
    pub fn add_link(
        &mut self,
        tag: impl Into<String>,
        next: impl Into<String>,
    ) -> Result<Option<StateRef<X>>, MachineError> {
        let next = next.into();
        self.add_fn(tag, move |machine| machine.transit(&next))
    }

    pub(crate) fn install_builtin<S: State<X> + 'static>(&mut self, state: S) {
        let state = StateRef::new_bound(state, self.id);
        self.table.insert(state.key().to_string(), state);
    }

    /// Register a callback fired after every committed `transit`.
    pub fn on_transit<F>(&mut self, observer: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub(crate) fn push_observer(&mut self, observer: TransitObserver) {
        self.observers.push(observer);
    }

    /// Select the next state by key. See [`set_state`](Self::set_state).
    pub fn set(&mut self, key: &str) -> Result<(), MachineError> {
        let state = self.decode_key(key)?;
        self.set_state(&state)
    }

    /// Select the next state.
    ///
    /// Fails if a transition was already committed in this activation, if
    /// the state belongs to another machine, or if the state is ERROR.
    pub fn set_state(&mut self, state: &StateRef<X>) -> Result<(), MachineError> {
        if self.progressed {
            return Err(MachineError::AlreadyProgressed {
                current: self.current.key().to_string(),
                to: state.key().to_string(),
            });
        }
        self.commit(state.clone())
    }

    /// Like `set`, but allowed even if a transition was already committed.
    /// Used to restart a machine or jump between states.
    pub fn reset(&mut self, key: &str) -> Result<(), MachineError> {
        let state = self.decode_key(key)?;
        self.reset_state(&state)
    }

    pub fn reset_state(&mut self, state: &StateRef<X>) -> Result<(), MachineError> {
        self.commit(state.clone())
    }

    /// Transit from the current state to the state named `key`.
    pub fn transit(&mut self, key: &str) -> Result<(), MachineError> {
        let state = self.decode_key(key)?;
        self.transit_state(&state)
    }

    /// Transit from the current state to `state`, then notify observers.
    pub fn transit_state(&mut self, state: &StateRef<X>) -> Result<(), MachineError> {
        let from = self.current.key().to_string();
        self.set_state(state)?;
        for observer in &self.observers {
            observer(&from, state.key());
        }
        Ok(())
    }

    fn commit(&mut self, state: StateRef<X>) -> Result<(), MachineError> {
        if !state.is_bound_to(self.id) {
            return Err(MachineError::ForeignState {
                key: state.key().to_string(),
                machine: self.name.clone(),
            });
        }
        if state.key() == ERROR {
            return Err(MachineError::EnterError {
                from: self.current.key().to_string(),
            });
        }

        debug!(
            machine = %self.name,
            from = self.current.key(),
            to = state.key(),
            "transition"
        );
        self.history.record(TransitionRecord {
            from: self.current.key().to_string(),
            to: state.key().to_string(),
            step: self.steps,
            timestamp: Utc::now(),
        });
        self.current = state;
        self.progressed = true;
        Ok(())
    }

    /// Invoke the current state once.
    ///
    /// Returns `Ok(false)` without invoking anything when the machine is
    /// DONE, or when the previous activation never transitioned (a stall,
    /// logged as a warning). Fails when the machine is UNINITIALIZED or in
    /// ERROR. Errors escaping the state are wrapped with machine and state
    /// context; the machine is not rolled back.
    pub fn step(&mut self) -> Result<bool, MachineError> {
        let current = self.current.clone();
        match current.key() {
            DONE => return Ok(false),
            ERROR => {
                return Err(MachineError::Stuck {
                    machine: self.name.clone(),
                })
            }
            UNINITIALIZED => {
                return Err(MachineError::Uninitialized {
                    machine: self.name.clone(),
                })
            }
            _ => {}
        }

        if self.progressed {
            self.progressed = false;
            self.steps += 1;
            trace!(machine = %self.name, state = current.key(), "invoke");
            current
                .invoke(self)
                .map_err(|source| MachineError::Invoke {
                    machine: self.name.clone(),
                    state: current.key().to_string(),
                    source: Box::new(source),
                })?;
        } else {
            warn!(machine = %self.name, state = current.key(), "stalled");
        }
        Ok(self.progressed)
    }

    /// Step until a step reports no transition.
    #[instrument(level = "debug", skip(self), fields(machine = %self.name))]
    pub fn go(&mut self) -> Result<(), MachineError> {
        while self.step()? {}
        Ok(())
    }

    /// Step until the machine reaches DONE.
    ///
    /// A stalled machine never reaches DONE, so this blocks forever on
    /// livelock. Intended for batch jobs and tests.
    #[instrument(level = "debug", skip(self), fields(machine = %self.name))]
    pub fn step_until_done(&mut self) -> Result<(), MachineError> {
        while !self.is_done() {
            self.step()?;
        }
        Ok(())
    }
}

impl<X> fmt::Display for StateMachine<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl<X: fmt::Debug> fmt::Debug for StateMachine<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("current", &self.current.key())
            .field("progressed", &self.progressed)
            .field("steps", &self.steps)
            .field("states", &self.table.len())
            .field("extension", &self.extension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RESERVED_KEYS;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn chain() -> StateMachine {
        let mut machine = StateMachine::new();
        machine.add_link("A", "B").unwrap();
        machine.add_link("B", "C").unwrap();
        machine.add_link("C", DONE).unwrap();
        machine
    }

    #[test]
    fn new_machine_holds_only_reserved_states() {
        let machine = StateMachine::new();
        let mut keys: Vec<&str> = machine.keys().collect();
        keys.sort_unstable();

        assert_eq!(keys, vec![DONE, ERROR, UNINITIALIZED]);
        assert_eq!(machine.state_key(), UNINITIALIZED);
        assert!(!machine.progressed());
    }

    #[test]
    fn step_fails_until_initialized() {
        let mut machine = chain();
        let err = machine.step().unwrap_err();
        assert!(matches!(err, MachineError::Uninitialized { .. }));

        machine.set("A").unwrap();
        assert!(machine.step().unwrap());
        assert_eq!(machine.state_key(), "B");
    }

    #[test]
    fn reserved_keys_cannot_be_added() {
        let mut machine = StateMachine::new();
        for key in RESERVED_KEYS {
            let err = machine.add_link(key, "A").unwrap_err();
            assert!(matches!(err, MachineError::ReservedKey { key: ref k } if k == key));
        }
    }

    #[test]
    fn add_returns_replaced_state() {
        let mut machine = StateMachine::new();
        assert!(machine.add_link("A", DONE).unwrap().is_none());

        let previous = machine.add_link("A", "B").unwrap();
        assert_eq!(previous.map(|s| s.key().to_string()), Some("A".to_string()));
    }

    #[test]
    fn state_cannot_join_two_machines() {
        let shared: StateRef =
            StateRef::new(FnState::new("A", |m: &mut StateMachine| m.transit(DONE)));

        let mut first = StateMachine::new();
        let mut second = StateMachine::new();
        first.add_ref(shared.clone()).unwrap();

        let err = second.add_ref(shared).unwrap_err();
        assert!(matches!(err, MachineError::AlreadyBound { owner, .. } if owner == first.id()));
        assert!(!second.contains_key("A"));
    }

    #[test]
    fn unknown_key_names_the_key() {
        let mut machine = StateMachine::new();
        let err = machine.set("Nowhere").unwrap_err();
        assert!(matches!(err, MachineError::UnknownKey { ref key, .. } if key == "Nowhere"));
        assert!(err.to_string().contains("Nowhere"));
    }

    #[test]
    fn error_state_cannot_be_entered() {
        let mut machine = StateMachine::new();
        let err = machine.set(ERROR).unwrap_err();
        assert!(matches!(err, MachineError::EnterError { .. }));

        let err = machine.reset(ERROR).unwrap_err();
        assert!(matches!(err, MachineError::EnterError { .. }));
        assert_eq!(machine.state_key(), UNINITIALIZED);
    }

    #[test]
    fn foreign_handle_is_rejected() {
        let mut machine = StateMachine::new();
        let mut other = StateMachine::new();
        other.add_link("A", DONE).unwrap();
        let foreign = other.decode_key("A").unwrap();

        let err = machine.set_state(&foreign).unwrap_err();
        assert!(matches!(err, MachineError::ForeignState { .. }));
    }

    #[test]
    fn second_set_before_step_is_rejected() {
        let mut machine = chain();
        machine.set("A").unwrap();
        let err = machine.set("B").unwrap_err();
        assert!(matches!(err, MachineError::AlreadyProgressed { .. }));

        machine.reset("B").unwrap();
        assert_eq!(machine.state_key(), "B");
    }

    #[test]
    fn double_transit_fails_with_context() {
        let mut machine = StateMachine::new();
        machine.add_link("B", DONE).unwrap();
        machine
            .add_fn("A", |m| {
                m.transit("B")?;
                m.transit("B")
            })
            .unwrap();
        machine.set("A").unwrap();

        let err = machine.step().unwrap_err();
        match &err {
            MachineError::Invoke { state, .. } => assert_eq!(state, "A"),
            other => panic!("Expected Invoke context, got {other:?}"),
        }
        assert!(matches!(
            err.root_cause(),
            MachineError::AlreadyProgressed { .. }
        ));
        assert!(err.to_string().contains("Already progressed"));
        // first transition stays committed
        assert_eq!(machine.state_key(), "B");
    }

    #[test]
    fn stall_returns_false_without_invoking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut machine = StateMachine::new();
        machine
            .add_fn("Idle", move |_m| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        machine.set("Idle").unwrap();

        assert!(!machine.step().unwrap());
        assert!(!machine.step().unwrap());
        assert!(!machine.step().unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(machine.steps(), 1);
    }

    #[test]
    fn done_is_a_permanent_no_op() {
        let mut machine = chain();
        machine.set("A").unwrap();
        machine.go().unwrap();
        assert!(machine.is_done());

        let steps = machine.steps();
        for _ in 0..5 {
            assert!(!machine.step().unwrap());
        }
        assert_eq!(machine.steps(), steps);
    }

    #[test]
    fn faults_are_wrapped_and_not_rolled_back() {
        let mut machine = StateMachine::new();
        machine
            .add_fn("Broken", |_m| Err(MachineError::fault("disk on fire")))
            .unwrap();
        machine.set("Broken").unwrap();

        let err = machine.step().unwrap_err();
        assert!(matches!(err.root_cause(), MachineError::Fault(_)));
        assert!(err.to_string().contains("disk on fire"));
        assert_eq!(machine.state_key(), "Broken");
        assert!(!machine.progressed());
    }

    #[test]
    fn observers_see_committed_transits() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut machine = chain();
        machine.on_transit(move |from, to| {
            sink.lock().unwrap().push(format!("{from}->{to}"));
        });

        machine.set("A").unwrap();
        machine.go().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec!["A->B", "B->C", "C->DONE"]);
    }

    #[test]
    fn replacing_a_state_affects_future_transitions_only() {
        let mut machine = StateMachine::new();
        machine.add_link("Next", "Old").unwrap();
        machine.add_link("Old", DONE).unwrap();
        machine
            .add_fn("A", |m| {
                m.add_link("Old", "Replaced")?;
                m.add_link("Replaced", DONE)?;
                m.transit("Next")
            })
            .unwrap();
        machine.set("A").unwrap();
        machine.go().unwrap();

        assert_eq!(
            machine.history().path(),
            vec!["A", "Next", "Old", "Replaced", "DONE"]
        );
    }

    #[test]
    fn display_uses_machine_name() {
        let machine = StateMachine::new();
        assert!(machine.to_string().starts_with("machine-"));
        assert_eq!(machine.to_string(), machine.name());
    }
}
