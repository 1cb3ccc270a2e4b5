//! The `State` trait and the handle a machine keeps for every registered state.
//!
//! A state is a named unit of behavior. Its `invoke` receives the owning
//! machine and must trigger exactly one transition before returning.

use crate::machine::{MachineError, StateMachine};
use std::fmt;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Terminal fault state. It can never be entered deliberately.
pub const ERROR: &str = "ERROR";

/// State of a freshly constructed machine. Stepping from here fails.
pub const UNINITIALIZED: &str = "UNINITIALIZED";

/// Completion state. Stepping from here is a permanent no-op.
pub const DONE: &str = "DONE";

/// Keys that are pre-populated in every table and can never be overwritten.
pub const RESERVED_KEYS: [&str; 3] = [ERROR, UNINITIALIZED, DONE];

/// Returns true if `key` names one of the constant states.
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Trait for machine states.
///
/// `X` is the machine extension the state runs against: `()` for a flat
/// [`StateMachine`], [`Stack`](crate::stack::Stack) for a stack machine.
///
/// # Contract
///
/// `invoke` does its work and then calls exactly one transition-inducing
/// operation (`transit`, `call`, `call_return`, `iterate`). Zero transitions
/// is reported by the driver as a stall; a second transition fails with
/// [`MachineError::AlreadyProgressed`].
///
/// # Example
///
/// ```rust
/// use stackwise::core::{State, DONE};
/// use stackwise::machine::{MachineError, StateMachine};
///
/// struct Finish;
///
/// impl State for Finish {
///     fn key(&self) -> &str {
///         "Finish"
///     }
///
///     fn invoke(&self, machine: &mut StateMachine) -> Result<(), MachineError> {
///         machine.transit(DONE)
///     }
/// }
///
/// let mut machine = StateMachine::new();
/// machine.add(Finish).unwrap();
/// machine.set("Finish").unwrap();
/// machine.go().unwrap();
/// assert!(machine.is_done());
/// ```
pub trait State<X = ()>: Send + Sync {
    /// Unique key of this state within its machine.
    fn key(&self) -> &str;

    /// Whenever the machine is stepped, so is the current state.
    fn invoke(&self, machine: &mut StateMachine<X>) -> Result<(), MachineError>;
}

/// State backed by a closure.
pub struct FnState<F> {
    key: String,
    body: F,
}

impl<F> FnState<F> {
    /// Create a state named `key` whose behavior is `body`.
    pub fn new<X>(key: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut StateMachine<X>) -> Result<(), MachineError> + Send + Sync,
    {
        Self {
            key: key.into(),
            body,
        }
    }
}

impl<X, F> State<X> for FnState<F>
where
    F: Fn(&mut StateMachine<X>) -> Result<(), MachineError> + Send + Sync,
{
    fn key(&self) -> &str {
        &self.key
    }

    fn invoke(&self, machine: &mut StateMachine<X>) -> Result<(), MachineError> {
        (self.body)(machine)
    }
}

/// One of the three reserved sentinels. Invoking it always fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantState {
    key: &'static str,
}

impl ConstantState {
    pub(crate) const fn new(key: &'static str) -> Self {
        Self { key }
    }
}

impl<X> State<X> for ConstantState {
    fn key(&self) -> &str {
        self.key
    }

    fn invoke(&self, _machine: &mut StateMachine<X>) -> Result<(), MachineError> {
        Err(MachineError::ConstantInvoked {
            key: self.key.to_string(),
        })
    }
}

struct Node<X> {
    key: String,
    owner: OnceLock<Uuid>,
    state: Box<dyn State<X>>,
}

/// Shared handle to a registered state.
///
/// The handle carries the state's key and the id of the machine it is
/// bound to. A handle binds once: adding it to a second machine (or twice
/// to the same one) fails with [`MachineError::AlreadyBound`].
pub struct StateRef<X = ()> {
    node: Arc<Node<X>>,
}

impl<X> StateRef<X> {
    /// Wrap a state in an unbound handle.
    pub fn new<S: State<X> + 'static>(state: S) -> Self {
        let key = state.key().to_string();
        Self {
            node: Arc::new(Node {
                key,
                owner: OnceLock::new(),
                state: Box::new(state),
            }),
        }
    }

    pub(crate) fn new_bound<S: State<X> + 'static>(state: S, machine: Uuid) -> Self {
        let key = state.key().to_string();
        Self {
            node: Arc::new(Node {
                key,
                owner: OnceLock::from(machine),
                state: Box::new(state),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.node.key
    }

    /// Id of the owning machine, if bound.
    pub fn machine(&self) -> Option<Uuid> {
        self.node.owner.get().copied()
    }

    pub fn is_bound_to(&self, machine: Uuid) -> bool {
        self.machine() == Some(machine)
    }

    /// True if both handles point at the same registered state.
    pub fn same(&self, other: &StateRef<X>) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub(crate) fn bind(&self, machine: Uuid) -> Result<(), MachineError> {
        self.node
            .owner
            .set(machine)
            .map_err(|_| MachineError::AlreadyBound {
                key: self.key().to_string(),
                owner: self.machine().unwrap_or(machine),
            })
    }

    pub(crate) fn invoke(&self, machine: &mut StateMachine<X>) -> Result<(), MachineError> {
        self.node.state.invoke(machine)
    }
}

impl<X> Clone for StateRef<X> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<X> fmt::Debug for StateRef<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRef")
            .field("key", &self.key())
            .field("machine", &self.machine())
            .finish()
    }
}

impl<X> fmt::Display for StateRef<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State {}", self.key())
    }
}
