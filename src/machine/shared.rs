//! Thread-safe handle around a machine.
//!
//! Every operation takes the machine's lock for its full duration, so
//! callers on different threads are serialized rather than run in parallel.
//! Nothing about lock acquisition order is guaranteed under contention.

use crate::core::StateRef;
use crate::machine::error::MachineError;
use crate::machine::state_machine::{Extension, StateMachine};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable, lock-protected machine handle.
///
/// # Example
///
/// ```rust
/// use stackwise::core::DONE;
/// use stackwise::machine::{SharedMachine, StateMachine};
///
/// let mut machine = StateMachine::new();
/// machine.add_link("A", DONE).unwrap();
/// machine.set("A").unwrap();
///
/// let shared = SharedMachine::new(machine);
/// let driver = shared.clone();
/// std::thread::spawn(move || driver.go()).join().unwrap().unwrap();
///
/// assert!(shared.is_done().unwrap());
/// ```
pub struct SharedMachine<X = ()> {
    name: Arc<str>,
    inner: Arc<Mutex<StateMachine<X>>>,
}

impl<X> Clone for SharedMachine<X> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<X> fmt::Debug for SharedMachine<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMachine")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<X: Extension> SharedMachine<X> {
    pub fn new(machine: StateMachine<X>) -> Self {
        Self {
            name: Arc::from(machine.name()),
            inner: Arc::new(Mutex::new(machine)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire the lock for a sequence of operations.
    pub fn lock(&self) -> Result<MutexGuard<'_, StateMachine<X>>, MachineError> {
        self.inner.lock().map_err(|_| MachineError::Poisoned {
            machine: self.name.to_string(),
        })
    }

    /// Run `f` with exclusive access to the machine.
    pub fn with<R>(&self, f: impl FnOnce(&mut StateMachine<X>) -> R) -> Result<R, MachineError> {
        let mut machine = self.lock()?;
        Ok(f(&mut machine))
    }

    pub fn step(&self) -> Result<bool, MachineError> {
        self.lock()?.step()
    }

    pub fn go(&self) -> Result<(), MachineError> {
        self.lock()?.go()
    }

    /// Holds the lock until DONE is reached.
    pub fn step_until_done(&self) -> Result<(), MachineError> {
        self.lock()?.step_until_done()
    }

    pub fn set(&self, key: &str) -> Result<(), MachineError> {
        self.lock()?.set(key)
    }

    pub fn reset(&self, key: &str) -> Result<(), MachineError> {
        self.lock()?.reset(key)
    }

    pub fn add_ref(&self, state: StateRef<X>) -> Result<Option<StateRef<X>>, MachineError> {
        self.lock()?.add_ref(state)
    }

    pub fn add_link(&self, tag: &str, next: &str) -> Result<Option<StateRef<X>>, MachineError> {
        self.lock()?.add_link(tag, next)
    }

    pub fn state_key(&self) -> Result<String, MachineError> {
        Ok(self.lock()?.state_key().to_string())
    }

    pub fn is_done(&self) -> Result<bool, MachineError> {
        Ok(self.lock()?.is_done())
    }

    /// Recover the machine once every other handle has been dropped.
    pub fn into_inner(self) -> Result<StateMachine<X>, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(Self {
                name: self.name,
                inner,
            }),
        }
    }
}
