//! Activation records.

use crate::machine::MachineError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Opaque value carried in arguments, return values and variables.
pub type Value = Box<dyn Any + Send>;

/// Activation record pushed by `call` and popped by POP.
///
/// A variable may be bound to no value; such a binding still shadows the
/// same name in outer frames.
///
/// The argument is never replaced. The ITERATE pseudo-state consumes its
/// argument, moving the cursor into the `it` variable, so an ITERATE frame
/// reports no argument once iteration has started.
pub struct Frame {
    return_tag: String,
    argument: Option<Value>,
    retval: Option<Value>,
    vars: HashMap<String, Option<Value>>,
}

impl Frame {
    pub fn new(return_tag: impl Into<String>, argument: Option<Value>) -> Self {
        Self {
            return_tag: return_tag.into(),
            argument,
            retval: None,
            vars: HashMap::new(),
        }
    }

    /// Key the machine transits to when this frame is popped.
    pub fn return_tag(&self) -> &str {
        &self.return_tag
    }

    /// The argument, if present and of type `T`.
    pub fn argument<T: Any>(&self) -> Option<&T> {
        self.argument.as_ref()?.downcast_ref()
    }

    pub fn has_argument(&self) -> bool {
        self.argument.is_some()
    }

    pub(crate) fn take_argument(&mut self) -> Option<Value> {
        self.argument.take()
    }

    pub fn retval<T: Any>(&self) -> Option<&T> {
        self.retval.as_ref()?.downcast_ref()
    }

    pub fn has_retval(&self) -> bool {
        self.retval.is_some()
    }

    /// Set the return value. It can be written once.
    pub fn set_retval(&mut self, value: Value) -> Result<(), MachineError> {
        if self.retval.is_some() {
            return Err(MachineError::ResultAlreadySet {
                return_tag: self.return_tag.clone(),
            });
        }
        self.retval = Some(value);
        Ok(())
    }

    pub(crate) fn take_retval(&mut self) -> Option<Value> {
        self.retval.take()
    }

    /// Value of a variable bound in this frame, if it has type `T`.
    pub fn var<T: Any>(&self, name: &str) -> Option<&T> {
        self.vars.get(name)?.as_ref()?.downcast_ref()
    }

    pub fn var_mut<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        self.vars.get_mut(name)?.as_mut()?.downcast_mut()
    }

    /// Bind `name` to `value`. Passing an already boxed [`Value`] boxes it
    /// again; use [`bind`](Self::bind) for those.
    pub fn set_var<T: Any + Send>(&mut self, name: impl Into<String>, value: T) {
        self.vars.insert(name.into(), Some(Box::new(value)));
    }

    /// Bind `name` to an already boxed value, or to nothing.
    pub fn bind(&mut self, name: impl Into<String>, value: Option<Value>) {
        self.vars.insert(name.into(), value);
    }

    /// Remove the binding, exposing any outer binding of the same name.
    pub fn unset_var(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name).flatten()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub(crate) fn binding(&self, name: &str) -> Option<&Option<Value>> {
        self.vars.get(name)
    }

    pub(crate) fn binding_mut(&mut self, name: &str) -> Option<&mut Option<Value>> {
        self.vars.get_mut(name)
    }

    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut vars: Vec<&str> = self.var_names().collect();
        vars.sort_unstable();
        f.debug_struct("Frame")
            .field("return_tag", &self.return_tag)
            .field("argument", &self.argument.is_some())
            .field("retval", &self.retval.is_some())
            .field("vars", &vars)
            .finish()
    }
}
