//! Stack-aware operations available to states of a [`StackMachine`].
//!
//! These are meant to be called from inside a state's `invoke`, which
//! receives the machine as `&mut StackMachine`.

use crate::machine::MachineError;
use crate::stack::builtins::{IterateArgs, ITERATE, POP};
use crate::stack::{Frame, Stack, StackMachine, Value, RESULT};
use std::any::Any;
use tracing::trace;

impl StackMachine {
    /// Create a stack machine holding the reserved states, the POP,
    /// ITERATE and ITERATE1 pseudo-states, and the sentinel frame.
    pub fn new_stack() -> Self {
        Self::with_extension(Stack::new())
    }

    pub fn stack(&self) -> &Stack {
        self.extension()
    }

    pub fn stack_size(&self) -> usize {
        self.stack().len()
    }

    /// The current (top) frame.
    pub fn frame(&self) -> Result<&Frame, MachineError> {
        self.stack().top().ok_or(MachineError::EmptyStack)
    }

    pub fn frame_mut(&mut self) -> Result<&mut Frame, MachineError> {
        self.extension_mut()
            .top_mut()
            .ok_or(MachineError::EmptyStack)
    }

    /// The frame `depth` levels above the current one; `frame_at(0)` is
    /// the current frame. Use this for fixed-depth access without the
    /// dynamic search.
    pub fn frame_at(&self, depth: usize) -> Result<&Frame, MachineError> {
        let size = self.stack_size();
        self.stack()
            .get(depth)
            .ok_or(MachineError::FrameOutOfRange { depth, size })
    }

    pub fn frame_at_mut(&mut self, depth: usize) -> Result<&mut Frame, MachineError> {
        let size = self.stack_size();
        self.extension_mut()
            .get_mut(depth)
            .ok_or(MachineError::FrameOutOfRange { depth, size })
    }

    pub(crate) fn pop_frame(&mut self) -> Result<Frame, MachineError> {
        self.extension_mut().pop().ok_or(MachineError::EmptyStack)
    }

    /// Argument of the current frame, if it has type `T`.
    pub fn argument<T: Any>(&self) -> Option<&T> {
        self.stack().top()?.argument()
    }

    /// Value of the innermost binding of `name`, searching from the current
    /// frame down to the sentinel.
    ///
    /// Returns `None` if the name is unbound, bound to nothing, or bound to
    /// a value of another type. A binding of another type still shadows
    /// outer bindings.
    pub fn get_var<T: Any>(&self, name: &str) -> Option<&T> {
        self.stack().search(name)?.as_ref()?.downcast_ref()
    }

    pub fn get_var_mut<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        self.extension_mut()
            .search_mut(name)?
            .as_mut()?
            .downcast_mut()
    }

    /// True if any frame binds `name`.
    pub fn is_var_bound(&self, name: &str) -> bool {
        self.stack().search(name).is_some()
    }

    /// Bind `name` in the current frame, shadowing outer bindings.
    pub fn set_var<T: Any + Send>(
        &mut self,
        name: impl Into<String>,
        value: T,
    ) -> Result<(), MachineError> {
        self.frame_mut()?.set_var(name, value);
        Ok(())
    }

    /// Bind `name` in the current frame to an already boxed value, or to nothing.
    pub fn bind_var(
        &mut self,
        name: impl Into<String>,
        value: Option<Value>,
    ) -> Result<(), MachineError> {
        self.frame_mut()?.bind(name, value);
        Ok(())
    }

    /// Copy the value found for `from` into `to` in the current frame.
    pub fn dup_var<T: Any + Send + Clone>(
        &mut self,
        from: &str,
        to: impl Into<String>,
    ) -> Result<(), MachineError> {
        let value = self
            .get_var::<T>(from)
            .cloned()
            .ok_or_else(|| MachineError::UnboundVar {
                name: from.to_string(),
            })?;
        self.set_var(to, value)
    }

    /// Value returned by the most recent call. Read by the caller.
    pub fn result<T: Any>(&self) -> Option<&T> {
        self.get_var(RESULT)
    }

    /// Set the current frame's return value without returning yet.
    /// Read by the callee.
    pub fn set_result<T: Any + Send>(&mut self, value: T) -> Result<(), MachineError> {
        self.frame_mut()?.set_retval(Box::new(value))
    }

    /// Call the subroutine starting at `tag` with `argument`. When it
    /// returns, the machine transits to `return_tag`.
    pub fn call<T: Any + Send>(
        &mut self,
        tag: &str,
        argument: T,
        return_tag: &str,
    ) -> Result<(), MachineError> {
        self.call_with(tag, Some(Box::new(argument)), return_tag)
    }

    /// `call` with an already boxed argument, or none.
    pub fn call_with(
        &mut self,
        tag: &str,
        argument: Option<Value>,
        return_tag: &str,
    ) -> Result<(), MachineError> {
        let callee = self.decode_key(tag)?;
        self.extension_mut().push(Frame::new(return_tag, argument));
        trace!(machine = %self.name(), callee = tag, return_tag, "frame pushed");
        self.transit_state(&callee)
    }

    /// Return `result` to the caller.
    pub fn call_return<T: Any + Send>(&mut self, result: T) -> Result<(), MachineError> {
        self.set_result(result)?;
        self.transit(POP)
    }

    /// Return to the caller with whatever return value was set, if any.
    pub fn call_return_empty(&mut self) -> Result<(), MachineError> {
        self.transit(POP)
    }

    /// Call `sub_tag` once per value, one element per call/return edge,
    /// then continue at `next_tag`.
    pub fn iterate<I>(
        &mut self,
        values: I,
        sub_tag: &str,
        next_tag: &str,
    ) -> Result<(), MachineError>
    where
        I: IntoIterator,
        I::Item: Any + Send,
        I::IntoIter: Send + 'static,
    {
        self.call(ITERATE, IterateArgs::new(values, sub_tag), next_tag)
    }
}
