//! Stack machine: subroutine calls and dynamic variables on an explicit
//! frame stack.
//!
//! A [`StackMachine`] is a [`StateMachine`] whose extension is a [`Stack`]
//! of [`Frame`]s. Calls push a frame and transit to the callee; returns
//! transit to the built-in POP state, which pops the frame and transits to
//! its return tag. Because every call and return is its own step, a long
//! computation stays resumable between steps.
//!
//! The bottom of the stack is a sentinel frame whose return tag is ERROR.
//! Returning past it makes POP attempt to enter ERROR, which is always
//! refused. POP reports that refusal as
//! [`MachineError::StackUnderflow`](crate::machine::MachineError::StackUnderflow),
//! so underflow stays distinct from a frame that deliberately returns to ERROR.
//!
//! # Example
//!
//! ```rust
//! use stackwise::core::DONE;
//! use stackwise::stack::StackMachine;
//!
//! let mut machine = StackMachine::new_stack();
//! machine
//!     .add_fn("Main", |m| m.call("Square", 7_i64, "Report"))
//!     .unwrap();
//! machine
//!     .add_fn("Square", |m| {
//!         let n = *m.argument::<i64>().unwrap_or(&0);
//!         m.call_return(n * n)
//!     })
//!     .unwrap();
//! machine
//!     .add_fn("Report", |m| {
//!         let squared = *m.result::<i64>().unwrap_or(&0);
//!         m.set_var("answer", squared)?;
//!         m.transit(DONE)
//!     })
//!     .unwrap();
//!
//! machine.set("Main").unwrap();
//! machine.go().unwrap();
//! assert_eq!(machine.get_var::<i64>("answer"), Some(&49));
//! ```

mod builtins;
mod frame;
mod machine;

pub use builtins::{IterateArgs, ITERATE, ITERATE1, ITERATOR_VAR, POP, SUB_TAG_VAR};
pub use frame::{Frame, Value};

use crate::core::ERROR;
use crate::machine::{Extension, StateMachine};

/// Variable in the caller's frame that receives a callee's return value.
pub const RESULT: &str = "RESULT";

/// A state machine with an explicit frame stack.
pub type StackMachine = StateMachine<Stack>;

/// LIFO stack of frames, seeded with the ERROR-returning sentinel.
#[derive(Debug)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(ERROR, None)],
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Frame `depth` levels below the top; 0 is the top.
    pub fn get(&self, depth: usize) -> Option<&Frame> {
        let index = self.frames.len().checked_sub(depth + 1)?;
        self.frames.get(index)
    }

    pub fn get_mut(&mut self, depth: usize) -> Option<&mut Frame> {
        let index = self.frames.len().checked_sub(depth + 1)?;
        self.frames.get_mut(index)
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Innermost binding of `name`, searching from the top frame down.
    pub fn search(&self, name: &str) -> Option<&Option<Value>> {
        self.frames.iter().rev().find_map(|f| f.binding(name))
    }

    pub fn search_mut(&mut self, name: &str) -> Option<&mut Option<Value>> {
        self.frames.iter_mut().rev().find_map(|f| f.binding_mut(name))
    }

    /// Frames from the top down.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for Stack {
    fn install(machine: &mut StateMachine<Self>) {
        builtins::install(machine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stack_holds_sentinel() {
        let stack = Stack::new();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.top().map(Frame::return_tag), Some(ERROR));
    }

    #[test]
    fn get_counts_from_the_top() {
        let mut stack = Stack::new();
        stack.push(Frame::new("First", None));
        stack.push(Frame::new("Second", None));

        assert_eq!(stack.get(0).map(Frame::return_tag), Some("Second"));
        assert_eq!(stack.get(1).map(Frame::return_tag), Some("First"));
        assert_eq!(stack.get(2).map(Frame::return_tag), Some(ERROR));
        assert!(stack.get(3).is_none());
    }

    #[test]
    fn search_finds_innermost_binding() {
        let mut stack = Stack::new();
        stack.top_mut().unwrap().set_var("x", 1_i32);
        stack.push(Frame::new("Inner", None));
        stack.top_mut().unwrap().set_var("x", 2_i32);
        stack.push(Frame::new("Innermost", None));

        let found = stack.search("x").and_then(|v| v.as_ref());
        assert_eq!(found.and_then(|v| v.downcast_ref::<i32>()), Some(&2));

        stack.pop();
        stack.pop();
        let found = stack.search("x").and_then(|v| v.as_ref());
        assert_eq!(found.and_then(|v| v.downcast_ref::<i32>()), Some(&1));
    }

    #[test]
    fn frames_iterate_top_down() {
        let mut stack = Stack::new();
        stack.push(Frame::new("A", None));
        stack.push(Frame::new("B", None));

        let tags: Vec<&str> = stack.frames().map(Frame::return_tag).collect();
        assert_eq!(tags, vec!["B", "A", ERROR]);
    }
}
