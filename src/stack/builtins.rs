//! Pseudo-states installed on every stack machine.

use crate::core::State;
use crate::machine::{MachineError, StateMachine};
use crate::stack::{Stack, StackMachine, Value, RESULT};
use std::any::Any;
use std::fmt;
use tracing::trace;

/// Pops the top frame and returns to its return tag.
pub const POP: &str = "POP";

/// Entry point of the iteration combinator.
pub const ITERATE: &str = "ITERATE";

/// Loop head of the iteration combinator.
pub const ITERATE1: &str = "ITERATE1";

/// Variable holding the iteration cursor in the ITERATE frame.
pub const ITERATOR_VAR: &str = "it";

/// Variable holding the per-element subroutine key in the ITERATE frame.
pub const SUB_TAG_VAR: &str = "sub_tag";

pub(crate) struct Cursor(Box<dyn Iterator<Item = Value> + Send>);

impl Cursor {
    fn next(&mut self) -> Option<Value> {
        self.0.next()
    }
}

/// Argument of the ITERATE state: the remaining values and the subroutine
/// to call once per value.
pub struct IterateArgs {
    cursor: Cursor,
    sub_tag: String,
}

impl IterateArgs {
    pub fn new<I>(values: I, sub_tag: impl Into<String>) -> Self
    where
        I: IntoIterator,
        I::Item: Any + Send,
        I::IntoIter: Send + 'static,
    {
        let values = values.into_iter().map(|v| Box::new(v) as Value);
        Self {
            cursor: Cursor(Box::new(values)),
            sub_tag: sub_tag.into(),
        }
    }

    pub fn sub_tag(&self) -> &str {
        &self.sub_tag
    }
}

impl fmt::Debug for IterateArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterateArgs")
            .field("sub_tag", &self.sub_tag)
            .finish_non_exhaustive()
    }
}

struct Pop;

impl State<Stack> for Pop {
    fn key(&self) -> &str {
        POP
    }

    fn invoke(&self, machine: &mut StackMachine) -> Result<(), MachineError> {
        let mut frame = machine.pop_frame()?;
        let retval = frame.take_retval();
        trace!(machine = %machine, return_tag = frame.return_tag(), "frame popped");
        if let Some(caller) = machine.extension_mut().top_mut() {
            caller.bind(RESULT, retval);
            return machine.transit(frame.return_tag());
        }

        // Only the sentinel has no caller; its return tag is ERROR.
        let name = machine.name().to_string();
        machine
            .transit(frame.return_tag())
            .map_err(|refusal| MachineError::StackUnderflow {
                machine: name,
                source: Box::new(refusal),
            })
    }
}

struct Iterate;

impl State<Stack> for Iterate {
    fn key(&self) -> &str {
        ITERATE
    }

    fn invoke(&self, machine: &mut StackMachine) -> Result<(), MachineError> {
        let args = machine
            .frame_mut()?
            .take_argument()
            .and_then(|value| value.downcast::<IterateArgs>().ok())
            .ok_or_else(|| MachineError::ArgumentType {
                state: ITERATE.to_string(),
                expected: "IterateArgs",
            })?;
        let IterateArgs { cursor, sub_tag } = *args;

        let frame = machine.frame_mut()?;
        frame.set_var(ITERATOR_VAR, cursor);
        frame.set_var(SUB_TAG_VAR, sub_tag);
        machine.transit(ITERATE1)
    }
}

struct Iterate1;

impl State<Stack> for Iterate1 {
    fn key(&self) -> &str {
        ITERATE1
    }

    fn invoke(&self, machine: &mut StackMachine) -> Result<(), MachineError> {
        let next = machine
            .get_var_mut::<Cursor>(ITERATOR_VAR)
            .ok_or_else(|| MachineError::UnboundVar {
                name: ITERATOR_VAR.to_string(),
            })?
            .next();

        match next {
            Some(element) => {
                let sub_tag = machine
                    .get_var::<String>(SUB_TAG_VAR)
                    .cloned()
                    .ok_or_else(|| MachineError::UnboundVar {
                        name: SUB_TAG_VAR.to_string(),
                    })?;
                machine.call_with(&sub_tag, Some(element), ITERATE1)
            }
            None => machine.call_return_empty(),
        }
    }
}

pub(super) fn install(machine: &mut StateMachine<Stack>) {
    machine.install_builtin(Pop);
    machine.install_builtin(Iterate);
    machine.install_builtin(Iterate1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DONE;

    #[test]
    fn builtins_are_registered() {
        let machine = StackMachine::new_stack();
        for key in [POP, ITERATE, ITERATE1] {
            assert!(machine.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn pop_delivers_retval_as_result() {
        let mut machine = StackMachine::new_stack();
        machine
            .add_fn("Caller", |m| m.call("Callee", (), "After"))
            .unwrap();
        machine
            .add_fn("Callee", |m| m.call_return("payload".to_string()))
            .unwrap();
        machine.add_link("After", DONE).unwrap();

        machine.set("Caller").unwrap();
        machine.go().unwrap();

        assert_eq!(machine.stack_size(), 1);
        assert_eq!(
            machine.result::<String>().map(String::as_str),
            Some("payload")
        );
    }

    #[test]
    fn iterate_rejects_foreign_argument() {
        let mut machine = StackMachine::new_stack();
        machine
            .add_fn("Start", |m| m.call(ITERATE, 42_u32, DONE))
            .unwrap();
        machine.set("Start").unwrap();
        machine.step().unwrap();

        let err = machine.step().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            MachineError::ArgumentType { state, .. } if state == ITERATE
        ));
    }

    #[test]
    fn iterate_moves_its_argument_into_frame_variables() {
        let mut machine = StackMachine::new_stack();
        machine
            .add_fn("Start", |m| m.iterate(vec![1_u8], "Inspect", "End"))
            .unwrap();
        machine
            .add_fn("Inspect", |m| {
                let iterate_frame = m.frame_at(1)?;
                let consumed = !iterate_frame.has_argument();
                let sub_tag = iterate_frame.var::<String>(SUB_TAG_VAR);
                let bound = iterate_frame.is_bound(ITERATOR_VAR)
                    && sub_tag.map(String::as_str) == Some("Inspect");
                m.call_return(consumed && bound)
            })
            .unwrap();
        machine.add_link("End", DONE).unwrap();

        machine.set("Start").unwrap();
        for _ in 0..4 {
            machine.step().unwrap();
        }
        assert_eq!(machine.state_key(), POP);
        assert_eq!(machine.frame().unwrap().retval::<bool>(), Some(&true));
    }

    #[test]
    fn iterate_over_nothing_returns_immediately() {
        let mut machine = StackMachine::new_stack();
        machine
            .add_fn("Start", |m| m.iterate(Vec::<u8>::new(), "Never", "End"))
            .unwrap();
        machine.add_link("End", DONE).unwrap();
        machine.set("Start").unwrap();
        machine.go().unwrap();

        assert!(machine.is_done());
        assert_eq!(
            machine.history().path(),
            vec!["Start", ITERATE, ITERATE1, POP, "End", DONE]
        );
        assert!(machine.is_var_bound(RESULT));
        assert!(machine.result::<()>().is_none());
    }
}
