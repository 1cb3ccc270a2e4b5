//! Macros for declaring states.

/// Declare a unit struct implementing `State` with a fixed key.
///
/// The body receives the machine under the given name and returns
/// `Result<(), MachineError>`. Add `for Ext` to target a machine extension;
/// without it the state targets a flat machine.
///
/// # Example
///
/// ```
/// use stackwise::core::DONE;
/// use stackwise::machine::StateMachine;
/// use stackwise::stack::{Stack, StackMachine};
/// use stackwise::state;
///
/// state! {
///     /// Finishes the machine.
///     pub Finish: "Finish" => |m| { m.transit(DONE) }
/// }
///
/// state! {
///     Double: "Double" for Stack => |m| {
///         let n = *m.argument::<u32>().unwrap_or(&0);
///         m.call_return(n * 2)
///     }
/// }
///
/// let mut flat = StateMachine::new();
/// flat.add(Finish).unwrap();
/// flat.set("Finish").unwrap();
/// flat.go().unwrap();
/// assert!(flat.is_done());
///
/// let mut stack = StackMachine::new_stack();
/// stack.add(Double).unwrap();
/// ```
#[macro_export]
macro_rules! state {
    (
        $(#[$meta:meta])*
        $vis:vis $name:ident : $key:literal for $ext:ty => |$machine:ident| $body:block
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        $vis struct $name;

        impl $crate::core::State<$ext> for $name {
            fn key(&self) -> &str {
                $key
            }

            fn invoke(
                &self,
                $machine: &mut $crate::machine::StateMachine<$ext>,
            ) -> ::std::result::Result<(), $crate::machine::MachineError> {
                $body
            }
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis $name:ident : $key:literal => |$machine:ident| $body:block
    ) => {
        $crate::state! {
            $(#[$meta])*
            $vis $name : $key for () => |$machine| $body
        }
    };
}
