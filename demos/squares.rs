//! Squares
//!
//! This example calls a squaring subroutine four times from a chain of
//! states and prints each step as the machine takes it.
//!
//! Key concepts:
//! - `call` pushes a frame and `call_return` hands a value back
//! - The caller reads the returned value as the RESULT variable
//! - Every call and every return is a separate step
//!
//! Run with: RUST_LOG=debug cargo run --example squares

use stackwise::core::DONE;
use stackwise::{MachineError, StackMachine};
use tracing_subscriber::EnvFilter;

fn report_and_call(m: &mut StackMachine, next: &str) -> Result<(), MachineError> {
    let i = *m.get_var::<i64>("i").unwrap_or(&0);
    if let Some(squared) = m.result::<i64>() {
        println!("  {i} squared is {squared}");
    }
    m.set_var("i", i + 1)?;
    m.call("X", i + 1, next)
}

fn main() -> Result<(), MachineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("=== Squares Example ===\n");

    let mut machine = StackMachine::new_stack();
    machine.add_fn("A", |m| {
        m.set_var("i", 1_i64)?;
        m.call("X", 1_i64, "B")
    })?;
    machine.add_fn("B", |m| report_and_call(m, "C"))?;
    machine.add_fn("C", |m| report_and_call(m, "D"))?;
    machine.add_fn("D", |m| report_and_call(m, "E"))?;
    machine.add_fn("E", |m| {
        let i = *m.get_var::<i64>("i").unwrap_or(&0);
        if let Some(squared) = m.result::<i64>() {
            println!("  {i} squared is {squared}");
        }
        m.transit(DONE)
    })?;
    machine.add_fn("X", |m| {
        let n = *m.argument::<i64>().ok_or(MachineError::ArgumentType {
            state: "X".to_string(),
            expected: "i64",
        })?;
        m.call_return(n * n)
    })?;

    machine.set("A")?;
    while machine.step()? {
        println!(
            "Step {:>2}: now at {:<4} (stack depth {})",
            machine.steps(),
            machine.state_key(),
            machine.stack_size()
        );
    }

    println!("\nPath: {}", machine.history().path().join(" "));
    println!("\n=== Example Complete ===");
    Ok(())
}
