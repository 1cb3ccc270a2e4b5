//! Bracket Iterate
//!
//! This example walks a list with the ITERATE combinator. Each element is
//! handed to a subroutine that wraps it in brackets and appends it to a
//! collection bound two frames up.
//!
//! Key concepts:
//! - `iterate` calls a subroutine once per element
//! - Dynamic variables are found by searching down the frame stack
//! - The iteration can be paused between any two steps
//!
//! Run with: cargo run --example bracket_iterate

use stackwise::core::DONE;
use stackwise::{MachineBuilder, MachineError};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("=== Bracket Iterate Example ===\n");

    let mut machine = MachineBuilder::stack()
        .name("brackets")
        .state_fn("T1", |m| {
            m.set_var("Collection", Vec::<String>::new())?;
            let stuff: Vec<String> = ["A", "B", "C", "D", "E"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            m.iterate(stuff, "Sub", "T2")
        })
        .state_fn("Sub", |m| {
            let element = m
                .argument::<String>()
                .cloned()
                .ok_or(MachineError::ArgumentType {
                    state: "Sub".to_string(),
                    expected: "String",
                })?;
            if let Some(collection) = m.get_var_mut::<Vec<String>>("Collection") {
                collection.push(format!("[{element}]"));
            }
            m.call_return_empty()
        })
        .state_fn("T2", |m| {
            if let Some(collection) = m.get_var::<Vec<String>>("Collection") {
                println!("Collected: {}", collection.join(", "));
            }
            m.transit(DONE)
        })
        .on_transit(|from, to| println!("  {from} -> {to}"))
        .initial("T1")
        .build()?;

    // Pause halfway through to show the machine is resumable.
    for _ in 0..8 {
        machine.step()?;
    }
    println!(
        "\nPaused at {} with {} frames\n",
        machine.state_key(),
        machine.stack_size()
    );

    machine.step_until_done()?;

    println!("\nPath: {}", machine.history().path().join(" "));
    println!("\n=== Example Complete ===");
    Ok(())
}
