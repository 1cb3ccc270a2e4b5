//! Shared Driver
//!
//! This example drives one machine from a worker thread while the main
//! thread inspects it and extends its state table between steps.
//!
//! Key concepts:
//! - `SharedMachine` serializes every operation behind one lock
//! - States can be added while another thread is stepping
//! - A state that makes no transition stalls without failing
//!
//! Run with: RUST_LOG=stackwise=debug cargo run --example shared_driver

use stackwise::core::DONE;
use stackwise::{MachineError, SharedMachine, StateMachine};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), MachineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("=== Shared Driver Example ===\n");

    let mut machine = StateMachine::new();
    machine.add_fn("Poll", |m| {
        // Keep polling until someone installs the "Ready" state.
        if m.contains_key("Ready") {
            m.transit("Ready")
        } else {
            m.transit("Poll")
        }
    })?;
    machine.set("Poll")?;

    let shared = SharedMachine::new(machine);
    let driver = {
        let shared = shared.clone();
        thread::spawn(move || -> Result<u64, MachineError> {
            while !shared.is_done()? {
                shared.step()?;
                thread::sleep(Duration::from_millis(5));
            }
            shared.with(|m| m.steps())
        })
    };

    thread::sleep(Duration::from_millis(50));
    info!(state = %shared.state_key()?, "installing Ready");
    shared.add_link("Ready", DONE)?;

    let steps = match driver.join() {
        Ok(result) => result?,
        Err(_) => {
            return Err(MachineError::Poisoned {
                machine: shared.name().to_string(),
            })
        }
    };

    println!("Driver finished after {steps} steps");
    println!("Final state: {}", shared.state_key()?);
    println!("\n=== Example Complete ===");
    Ok(())
}
