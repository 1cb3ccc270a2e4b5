//! Integration tests for the flat state machine driver.

use stackwise::core::{DONE, ERROR, UNINITIALIZED};
use stackwise::{MachineBuilder, MachineError, StateMachine};
use std::sync::atomic::{AtomicUsize, Ordering};

fn abcd() -> StateMachine {
    let mut machine = StateMachine::new();
    machine.add_fn("A", |m| m.transit("B")).unwrap();
    machine.add_fn("B", |m| m.transit("C")).unwrap();
    machine.add_fn("C", |m| m.transit("D")).unwrap();
    machine.add_fn("D", |m| m.transit(DONE)).unwrap();
    machine.reset("A").unwrap();
    machine
}

fn sequence(machine: &StateMachine) -> String {
    machine.history().path().join(" ")
}

#[test]
fn manual_stepping_visits_every_state() {
    let mut machine = abcd();
    while machine.state_key() != DONE {
        machine.step().unwrap();
    }
    assert_eq!(sequence(&machine), "A B C D DONE");
}

#[test]
fn step_until_done_visits_every_state() {
    let mut machine = abcd();
    machine.step_until_done().unwrap();
    assert_eq!(sequence(&machine), "A B C D DONE");
    assert_eq!(machine.steps(), 4);
}

#[test]
fn go_drains_self_transitions() {
    let mut machine = abcd();
    let count = AtomicUsize::new(0);
    machine
        .add_fn("B", move |m| {
            let seen = count.fetch_add(1, Ordering::SeqCst) + 1;
            if seen >= 3 {
                m.transit("C")
            } else {
                m.transit("B")
            }
        })
        .unwrap();

    while !machine.is_done() {
        machine.go().unwrap();
    }
    assert_eq!(sequence(&machine), "A B B B C D DONE");
}

#[test]
fn reset_replays_a_finished_machine() {
    let mut machine = abcd();
    machine.step_until_done().unwrap();
    machine.reset("A").unwrap();
    machine.step_until_done().unwrap();
    assert_eq!(sequence(&machine), "A B C D DONE A B C D DONE");
}

#[test]
fn fresh_machine_refuses_to_step() {
    let mut machine = StateMachine::new();
    assert_eq!(machine.state_key(), UNINITIALIZED);

    for _ in 0..3 {
        let err = machine.step().unwrap_err();
        assert!(matches!(err, MachineError::Uninitialized { .. }));
    }
}

#[test]
fn done_never_invokes_anything_again() {
    let mut machine = abcd();
    machine.go().unwrap();
    let steps = machine.steps();
    let recorded = machine.history().len();

    for _ in 0..10 {
        assert!(!machine.step().unwrap());
    }
    machine.go().unwrap();
    machine.step_until_done().unwrap();

    assert_eq!(machine.steps(), steps);
    assert_eq!(machine.history().len(), recorded);
}

#[test]
fn deliberate_error_transition_is_refused() {
    let mut machine = StateMachine::new();
    machine.add_fn("Bail", |m| m.transit(ERROR)).unwrap();
    machine.set("Bail").unwrap();

    let err = machine.step().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        MachineError::EnterError { from } if from == "Bail"
    ));
    assert!(!err.is_stack_underflow());
    assert_eq!(machine.state_key(), "Bail");
}

#[test]
fn second_transition_in_one_activation_fails() {
    let mut machine = StateMachine::new();
    machine.add_link("B", DONE).unwrap();
    machine.add_link("C", DONE).unwrap();
    machine
        .add_fn("Twice", |m| {
            m.transit("B")?;
            m.transit("C")
        })
        .unwrap();
    machine.set("Twice").unwrap();

    let err = machine.step().unwrap_err();
    match err.root_cause() {
        MachineError::AlreadyProgressed { current, to } => {
            assert_eq!(current, "B");
            assert_eq!(to, "C");
        }
        other => panic!("Expected AlreadyProgressed, got {other:?}"),
    }
}

#[test]
fn stall_is_reported_not_raised() {
    let mut machine = MachineBuilder::new()
        .state_fn("Lazy", |_m| Ok(()))
        .initial("Lazy")
        .build()
        .unwrap();

    assert!(!machine.step().unwrap());
    assert!(!machine.step().unwrap());
    machine.go().unwrap();
    assert_eq!(machine.state_key(), "Lazy");
    assert_eq!(machine.steps(), 1);
}

#[test]
fn history_exports_as_json() {
    let mut machine = abcd();
    machine.go().unwrap();

    let json = machine.history().to_json().unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["from"], UNINITIALIZED);
    assert_eq!(records[0]["to"], "A");
    assert_eq!(records[4]["to"], DONE);
    assert_eq!(records[4]["step"], 4);
}
