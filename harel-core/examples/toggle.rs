//! The smallest possible machine: two states and one event.
//!
//! Run with: `cargo run --example toggle`

use std::sync::Arc;

use harel_core::prelude::*;

#[derive(Debug, Clone, PartialEq, Default)]
struct ToggleContext;

#[derive(Debug, Clone, PartialEq)]
struct Toggle;

impl Event for Toggle {
    fn event_type(&self) -> &'static str {
        "TOGGLE"
    }
}

struct ToggleMachine;

impl MachineTypes for ToggleMachine {
    type Context = ToggleContext;
    type Event = Toggle;
    type Output = ();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut builder = MachineBuilder::new("toggle");
    let root = builder.root();
    let inactive = builder.state(root, "inactive");
    let active = builder.state(root, "active");
    builder.initial(root, inactive);
    builder.on(inactive, "TOGGLE").target(active);
    builder.on(active, "TOGGLE").target(inactive);
    let def = Arc::new(builder.build()?);

    // No timers and no actors, so a manual scheduler is all this machine
    // needs to run synchronously.
    let mut machine: Interpreter<ToggleMachine, _> = Interpreter::new(
        def,
        Registry::new(),
        ToggleContext,
        ManualScheduler::new(),
    )?;

    machine.start()?;
    println!("initial: {}", machine.snapshot().value);

    for _ in 0..3 {
        machine.send(Toggle)?;
        println!("after TOGGLE: {}", machine.snapshot().value);
    }

    Ok(())
}
