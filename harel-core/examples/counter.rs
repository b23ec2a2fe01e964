//! Guards and context updates, with no state hierarchy at all: every event
//! is handled on the root, and `DEC` only fires while the count is positive.
//!
//! Run with: `cargo run --example counter`

use std::sync::Arc;

use harel_core::prelude::*;

#[derive(Debug, Clone, PartialEq, Default)]
struct CounterContext {
    count: i64,
}

#[derive(Debug, Clone, PartialEq)]
enum CounterEvent {
    Inc,
    Dec,
    Set(i64),
}

impl Event for CounterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CounterEvent::Inc => "INC",
            CounterEvent::Dec => "DEC",
            CounterEvent::Set(_) => "SET",
        }
    }
}

struct Counter;

impl MachineTypes for Counter {
    type Context = CounterContext;
    type Event = CounterEvent;
    type Output = ();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut builder = MachineBuilder::new("counter");
    let root = builder.root();
    builder.on(root, "INC").action("increment");
    builder.on(root, "DEC").guard("isPositive").action("decrement");
    builder.on(root, "SET").action("set");
    let def = Arc::new(builder.build()?);

    let registry: Registry<Counter> = Registry::new()
        .guard("isPositive", |ctx: &CounterContext, _: Cause<'_, Counter>| {
            ctx.count > 0
        })
        .action("increment", |args: &mut ActionArgs<'_, Counter>| {
            args.context.count += 1;
        })
        .action("decrement", |args: &mut ActionArgs<'_, Counter>| {
            args.context.count -= 1;
        })
        .action("set", |args: &mut ActionArgs<'_, Counter>| {
            if let Some(CounterEvent::Set(value)) = args.cause.event() {
                args.context.count = *value;
            }
        });

    let mut machine = Interpreter::new(
        def,
        registry,
        CounterContext::default(),
        ManualScheduler::new(),
    )?;
    machine.start()?;

    // DEC at zero is guarded off.
    machine.send(CounterEvent::Dec)?;
    assert_eq!(machine.context().count, 0);

    machine.send(CounterEvent::Inc)?;
    machine.send(CounterEvent::Inc)?;
    machine.send(CounterEvent::Dec)?;
    println!("count = {}", machine.context().count);

    machine.send(CounterEvent::Set(40))?;
    machine.send(CounterEvent::Inc)?;
    machine.send(CounterEvent::Inc)?;
    println!("count = {}", machine.context().count);

    Ok(())
}
