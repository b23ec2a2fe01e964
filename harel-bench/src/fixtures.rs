//! Machine shapes shared by the benchmark targets.

use std::sync::Arc;

use harel_core::prelude::*;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BenchContext {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchEvent(pub &'static str);

impl Event for BenchEvent {
    fn event_type(&self) -> &'static str {
        self.0
    }
}

pub struct BenchTypes;

impl MachineTypes for BenchTypes {
    type Context = BenchContext;
    type Event = BenchEvent;
    type Output = ();
}

pub type BenchInterp = Interpreter<BenchTypes, ManualScheduler<BenchTypes>>;

pub fn counting_registry() -> Registry<BenchTypes> {
    Registry::new().action("count", |args: &mut ActionArgs<'_, BenchTypes>| {
        args.context.count += 1;
    })
}

pub fn interpreter(def: MachineDef, registry: Registry<BenchTypes>) -> BenchInterp {
    let mut interpreter = Interpreter::new(
        Arc::new(def),
        registry,
        BenchContext::default(),
        ManualScheduler::new(),
    )
    .expect("registry is complete");
    interpreter.start().expect("fresh interpreter starts");
    interpreter
}

/// Two flat states ping-ponging on one event.
pub fn flat_machine() -> MachineDef {
    let mut builder = MachineBuilder::new("flat");
    let root = builder.root();
    let a = builder.state(root, "a");
    let b = builder.state(root, "b");
    builder.initial(root, a);
    builder.on(a, "PING").target(b).action("count");
    builder.on(b, "PING").target(a).action("count");
    builder.build().expect("definition is valid")
}

/// A chain of nested compound states, `depth` levels deep, where only the
/// outermost state handles the event — worst case for bubbling.
pub fn nested_machine(depth: usize) -> MachineDef {
    let mut builder = MachineBuilder::new("nested");
    let root = builder.root();
    let outer = builder.state(root, "outer");
    let other = builder.state(root, "other");
    builder.initial(root, outer);
    builder.on(other, "PING").target(outer);

    let mut parent = outer;
    for level in 0..depth {
        let name: &'static str = Box::leak(format!("level{level}").into_boxed_str());
        let child = builder.state(parent, name);
        builder.initial(parent, child);
        parent = child;
    }
    builder.on(outer, "PING").target(other).action("count");
    builder.build().expect("definition is valid")
}

/// `regions` parallel regions, each flipping its own two states on the
/// same event type — every region fires per send.
pub fn parallel_machine(regions: usize) -> MachineDef {
    let mut builder = MachineBuilder::new_parallel("parallel");
    let root = builder.root();
    for index in 0..regions {
        let name: &'static str = Box::leak(format!("region{index}").into_boxed_str());
        let region = builder.state(root, name);
        let a = builder.state(region, "a");
        let b = builder.state(region, "b");
        builder.initial(region, a);
        builder.on(a, "PING").target(b).action("count");
        builder.on(b, "PING").target(a).action("count");
    }
    builder.build().expect("definition is valid")
}
