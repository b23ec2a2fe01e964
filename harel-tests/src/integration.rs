//! End-to-end machines run deterministically on the manual scheduler:
//! every timer expiry and actor settlement is delivered by hand.

use std::sync::Arc;

use harel_core::prelude::*;

use crate::common::setup_tracing;

mod signup_form {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct FormContext {
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum FormEvent {
        Submit,
        UpdateEmail(String),
        UpdatePassword(String),
        Retry,
        Reset,
    }

    impl Event for FormEvent {
        fn event_type(&self) -> &'static str {
            match self {
                FormEvent::Submit => "SUBMIT",
                FormEvent::UpdateEmail(_) => "UPDATE_EMAIL",
                FormEvent::UpdatePassword(_) => "UPDATE_PASSWORD",
                FormEvent::Retry => "RETRY",
                FormEvent::Reset => "RESET",
            }
        }
    }

    pub struct Form;

    impl MachineTypes for Form {
        type Context = FormContext;
        type Event = FormEvent;
        type Output = String;
    }

    pub fn machine() -> (Interpreter<Form, ManualScheduler<Form>>, ManualScheduler<Form>) {
        let mut builder = MachineBuilder::new("signupForm");
        let root = builder.root();
        let editing = builder.state(root, "editing");
        let submitting = builder.state(root, "submitting");
        let success = builder.state(root, "success");
        let error = builder.state(root, "error");
        builder.initial(root, editing);
        builder.on(editing, "SUBMIT").target(submitting);
        builder.on(editing, "UPDATE_EMAIL").action("setEmail");
        builder.on(editing, "UPDATE_PASSWORD").action("setPassword");
        builder.invoke(submitting, "submitForm");
        builder.on_done(submitting).target(success);
        builder.on_error(submitting).target(error);
        builder.on(success, "RESET").target(editing).action("clear");
        builder.on(error, "RETRY").target(submitting);
        builder.on(error, "RESET").target(editing).action("clear");
        let def = Arc::new(builder.build().expect("definition is valid"));

        let registry: Registry<Form> = Registry::new()
            .action("setEmail", |args: &mut ActionArgs<'_, Form>| {
                if let Some(FormEvent::UpdateEmail(value)) = args.cause.event() {
                    args.context.email = value.clone();
                }
            })
            .action("setPassword", |args: &mut ActionArgs<'_, Form>| {
                if let Some(FormEvent::UpdatePassword(value)) = args.cause.event() {
                    args.context.password = value.clone();
                }
            })
            .action("clear", |args: &mut ActionArgs<'_, Form>| {
                *args.context = FormContext::default();
            })
            .actor("submitForm", |ctx: &FormContext| {
                let email = ctx.email.clone();
                async move {
                    if email.is_empty() {
                        Err(ActorFailure::new("email is required"))
                    } else {
                        Ok(format!("registered {email}"))
                    }
                }
            });

        let scheduler = ManualScheduler::new();
        let mut interpreter =
            Interpreter::new(def, registry, FormContext::default(), scheduler.clone())
                .expect("registry is complete");
        interpreter.start().expect("fresh interpreter starts");
        (interpreter, scheduler)
    }
}

#[test]
fn submitting_an_invalid_form_fails_and_recovers_via_retry() {
    setup_tracing();
    use signup_form::FormEvent;
    let (mut form, scheduler) = signup_form::machine();

    form.send(FormEvent::Submit).unwrap();
    assert_eq!(form.snapshot().value.leaf(), Some("submitting"));
    assert_eq!(scheduler.task_count(), 1);

    let settlement = scheduler.settle_next().unwrap();
    form.deliver(settlement);
    let snapshot = form.snapshot();
    assert_eq!(snapshot.value.leaf(), Some("error"));
    assert_eq!(snapshot.error.as_deref(), Some("email is required"));

    // Fill the form in, retry, and this time the submission settles Ok.
    form.send(FormEvent::Reset).unwrap();
    form.send(FormEvent::UpdateEmail("ada@example.com".into()))
        .unwrap();
    form.send(FormEvent::UpdatePassword("hunter2".into()))
        .unwrap();
    form.send(FormEvent::Submit).unwrap();
    let settlement = scheduler.settle_next().unwrap();
    form.deliver(settlement);

    let snapshot = form.snapshot();
    assert_eq!(snapshot.value.leaf(), Some("success"));
    assert_eq!(snapshot.error, None);
}

#[test]
fn resetting_from_success_clears_the_context() {
    setup_tracing();
    use signup_form::FormEvent;
    let (mut form, scheduler) = signup_form::machine();

    form.send(FormEvent::UpdateEmail("ada@example.com".into()))
        .unwrap();
    form.send(FormEvent::Submit).unwrap();
    let settlement = scheduler.settle_next().unwrap();
    form.deliver(settlement);
    assert_eq!(form.snapshot().value.leaf(), Some("success"));

    form.send(FormEvent::Reset).unwrap();
    let snapshot = form.snapshot();
    assert_eq!(snapshot.value.leaf(), Some("editing"));
    assert_eq!(snapshot.context.email, "");
}

mod editor {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct EditorContext {
        pub value: String,
        pub committed: String,
        pub should_save: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum EditorEvent {
        Focus,
        Change(String),
        Retry,
    }

    impl Event for EditorEvent {
        fn event_type(&self) -> &'static str {
            match self {
                EditorEvent::Focus => "text.focus",
                EditorEvent::Change(_) => "text.change",
                EditorEvent::Retry => "text.retry",
            }
        }
    }

    pub struct Editor;

    impl MachineTypes for Editor {
        type Context = EditorContext;
        type Event = EditorEvent;
        type Output = String;
    }

    pub struct Harness {
        pub machine: Interpreter<Editor, ManualScheduler<Editor>>,
        pub scheduler: ManualScheduler<Editor>,
        pub def: Arc<MachineDef>,
        /// While set, the save actor settles with a failure.
        pub fail_saves: Arc<AtomicBool>,
    }

    pub fn machine() -> Harness {
        let mut builder = MachineBuilder::new_parallel("textEditor");
        let root = builder.root();

        let input = builder.state(root, "input");
        let idle = builder.state(input, "idle");
        let debouncing = builder.state(input, "debouncing");
        builder.initial(input, idle);
        builder.on(idle, "text.change").target(debouncing).action("setValue");
        builder
            .on(debouncing, "text.change")
            .target(debouncing)
            .action("setValue")
            .reenter();
        builder
            .after(debouncing, Duration::from_millis(500))
            .guard("hasChanges")
            .target(idle)
            .action("markDirty")
            .or()
            .target(idle);

        let connection = builder.state(root, "connection");
        let disconnected = builder.state(connection, "disconnected");
        let connecting = builder.state(connection, "connecting");
        let connected = builder.state(connection, "connected");
        builder.initial(connection, disconnected);
        builder.on(disconnected, "text.focus").target(connecting);
        builder.invoke(connecting, "connect");
        builder.on_done(connecting).target(connected);
        builder.on_error(connecting).target(disconnected);

        let saving = builder.state(root, "saving");
        let save_idle = builder.state(saving, "idle");
        let save_active = builder.state(saving, "saving");
        let save_error = builder.state(saving, "error");
        builder.initial(saving, save_idle);
        builder
            .always(save_idle)
            .guard("shouldSave")
            .target(save_active);
        builder.entry(save_active, "clearDirty");
        builder.invoke(save_active, "saveText");
        builder.on_done(save_active).target(save_idle).action("commit");
        builder.on_error(save_active).target(save_error);
        builder.on(save_error, "text.retry").target(save_active);

        let def = Arc::new(builder.build().expect("definition is valid"));

        let fail_saves = Arc::new(AtomicBool::new(false));
        let flaky = Arc::clone(&fail_saves);
        let registry: Registry<Editor> = Registry::new()
            .guard("hasChanges", |ctx: &EditorContext, _: Cause<'_, Editor>| {
                ctx.value != ctx.committed
            })
            .guard("shouldSave", |ctx: &EditorContext, _: Cause<'_, Editor>| {
                ctx.should_save && ctx.value != ctx.committed
            })
            .action("setValue", |args: &mut ActionArgs<'_, Editor>| {
                if let Some(EditorEvent::Change(value)) = args.cause.event() {
                    args.context.value = value.clone();
                    args.context.should_save = false;
                }
            })
            .action("markDirty", |args: &mut ActionArgs<'_, Editor>| {
                args.context.should_save = true;
            })
            .action("clearDirty", |args: &mut ActionArgs<'_, Editor>| {
                args.context.should_save = false;
            })
            .action("commit", |args: &mut ActionArgs<'_, Editor>| {
                if let Some(saved) = args.cause.output() {
                    args.context.committed = saved.clone();
                }
            })
            .actor("connect", |_: &EditorContext| async { Ok(String::new()) })
            .actor("saveText", move |ctx: &EditorContext| {
                let text = ctx.value.clone();
                let failing = Arc::clone(&flaky);
                async move {
                    if failing.load(Ordering::SeqCst) {
                        Err(ActorFailure::new("save failed"))
                    } else {
                        Ok(text)
                    }
                }
            });

        let scheduler = ManualScheduler::new();
        let machine = Interpreter::new(
            Arc::clone(&def),
            registry,
            EditorContext::default(),
            scheduler.clone(),
        )
        .expect("registry is complete");
        Harness {
            machine,
            scheduler,
            def,
            fail_saves,
        }
    }
}

#[test]
fn the_editor_debounces_connects_and_saves() {
    setup_tracing();
    use editor::EditorEvent;
    let editor::Harness {
        mut machine,
        scheduler,
        def,
        ..
    } = editor::machine();
    machine.start().unwrap();

    let debouncing = def.find(&["input", "debouncing"]).unwrap();
    let connected = def.find(&["connection", "connected"]).unwrap();
    let save_active = def.find(&["saving", "saving"]).unwrap();

    // Focus connects lazily through the invoked actor.
    machine.send(EditorEvent::Focus).unwrap();
    let settlement = scheduler.settle_next().unwrap();
    machine.deliver(settlement);
    assert!(machine.snapshot().is_active(connected));

    // Two keystrokes; the first timer is re-armed by the reentry.
    machine.send(EditorEvent::Change("hell".into())).unwrap();
    assert!(machine.snapshot().is_active(debouncing));
    machine.send(EditorEvent::Change("hello".into())).unwrap();
    assert_eq!(scheduler.timer_count(), 1, "re-entry re-arms a single timer");

    // Quiet period: the debounce elapses, the dirty flag trips the
    // eventless transition, and the save actor starts.
    let expiry = scheduler.fire(debouncing).unwrap();
    machine.deliver(expiry);
    assert!(machine.snapshot().is_active(save_active));

    let settlement = scheduler.settle_next().unwrap();
    machine.deliver(settlement);
    let snapshot = machine.snapshot();
    assert_eq!(snapshot.context.committed, "hello");
    assert!(!machine.snapshot().is_active(save_active));
}

#[test]
fn an_unchanged_value_settles_without_saving() {
    setup_tracing();
    use editor::EditorEvent;
    let editor::Harness {
        mut machine,
        scheduler,
        def,
        ..
    } = editor::machine();
    machine.start().unwrap();

    let debouncing = def.find(&["input", "debouncing"]).unwrap();
    let save_idle = def.find(&["saving", "idle"]).unwrap();

    // Type something, let it save, then retype the identical value.
    machine.send(EditorEvent::Change("same".into())).unwrap();
    let expiry = scheduler.fire(debouncing).unwrap();
    machine.deliver(expiry);
    let settlement = scheduler.settle_next().unwrap();
    machine.deliver(settlement);
    assert_eq!(machine.snapshot().context.committed, "same");

    machine.send(EditorEvent::Change("same".into())).unwrap();
    let expiry = scheduler.fire(debouncing).unwrap();
    machine.deliver(expiry);

    // The guarded delay candidate failed, so no save was invoked.
    let snapshot = machine.snapshot();
    assert!(snapshot.is_active(save_idle));
    assert_eq!(scheduler.task_count(), 0);
    assert!(!snapshot.context.should_save);
}

#[test]
fn a_failed_save_parks_in_error_until_retried() {
    setup_tracing();
    use editor::EditorEvent;
    use std::sync::atomic::Ordering;
    let editor::Harness {
        mut machine,
        scheduler,
        def,
        fail_saves,
    } = editor::machine();
    machine.start().unwrap();

    let debouncing = def.find(&["input", "debouncing"]).unwrap();
    let save_error = def.find(&["saving", "error"]).unwrap();
    let save_active = def.find(&["saving", "saving"]).unwrap();

    fail_saves.store(true, Ordering::SeqCst);
    machine.send(EditorEvent::Change("draft".into())).unwrap();
    let expiry = scheduler.fire(debouncing).unwrap();
    machine.deliver(expiry);
    let settlement = scheduler.settle_next().unwrap();
    machine.deliver(settlement);

    let snapshot = machine.snapshot();
    assert!(snapshot.is_active(save_error));
    assert_eq!(snapshot.error.as_deref(), Some("save failed"));
    assert_eq!(snapshot.context.committed, "");

    // Retry re-enters the saving state and re-invokes the actor.
    fail_saves.store(false, Ordering::SeqCst);
    machine.send(EditorEvent::Retry).unwrap();
    assert!(machine.snapshot().is_active(save_active));
    assert_eq!(scheduler.task_count(), 1);
    let settlement = scheduler.settle_next().unwrap();
    machine.deliver(settlement);

    let snapshot = machine.snapshot();
    assert_eq!(snapshot.context.committed, "draft");
    assert_eq!(snapshot.error, None);
}

mod counter {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CounterContext {
        pub count: i64,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum CounterEvent {
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

    pub struct Counter;

    impl MachineTypes for Counter {
        type Context = CounterContext;
        type Event = CounterEvent;
        type Output = ();
    }

    pub fn machine() -> Interpreter<Counter, ManualScheduler<Counter>> {
        let mut builder = MachineBuilder::new("counter");
        let root = builder.root();
        builder.on(root, "INC").action("increment");
        builder.on(root, "DEC").guard("isPositive").action("decrement");
        builder.on(root, "SET").action("set");
        let def = Arc::new(builder.build().expect("definition is valid"));

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

        let mut interpreter = Interpreter::new(
            def,
            registry,
            CounterContext::default(),
            ManualScheduler::new(),
        )
        .expect("registry is complete");
        interpreter.start().expect("fresh interpreter starts");
        interpreter
    }
}

#[test]
fn set_overwrites_whatever_the_count_was() {
    setup_tracing();
    use counter::CounterEvent;
    let mut counter = counter::machine();

    counter.send(CounterEvent::Dec).unwrap();
    assert_eq!(counter.context().count, 0, "DEC at zero is guarded off");

    counter.send(CounterEvent::Inc).unwrap();
    counter.send(CounterEvent::Inc).unwrap();
    counter.send(CounterEvent::Dec).unwrap();
    assert_eq!(counter.context().count, 1);

    counter.send(CounterEvent::Set(20)).unwrap();
    assert_eq!(counter.context().count, 20);
    counter.send(CounterEvent::Dec).unwrap();
    assert_eq!(counter.context().count, 19);
}
