//! The full toolbox in one machine: three parallel regions coordinating a
//! debounced autosave editor.
//!
//! - `input` debounces keystrokes with a reentrant self-transition and a
//!   delayed transition; the save flag is only raised when the settled
//!   value actually differs from the committed one.
//! - `connection` lazily connects on focus through an invoked actor.
//! - `saving` watches the flag with an eventless transition and runs the
//!   save actor, with retry on failure.
//!
//! Run with: `cargo run --example text_editor`

use std::sync::Arc;
use std::time::Duration;

use harel_core::prelude::*;

#[derive(Debug, Clone, PartialEq, Default)]
struct EditorContext {
    value: String,
    committed: String,
    should_save: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum EditorEvent {
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

struct Editor;

impl MachineTypes for Editor {
    type Context = EditorContext;
    type Event = EditorEvent;
    type Output = String;
}

const DEBOUNCE: Duration = Duration::from_millis(500);

fn build() -> Result<MachineDef, DefinitionError> {
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
        .after(debouncing, DEBOUNCE)
        .guard("hasChanges")
        .target(idle)
        .action("markDirty")
        .or()
        .target(idle);

    let connection = builder.state(root, "connection");
    let disconnected = builder.state(connection, "disconnected");
    let connecting = builder.state(connection, "connecting");
    let connected = builder.state(connection, "connected");
    let conn_error = builder.state(connection, "error");
    builder.initial(connection, disconnected);
    builder.on(disconnected, "text.focus").target(connecting);
    builder.invoke(connecting, "connect");
    builder.on_done(connecting).target(connected);
    builder.on_error(connecting).target(conn_error);
    builder.on(conn_error, "text.focus").target(connecting);

    let saving = builder.state(root, "saving");
    let save_idle = builder.state(saving, "idle");
    let save_active = builder.state(saving, "saving");
    let save_error = builder.state(saving, "error");
    builder.initial(saving, save_idle);
    builder
        .always(save_idle)
        .guard("shouldSaveChanges")
        .target(save_active);
    builder.entry(save_active, "clearDirty");
    builder.invoke(save_active, "saveText");
    builder.on_done(save_active).target(save_idle).action("commitSaved");
    builder.on_error(save_active).target(save_error);
    builder.on(save_error, "text.retry").target(save_active);

    builder.build()
}

fn registry() -> Registry<Editor> {
    Registry::new()
        .guard("hasChanges", |ctx: &EditorContext, _: Cause<'_, Editor>| {
            ctx.value != ctx.committed
        })
        .guard(
            "shouldSaveChanges",
            |ctx: &EditorContext, _: Cause<'_, Editor>| {
                ctx.should_save && ctx.value != ctx.committed
            },
        )
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
        .action("commitSaved", |args: &mut ActionArgs<'_, Editor>| {
            if let Some(saved) = args.cause.output() {
                args.context.committed = saved.clone();
            }
        })
        .actor("connect", |_: &EditorContext| async {
            // A real editor would open a websocket here.
            Ok(String::new())
        })
        .actor("saveText", |ctx: &EditorContext| {
            let text = ctx.value.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(text)
            }
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let def = Arc::new(build()?);
    let connected = def
        .find(&["connection", "connected"])
        .expect("state exists");
    let handle = spawn_machine(def, registry(), EditorContext::default())?;

    handle.send(EditorEvent::Focus)?;
    handle.wait_for(|s| s.is_active(connected)).await?;
    println!("connected");

    // A burst of keystrokes; only the settled value is saved.
    for text in ["h", "he", "hel", "hell", "hello"] {
        handle.send(EditorEvent::Change(text.to_owned()))?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let saved = handle
        .wait_for(|s| s.context.committed == "hello")
        .await?;
    println!("committed: {:?}", saved.context.committed);

    handle.stop();
    Ok(())
}
