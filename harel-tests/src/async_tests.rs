//! Async scenarios on the hosted runtime, driven with tokio's paused clock
//! so timer interleavings are deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use harel_core::prelude::*;

use crate::common::setup_tracing;

#[derive(Debug, Clone, PartialEq, Default)]
struct EditorContext {
    value: String,
    committed: String,
    should_save: bool,
    saves: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum EditorEvent {
    Change(String),
    Cancel,
    Retry,
}

impl Event for EditorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EditorEvent::Change(_) => "text.change",
            EditorEvent::Cancel => "CANCEL",
            EditorEvent::Retry => "RETRY",
        }
    }
}

struct Editor;

impl MachineTypes for Editor {
    type Context = EditorContext;
    type Event = EditorEvent;
    type Output = String;
}

/// Debounced autosave: `input` debounces keystrokes, `saving` watches the
/// dirty flag through an eventless transition and invokes the save actor.
fn autosave_machine() -> Arc<MachineDef> {
    let mut builder = MachineBuilder::new_parallel("autosave");
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
        .after(debouncing, Duration::from_millis(200))
        .guard("hasChanges")
        .target(idle)
        .action("markDirty")
        .or()
        .target(idle);

    let saving = builder.state(root, "saving");
    let save_idle = builder.state(saving, "idle");
    let save_active = builder.state(saving, "saving");
    builder.initial(saving, save_idle);
    builder
        .always(save_idle)
        .guard("shouldSave")
        .target(save_active);
    builder.entry(save_active, "clearDirty");
    builder.invoke(save_active, "saveText");
    builder.on_done(save_active).target(save_idle).action("commit");
    builder.on_error(save_active).target(save_idle);

    Arc::new(builder.build().expect("definition is valid"))
}

fn autosave_registry() -> Registry<Editor> {
    Registry::new()
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
                args.context.saves.push(saved.clone());
            }
        })
        .actor("saveText", |ctx: &EditorContext| {
            let text = ctx.value.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(text)
            }
        })
}

#[tokio::test(start_paused = true)]
async fn a_burst_of_changes_collapses_into_one_save() {
    setup_tracing();
    let handle = spawn_machine(autosave_machine(), autosave_registry(), EditorContext::default())
        .expect("machine spawns");
    handle
        .wait_for(|s| s.status == Status::Running)
        .await
        .unwrap();

    // Three keystrokes with no quiet gap between them: each one re-enters
    // `debouncing` and invalidates the previous timer generation.
    handle.send(EditorEvent::Change("h".into())).unwrap();
    handle.send(EditorEvent::Change("he".into())).unwrap();
    handle.send(EditorEvent::Change("hey".into())).unwrap();

    let settled = handle
        .wait_for(|s| s.context.committed == "hey")
        .await
        .unwrap();
    assert_eq!(settled.context.saves, vec!["hey"], "only the settled value saved");
}

#[tokio::test(start_paused = true)]
async fn a_save_that_matches_the_committed_value_is_skipped() {
    setup_tracing();
    let handle = spawn_machine(autosave_machine(), autosave_registry(), EditorContext::default())
        .expect("machine spawns");

    handle.send(EditorEvent::Change("once".into())).unwrap();
    handle
        .wait_for(|s| s.context.committed == "once")
        .await
        .unwrap();

    // Typing the committed value again debounces but must not save.
    handle.send(EditorEvent::Change("once".into())).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.context.saves, vec!["once"]);
    assert!(!snapshot.context.should_save);
}

#[tokio::test(start_paused = true)]
async fn failed_invocations_route_on_error_and_can_be_retried() {
    setup_tracing();
    let mut builder = MachineBuilder::new("submit");
    let root = builder.root();
    let editing = builder.state(root, "editing");
    let submitting = builder.state(root, "submitting");
    let success = builder.state(root, "success");
    let failed = builder.state(root, "failed");
    builder.initial(root, editing);
    builder.on(editing, "text.change").target(submitting);
    builder.invoke(submitting, "submit");
    builder.on_done(submitting).target(success);
    builder.on_error(submitting).target(failed);
    builder.on(failed, "RETRY").target(submitting);
    let def = Arc::new(builder.build().unwrap());

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let registry: Registry<Editor> = Registry::new().actor("submit", move |_: &EditorContext| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                Err(ActorFailure::new("server unavailable"))
            } else {
                Ok("accepted".to_owned())
            }
        }
    });

    let handle = spawn_machine(def, registry, EditorContext::default()).unwrap();
    handle.send(EditorEvent::Change("payload".into())).unwrap();

    let errored = handle
        .wait_for(|s| s.value.leaf() == Some("failed"))
        .await
        .unwrap();
    assert_eq!(errored.error.as_deref(), Some("server unavailable"));

    handle.send(EditorEvent::Retry).unwrap();
    let done = handle
        .wait_for(|s| s.value.leaf() == Some("success"))
        .await
        .unwrap();
    // The failure is cleared by the successful settlement.
    assert_eq!(done.error, None);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn leaving_the_invoking_state_discards_the_result() {
    setup_tracing();
    let mut builder = MachineBuilder::new("fetcher");
    let root = builder.root();
    let loading = builder.state(root, "loading");
    let ready = builder.state(root, "ready");
    let aborted = builder.state(root, "aborted");
    builder.initial(root, loading);
    builder.invoke(loading, "fetch");
    builder.on_done(loading).target(ready).action("commit");
    builder.on(loading, "CANCEL").target(aborted);
    let def = Arc::new(builder.build().unwrap());

    let registry: Registry<Editor> = Registry::new()
        .action("commit", |args: &mut ActionArgs<'_, Editor>| {
            if let Some(output) = args.cause.output() {
                args.context.saves.push(output.clone());
            }
        })
        .actor("fetch", |_: &EditorContext| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok("payload".to_owned())
        });

    let handle = spawn_machine(def, registry, EditorContext::default()).unwrap();
    handle
        .wait_for(|s| s.status == Status::Running)
        .await
        .unwrap();
    handle.send(EditorEvent::Cancel).unwrap();
    handle
        .wait_for(|s| s.value.leaf() == Some("aborted"))
        .await
        .unwrap();

    // Let the original delay elapse; the fetch was cancelled with its state.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.value.leaf(), Some("aborted"));
    assert!(snapshot.context.saves.is_empty(), "stale result discarded");
}
