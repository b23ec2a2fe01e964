//! Integration tests for parallel machines: independent regions, entry of
//! every region at once, and region completion through final states.

use std::sync::Arc;

use harel_core::prelude::*;

#[derive(Debug, Default, Clone, PartialEq)]
struct PlayerContext {
    announcements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct PlayerEvent(&'static str);

impl Event for PlayerEvent {
    fn event_type(&self) -> &'static str {
        self.0
    }
}

struct Types;

impl MachineTypes for Types {
    type Context = PlayerContext;
    type Event = PlayerEvent;
    type Output = ();
}

/// The music-player shape: playback and volume run side by side.
fn player() -> Interpreter<Types, ManualScheduler<Types>> {
    let mut builder = MachineBuilder::new_parallel("musicPlayer");
    let root = builder.root();

    let playback = builder.state(root, "playback");
    let playing = builder.state(playback, "playing");
    let paused = builder.state(playback, "paused");
    let stopped = builder.state(playback, "stopped");
    builder.initial(playback, stopped);
    builder.on(playing, "PAUSE").target(paused);
    builder.on(playing, "STOP").target(stopped);
    builder.on(paused, "PLAY").target(playing);
    builder.on(paused, "STOP").target(stopped);
    builder.on(stopped, "PLAY").target(playing);

    let volume = builder.state(root, "volume");
    let muted = builder.state(volume, "muted");
    let normal = builder.state(volume, "normal");
    builder.initial(volume, normal);
    builder.on(muted, "UNMUTE").target(normal);
    builder.on(normal, "MUTE").target(muted);

    let def = builder.build().expect("definition is valid");
    let mut interpreter = Interpreter::new(
        Arc::new(def),
        Registry::new(),
        PlayerContext::default(),
        ManualScheduler::new(),
    )
    .expect("registry is complete");
    interpreter.start().expect("fresh interpreter starts");
    interpreter
}

fn leaf_of(snapshot: &Snapshot<PlayerContext>, region: &str) -> Option<String> {
    snapshot.value.region(region).map(ToString::to_string)
}

#[test]
fn starting_enters_every_region() {
    let interpreter = player();
    let snapshot = interpreter.snapshot();
    assert_eq!(leaf_of(&snapshot, "playback").unwrap(), "playback.stopped");
    assert_eq!(leaf_of(&snapshot, "volume").unwrap(), "volume.normal");
}

#[test]
fn regions_transition_independently() {
    let mut interpreter = player();
    interpreter.send(PlayerEvent("PLAY")).unwrap();
    interpreter.send(PlayerEvent("MUTE")).unwrap();

    let snapshot = interpreter.snapshot();
    assert_eq!(leaf_of(&snapshot, "playback").unwrap(), "playback.playing");
    assert_eq!(leaf_of(&snapshot, "volume").unwrap(), "volume.muted");

    // Unmuting does not disturb playback.
    interpreter.send(PlayerEvent("UNMUTE")).unwrap();
    let snapshot = interpreter.snapshot();
    assert_eq!(leaf_of(&snapshot, "playback").unwrap(), "playback.playing");
    assert_eq!(leaf_of(&snapshot, "volume").unwrap(), "volume.normal");
}

#[test]
fn events_are_ignored_by_regions_that_cannot_handle_them() {
    let mut interpreter = player();
    // PAUSE only means something while playing.
    interpreter.send(PlayerEvent("PAUSE")).unwrap();
    let snapshot = interpreter.snapshot();
    assert_eq!(leaf_of(&snapshot, "playback").unwrap(), "playback.stopped");
    assert_eq!(leaf_of(&snapshot, "volume").unwrap(), "volume.normal");
}

#[test]
fn a_region_reaching_its_final_state_fires_the_done_transition() {
    let mut builder = MachineBuilder::new("download");
    let root = builder.root();
    let working = builder.state(root, "working");
    let fetching = builder.state(working, "fetching");
    let finished = builder.final_state(working, "finished");
    let done = builder.state(root, "done");
    builder.initial(root, working);
    builder.initial(working, fetching);
    builder.on(fetching, "COMPLETE").target(finished);
    builder.on_region_done(working).target(done).action("announce");
    let def = builder.build().expect("definition is valid");

    let registry: Registry<Types> =
        Registry::new().action("announce", |args: &mut ActionArgs<'_, Types>| {
            args.context
                .announcements
                .push("download finished".to_owned());
        });
    let mut interpreter = Interpreter::new(
        Arc::new(def),
        registry,
        PlayerContext::default(),
        ManualScheduler::new(),
    )
    .unwrap();
    interpreter.start().unwrap();
    interpreter.send(PlayerEvent("COMPLETE")).unwrap();

    let snapshot = interpreter.snapshot();
    assert_eq!(snapshot.value.leaf(), Some("done"));
    assert_eq!(
        interpreter.context().announcements,
        vec!["download finished"]
    );
    assert_eq!(snapshot.status, Status::Running, "root is not final yet");
}

#[test]
fn a_final_child_of_the_root_completes_the_machine() {
    let mut builder = MachineBuilder::new("oneshot");
    let root = builder.root();
    let working = builder.state(root, "working");
    let done = builder.final_state(root, "done");
    builder.initial(root, working);
    builder.on(working, "COMPLETE").target(done);
    let def = builder.build().expect("definition is valid");

    let mut interpreter: Interpreter<Types, _> = Interpreter::new(
        Arc::new(def),
        Registry::new(),
        PlayerContext::default(),
        ManualScheduler::new(),
    )
    .unwrap();
    interpreter.start().unwrap();
    interpreter.send(PlayerEvent("COMPLETE")).unwrap();
    assert_eq!(interpreter.status(), Status::Done);
}
