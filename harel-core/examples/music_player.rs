//! Parallel regions: playback and volume are independent dimensions of the
//! same player, active at the same time.
//!
//! Run with: `cargo run --example music_player`

use std::sync::Arc;

use harel_core::prelude::*;

#[derive(Debug, Clone, PartialEq, Default)]
struct PlayerContext;

#[derive(Debug, Clone, PartialEq)]
struct PlayerEvent(&'static str);

impl Event for PlayerEvent {
    fn event_type(&self) -> &'static str {
        self.0
    }
}

struct Player;

impl MachineTypes for Player {
    type Context = PlayerContext;
    type Event = PlayerEvent;
    type Output = ();
}

fn build() -> Result<MachineDef, DefinitionError> {
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

    builder.build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let def = Arc::new(build()?);
    let mut machine: Interpreter<Player, _> = Interpreter::new(
        def,
        Registry::new(),
        PlayerContext,
        ManualScheduler::new(),
    )?;
    machine.start()?;
    println!("initial: {}", machine.snapshot().value);

    // Muting does not interrupt playback.
    machine.send(PlayerEvent("PLAY"))?;
    machine.send(PlayerEvent("MUTE"))?;
    println!("playing muted: {}", machine.snapshot().value);

    machine.send(PlayerEvent("PAUSE"))?;
    machine.send(PlayerEvent("UNMUTE"))?;
    println!("paused unmuted: {}", machine.snapshot().value);

    Ok(())
}
