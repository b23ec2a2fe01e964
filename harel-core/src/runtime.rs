//! Tokio hosting for an interpreter: one task owns the machine, a
//! cloneable [`Handle`] talks to it.
//!
//! External events, timer expiries and actor settlements all funnel through
//! a single mpsc mailbox, so the interpreter keeps its run-to-completion
//! guarantee without any locking. Snapshots are published through a watch
//! channel after every step; subscribers always see the latest consistent
//! view and can await specific states with [`Handle::wait_for`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::error::{DefinitionError, InterpreterError};
use crate::event::RuntimeEvent;
use crate::interpreter::Interpreter;
use crate::machine::{MachineDef, MachineTypes};
use crate::registry::Registry;
use crate::scheduler::TokioScheduler;
use crate::snapshot::{Snapshot, Status};

enum Command<T: MachineTypes> {
    Event(T::Event),
    Runtime(RuntimeEvent<T>),
    Stop,
}

/// Cloneable handle to a hosted machine.
///
/// Dropping every handle closes the mailbox, which stops the machine.
pub struct Handle<T: MachineTypes> {
    commands: mpsc::UnboundedSender<Command<T>>,
    snapshots: watch::Receiver<Snapshot<T::Context>>,
}

impl<T: MachineTypes> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<T: MachineTypes> Handle<T> {
    /// Queue an external event. Fails once the machine has terminated.
    pub fn send(&self, event: T::Event) -> Result<(), InterpreterError> {
        self.commands
            .send(Command::Event(event))
            .map_err(|_| InterpreterError::NotRunning)
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Snapshot<T::Context> {
        self.snapshots.borrow().clone()
    }

    /// A watch receiver over published snapshots, for callers that want to
    /// react to every step.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T::Context>> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`, checking the
    /// current one first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&Snapshot<T::Context>) -> bool,
    ) -> Result<Snapshot<T::Context>, InterpreterError> {
        let mut snapshots = self.snapshots.clone();
        match snapshots.wait_for(|snapshot| predicate(snapshot)).await {
            Ok(snapshot) => Ok(snapshot.clone()),
            Err(_) => Err(InterpreterError::NotRunning),
        }
    }

    /// Wait until the machine terminates (done, stopped or faulted).
    pub async fn wait_terminal(&self) -> Result<Snapshot<T::Context>, InterpreterError> {
        self.wait_for(|snapshot| snapshot.status != Status::Running && snapshot.status != Status::Idle)
            .await
    }

    /// Ask the machine to stop. Idempotent; delivery is best effort once
    /// the machine already terminated.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }
}

/// Start a machine on the current tokio runtime.
///
/// The interpreter is constructed (and its registry validated) before the
/// task is spawned, so definition problems surface here rather than inside
/// the task.
pub fn spawn_machine<T: MachineTypes>(
    def: Arc<MachineDef>,
    registry: Registry<T>,
    context: T::Context,
) -> Result<Handle<T>, DefinitionError> {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command<T>>();

    // Timer expiries and actor settlements re-enter through the same
    // mailbox as external events. The sink holds a weak sender so the
    // machine's own scheduler does not keep its mailbox alive after every
    // handle is dropped.
    let sink_tx = command_tx.downgrade();
    let scheduler = TokioScheduler::new(move |occurrence| {
        if let Some(tx) = sink_tx.upgrade() {
            let _ = tx.send(Command::Runtime(occurrence));
        }
    });

    let mut interpreter = Interpreter::new(def, registry, context, scheduler)?;
    let (snapshot_tx, snapshot_rx) = watch::channel(interpreter.snapshot());
    interpreter.subscribe(move |snapshot| {
        let _ = snapshot_tx.send(snapshot.clone());
    });

    tokio::spawn(async move {
        let machine = interpreter.machine().id();
        if interpreter.start().is_err() {
            // Freshly constructed; start can only fail if called twice.
            return;
        }
        while interpreter.status() == Status::Running {
            let Some(command) = command_rx.recv().await else {
                // Every handle dropped.
                break;
            };
            match command {
                Command::Event(event) => {
                    if let Err(error) = interpreter.send(event) {
                        tracing::debug!(machine, %error, "dropping event");
                    }
                }
                Command::Runtime(occurrence) => interpreter.deliver(occurrence),
                Command::Stop => break,
            }
        }
        interpreter.stop();
        tracing::debug!(machine, status = ?interpreter.status(), "machine task finished");
    });

    Ok(Handle {
        commands: command_tx,
        snapshots: snapshot_rx,
    })
}
