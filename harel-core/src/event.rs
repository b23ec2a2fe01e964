//! Event and cause types flowing through the interpreter.

use core::fmt;

use crate::error::ActorFailure;
use crate::machine::{MachineTypes, NodeId};

/// An external event that can be sent to a machine.
///
/// Transitions are declared against an event *type* (a stable string such as
/// `"text.change"`); the full typed event value is handed to guards and
/// actions through [`Cause`], so payload fields stay statically typed.
pub trait Event: Clone + Send + fmt::Debug + 'static {
    /// The stable type tag this event matches transitions by.
    fn event_type(&self) -> &'static str;
}

/// What triggered the guard or action currently being evaluated.
///
/// Entry and exit actions run with the cause of the step that entered or
/// exited their node, mirroring how the resolver threads one triggering
/// occurrence through a whole microstep.
pub enum Cause<'a, T: MachineTypes> {
    /// An external (or self-raised) event.
    Event(&'a T::Event),
    /// An invoked actor settled successfully with this output.
    Done(&'a T::Output),
    /// An invoked actor settled with a failure.
    Failed(&'a ActorFailure),
    /// A delayed transition's timer expired.
    Timer,
    /// Machine-internal processing: initial entry, eventless transitions,
    /// region completion.
    Internal,
}

impl<'a, T: MachineTypes> Cause<'a, T> {
    /// The triggering event, when the cause is an external event.
    pub fn event(&self) -> Option<&'a T::Event> {
        match self {
            Cause::Event(event) => Some(event),
            _ => None,
        }
    }

    /// The actor output, when the cause is a successful settlement.
    pub fn output(&self) -> Option<&'a T::Output> {
        match self {
            Cause::Done(output) => Some(output),
            _ => None,
        }
    }

    /// The actor failure, when the cause is a failed settlement.
    pub fn failure(&self) -> Option<&'a ActorFailure> {
        match self {
            Cause::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl<T: MachineTypes> Clone for Cause<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: MachineTypes> Copy for Cause<'_, T> {}

impl<T: MachineTypes> fmt::Debug for Cause<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Cause::Done(output) => f.debug_tuple("Done").field(output).finish(),
            Cause::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
            Cause::Timer => f.write_str("Timer"),
            Cause::Internal => f.write_str("Internal"),
        }
    }
}

/// A marshaled asynchronous occurrence: a timer expiry or an actor
/// settlement, tagged with the generation that was live when it was armed.
///
/// Runtime events are never applied directly; they travel through the same
/// FIFO queue as external events and are discarded on generation mismatch,
/// which is how cancelled work stays cancelled even when its result arrives
/// late.
pub enum RuntimeEvent<T: MachineTypes> {
    TimerFired {
        node: NodeId,
        generation: u64,
    },
    ActorDone {
        node: NodeId,
        generation: u64,
        output: T::Output,
    },
    ActorFailed {
        node: NodeId,
        generation: u64,
        error: ActorFailure,
    },
}

impl<T: MachineTypes> RuntimeEvent<T> {
    /// The state node this occurrence belongs to.
    pub fn node(&self) -> NodeId {
        match self {
            RuntimeEvent::TimerFired { node, .. }
            | RuntimeEvent::ActorDone { node, .. }
            | RuntimeEvent::ActorFailed { node, .. } => *node,
        }
    }

    /// The generation the occurrence was tagged with when scheduled.
    pub fn generation(&self) -> u64 {
        match self {
            RuntimeEvent::TimerFired { generation, .. }
            | RuntimeEvent::ActorDone { generation, .. }
            | RuntimeEvent::ActorFailed { generation, .. } => *generation,
        }
    }
}

// Manual impl keeps `T` itself free of Debug bounds.
impl<T: MachineTypes> fmt::Debug for RuntimeEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeEvent::TimerFired { node, generation } => f
                .debug_struct("TimerFired")
                .field("node", node)
                .field("generation", generation)
                .finish(),
            RuntimeEvent::ActorDone {
                node,
                generation,
                output,
            } => f
                .debug_struct("ActorDone")
                .field("node", node)
                .field("generation", generation)
                .field("output", output)
                .finish(),
            RuntimeEvent::ActorFailed {
                node,
                generation,
                error,
            } => f
                .debug_struct("ActorFailed")
                .field("node", node)
                .field("generation", generation)
                .field("error", error)
                .finish(),
        }
    }
}
