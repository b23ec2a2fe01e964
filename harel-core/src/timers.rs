//! Delayed-transition bookkeeping, with the same generation discipline as
//! the actor host: a timer armed on entry is cancelled on exit and re-armed
//! (under a new generation) on reentrant re-entry, so a callback that was
//! already in flight when its node exited fires into a mismatch.

use std::collections::HashMap;

use crate::machine::NodeId;
use crate::scheduler::TimerHandle;

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    generation: u64,
    handle: TimerHandle,
}

/// Registry of armed delayed transitions, keyed by owning node.
#[derive(Debug, Default)]
pub(crate) struct TimerRegistry {
    armed: HashMap<NodeId, ArmedTimer>,
    next_generation: u64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the generation for a timer about to be scheduled.
    pub fn begin(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Record the scheduler handle for a generation handed out by `begin`.
    /// Re-arming replaces the previous record (re-entry after reenter).
    pub fn commit(&mut self, node: NodeId, generation: u64, handle: TimerHandle) {
        self.armed.insert(node, ArmedTimer { generation, handle });
    }

    pub fn matches(&self, node: NodeId, generation: u64) -> bool {
        self.armed
            .get(&node)
            .is_some_and(|t| t.generation == generation)
    }

    /// Remove the record after its expiry was accepted.
    pub fn fired(&mut self, node: NodeId) {
        self.armed.remove(&node);
    }

    /// Cancel the timer on `node`, if any, returning the handle to cancel
    /// with the scheduler.
    pub fn cancel(&mut self, node: NodeId) -> Option<TimerHandle> {
        self.armed.remove(&node).map(|t| t.handle)
    }

    pub fn cancel_all(&mut self) -> Vec<TimerHandle> {
        self.armed.drain().map(|(_, t)| t.handle).collect()
    }
}
