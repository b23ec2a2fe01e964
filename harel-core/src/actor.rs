//! The actor host: lifecycle bookkeeping for invoked asynchronous work.
//!
//! Exactly one invocation may be live per invoking node. Every start
//! allocates a fresh generation; settlements carry the generation they were
//! started under and are discarded on mismatch, so exiting a node (or
//! re-entering it reentrantly) makes any late result a no-op. Cancellation
//! is cooperative: the underlying task is asked to abort, and whatever it
//! still produces fails the generation check.

use std::collections::HashMap;

use crate::machine::NodeId;
use crate::scheduler::TaskHandle;

#[derive(Debug, Clone, Copy)]
struct LiveActor {
    generation: u64,
    task: TaskHandle,
}

/// Registry of live invocations, keyed by invoking node.
#[derive(Debug, Default)]
pub(crate) struct ActorHost {
    live: HashMap<NodeId, LiveActor>,
    next_generation: u64,
}

impl ActorHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the generation for a new invocation on `node`.
    ///
    /// Fails if the node already owns a live invocation; the interpreter
    /// always stops the old one (node exit) within the same step before
    /// starting a new one.
    pub fn begin(&mut self, node: NodeId) -> Result<u64, ()> {
        if self.live.contains_key(&node) {
            return Err(());
        }
        self.next_generation += 1;
        Ok(self.next_generation)
    }

    /// Record the spawned task for a generation handed out by `begin`.
    pub fn commit(&mut self, node: NodeId, generation: u64, task: TaskHandle) {
        self.live.insert(node, LiveActor { generation, task });
    }

    /// Does a settlement for `(node, generation)` correspond to the live
    /// invocation?
    pub fn matches(&self, node: NodeId, generation: u64) -> bool {
        self.live
            .get(&node)
            .is_some_and(|a| a.generation == generation)
    }

    /// Remove the live record after its settlement was accepted.
    pub fn settled(&mut self, node: NodeId) {
        self.live.remove(&node);
    }

    /// Cancel the invocation on `node`, if any, returning the task to
    /// abort. Late settlements are invalidated by the removal itself.
    pub fn stop(&mut self, node: NodeId) -> Option<TaskHandle> {
        self.live.remove(&node).map(|a| a.task)
    }

    /// Cancel everything (interpreter stop), returning the tasks to abort.
    pub fn stop_all(&mut self) -> Vec<TaskHandle> {
        self.live.drain().map(|(_, a)| a.task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_invalidate_stale_settlements() {
        let mut host = ActorHost::new();
        let node = NodeId(3);

        let first = host.begin(node).unwrap();
        host.commit(node, first, TaskHandle(1));
        assert!(host.matches(node, first));

        // Node exited: actor stopped, late settlement must not match.
        assert_eq!(host.stop(node), Some(TaskHandle(1)));
        assert!(!host.matches(node, first));

        // Re-entered: fresh generation, old one still stale.
        let second = host.begin(node).unwrap();
        host.commit(node, second, TaskHandle(2));
        assert!(second > first);
        assert!(!host.matches(node, first));
        assert!(host.matches(node, second));
    }

    #[test]
    fn occupied_nodes_reject_a_second_start() {
        let mut host = ActorHost::new();
        let node = NodeId(7);
        let generation = host.begin(node).unwrap();
        host.commit(node, generation, TaskHandle(1));
        assert!(host.begin(node).is_err());

        host.settled(node);
        assert!(host.begin(node).is_ok());
    }
}
