//! Immutable views of a running machine, published to subscribers after
//! every run-to-completion step.

use core::fmt;

use crate::machine::{MachineDef, NodeId, NodeKind};

/// Interpreter lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// Constructed but not started.
    Idle,
    Running,
    /// A final child of the root became active.
    Done,
    Stopped,
    /// A settling loop was detected; the machine is unstable.
    Faulted,
}

/// Nested description of the active configuration, mirroring how a
/// statechart's value is usually displayed: the root is elided for
/// compound machines, parallel regions list all their active children.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateValue {
    /// An active leaf, by name.
    Atomic(&'static str),
    /// A compound node and its single active child.
    Compound(&'static str, Box<StateValue>),
    /// A parallel node and all of its active regions.
    Parallel(&'static str, Vec<StateValue>),
}

impl StateValue {
    /// The leaf name if this value is a single atomic state.
    pub fn leaf(&self) -> Option<&'static str> {
        match self {
            StateValue::Atomic(name) => Some(name),
            _ => None,
        }
    }

    /// The region value with the given name, for parallel values.
    pub fn region(&self, name: &str) -> Option<&StateValue> {
        match self {
            StateValue::Parallel(_, regions) => regions.iter().find(|r| r.name() == name),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StateValue::Atomic(name)
            | StateValue::Compound(name, _)
            | StateValue::Parallel(name, _) => name,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Atomic(name) => f.write_str(name),
            StateValue::Compound(name, child) => write!(f, "{name}.{child}"),
            StateValue::Parallel(name, regions) => {
                write!(f, "{name}:{{")?;
                for (i, region) in regions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{region}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// An owned, consistent view of one machine instant: status, active-state
/// description, context and the most recent recoverable error.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Snapshot<C> {
    pub status: Status,
    pub value: StateValue,
    pub context: C,
    pub error: Option<String>,
    active: Vec<NodeId>,
}

impl<C> Snapshot<C> {
    pub(crate) fn new(
        status: Status,
        value: StateValue,
        context: C,
        error: Option<String>,
        active: Vec<NodeId>,
    ) -> Self {
        Self {
            status,
            value,
            context,
            error,
            active,
        }
    }

    /// Whether the given node was active when the snapshot was taken.
    /// This is the typed replacement for string state-pattern matching.
    pub fn is_active(&self, node: NodeId) -> bool {
        self.active.binary_search(&node).is_ok()
    }

    /// The active node ids, in document order.
    pub fn active(&self) -> &[NodeId] {
        &self.active
    }
}

/// Build the nested state description for an active configuration.
pub(crate) fn state_value(def: &MachineDef, active: &[NodeId]) -> StateValue {
    fn describe(def: &MachineDef, active: &[NodeId], node: NodeId) -> StateValue {
        match def.kind(node) {
            NodeKind::Atomic | NodeKind::Final => StateValue::Atomic(def.name(node)),
            NodeKind::Compound => {
                match def
                    .children(node)
                    .iter()
                    .find(|c| active.binary_search(c).is_ok())
                {
                    Some(&child) => {
                        let inner = describe(def, active, child);
                        StateValue::Compound(def.name(node), Box::new(inner))
                    }
                    None => StateValue::Atomic(def.name(node)),
                }
            }
            NodeKind::Parallel => {
                let regions = def
                    .children(node)
                    .iter()
                    .map(|&child| describe(def, active, child))
                    .collect();
                StateValue::Parallel(def.name(node), regions)
            }
        }
    }

    let root = def.root();
    match def.kind(root) {
        // The root wrapper is elided: a toggle machine's value is
        // `inactive`, not `toggle.inactive`.
        NodeKind::Compound => {
            match def
                .children(root)
                .iter()
                .find(|c| active.binary_search(c).is_ok())
            {
                Some(&child) => describe(def, active, child),
                None => StateValue::Atomic(def.name(root)),
            }
        }
        _ => describe(def, active, root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineBuilder;

    #[test]
    fn parallel_values_render_all_regions() {
        let mut b = MachineBuilder::new_parallel("player");
        let root = b.root();
        let playback = b.state(root, "playback");
        let stopped = b.state(playback, "stopped");
        b.initial(playback, stopped);
        b.state(playback, "playing");
        let volume = b.state(root, "volume");
        let normal = b.state(volume, "normal");
        b.initial(volume, normal);
        b.state(volume, "muted");
        let def = b.build().unwrap();

        let mut active = vec![root, playback, stopped, volume, normal];
        active.sort();
        let value = state_value(&def, &active);

        assert_eq!(value.region("playback").and_then(|r| r.leaf()), None);
        assert_eq!(
            value.region("playback"),
            Some(&StateValue::Compound(
                "playback",
                Box::new(StateValue::Atomic("stopped"))
            ))
        );
        assert_eq!(value.to_string(), "player:{playback.stopped, volume.normal}");
    }

    #[test]
    fn compound_root_is_elided() {
        let mut b = MachineBuilder::new("toggle");
        let root = b.root();
        let inactive = b.state(root, "inactive");
        b.state(root, "active");
        b.initial(root, inactive);
        let def = b.build().unwrap();

        let mut active = vec![root, inactive];
        active.sort();
        assert_eq!(state_value(&def, &active), StateValue::Atomic("inactive"));
    }

    #[test]
    fn snapshot_queries_active_nodes() {
        let snapshot: Snapshot<()> = Snapshot::new(
            Status::Running,
            StateValue::Atomic("a"),
            (),
            None,
            vec![NodeId(0), NodeId(1)],
        );
        assert!(snapshot.is_active(NodeId(1)));
        assert!(!snapshot.is_active(NodeId(2)));
    }
}
