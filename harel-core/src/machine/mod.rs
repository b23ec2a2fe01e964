//! Immutable machine definitions: the pure-data description of a statechart.
//!
//! A [`MachineDef`] is an arena of [`StateNode`] records addressed by
//! [`NodeId`]. Ids are handed out in declaration order by the
//! [`MachineBuilder`], so a parent's id always sorts before its children's —
//! document order falls out of the id ordering for free. Definitions carry
//! no behavior: guards, actions and actors are referenced by name and
//! resolved against a [`Registry`] when an interpreter is constructed.
//!
//! [`Registry`]: crate::registry::Registry

mod builder;

pub use builder::{MachineBuilder, TransitionBuilder};

use core::fmt;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::event::Event;

/// Bundle of the user types one machine is parameterized over, following
/// the associated-type convention of a statechart trait rather than three
/// loose type parameters on every signature.
pub trait MachineTypes: Send + 'static {
    /// Extended state. Cloned into snapshots and actor inputs.
    type Context: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;
    /// External event type.
    type Event: Event;
    /// The success value produced by invoked actors.
    type Output: Clone + fmt::Debug + Send + Sync + 'static;
}

/// Identifier of a state node within one [`MachineDef`].
///
/// Ids are only meaningful for the definition that produced them; they are
/// the compile-checked replacement for string state patterns — hold on to
/// the ids the builder returns and query snapshots with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The shape of a state node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// Leaf state, no children.
    Atomic,
    /// Exactly one child active at a time.
    Compound,
    /// All children (regions) active simultaneously.
    Parallel,
    /// Terminal marker within its parent region.
    Final,
}

/// One guard+target candidate of a transition, evaluated in declaration
/// order; the first whose guard passes (guard-less candidates always pass)
/// is taken.
#[derive(Debug, Clone, Default)]
pub(crate) struct Candidate {
    pub guard: Option<&'static str>,
    pub target: Option<NodeId>,
    pub actions: Vec<&'static str>,
    pub reenter: bool,
}

/// An ordered candidate list bound to one trigger on one node.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransitionDef {
    pub candidates: Vec<Candidate>,
}

/// A delayed transition: fires `transition` after `delay`, measured from
/// the moment the owning node was entered.
#[derive(Debug, Clone)]
pub(crate) struct AfterDef {
    pub delay: Duration,
    pub transition: TransitionDef,
}

/// An invoked asynchronous actor bound to the lifetime of its node.
#[derive(Debug, Clone)]
pub(crate) struct InvokeDef {
    pub src: &'static str,
    pub on_done: TransitionDef,
    pub on_error: TransitionDef,
}

/// One state node record.
#[derive(Debug, Clone)]
pub(crate) struct StateNode {
    pub name: &'static str,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub initial: Option<NodeId>,
    pub entry: Vec<&'static str>,
    pub exit: Vec<&'static str>,
    pub on: Vec<(&'static str, TransitionDef)>,
    pub always: Option<TransitionDef>,
    pub after: Option<AfterDef>,
    pub invoke: Option<InvokeDef>,
    pub on_region_done: Option<TransitionDef>,
}

impl StateNode {
    pub(crate) fn new(name: &'static str, parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            name,
            parent,
            kind,
            children: Vec::new(),
            initial: None,
            entry: Vec::new(),
            exit: Vec::new(),
            on: Vec::new(),
            always: None,
            after: None,
            invoke: None,
            on_region_done: None,
        }
    }

    pub(crate) fn transition_for(&self, event_type: &str) -> Option<&TransitionDef> {
        self.on
            .iter()
            .find(|(ty, _)| *ty == event_type)
            .map(|(_, t)| t)
    }

    fn transitions(&self) -> impl Iterator<Item = &TransitionDef> {
        self.on
            .iter()
            .map(|(_, t)| t)
            .chain(self.always.as_ref())
            .chain(self.after.as_ref().map(|a| &a.transition))
            .chain(self.invoke.as_ref().map(|i| &i.on_done))
            .chain(self.invoke.as_ref().map(|i| &i.on_error))
            .chain(self.on_region_done.as_ref())
    }
}

/// An immutable statechart definition.
///
/// Constructed once via [`MachineBuilder`], validated fail-fast, and shared
/// (typically behind an `Arc`) by every interpreter instance that runs it.
#[derive(Debug, Clone)]
pub struct MachineDef {
    id: &'static str,
    nodes: Vec<StateNode>,
}

impl MachineDef {
    pub(crate) fn from_parts(id: &'static str, nodes: Vec<StateNode>) -> Self {
        Self { id, nodes }
    }

    /// The machine id (also the root node's name).
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes in the definition.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn name(&self, id: NodeId) -> &'static str {
        self.node(id).name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn initial(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).initial
    }

    /// Dotted path from the root to `id`, e.g. `"editor.saving.idle"`.
    /// The root's own name is omitted for non-root nodes.
    pub fn path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(n) = cursor {
            if n != self.root() || names.is_empty() {
                names.push(self.node(n).name);
            }
            cursor = self.node(n).parent;
        }
        names.reverse();
        names.join(".")
    }

    /// Look up a node by name path relative to the root.
    pub fn find(&self, path: &[&str]) -> Option<NodeId> {
        let mut cursor = self.root();
        for segment in path {
            cursor = *self
                .node(cursor)
                .children
                .iter()
                .find(|&&c| self.node(c).name == *segment)?;
        }
        Some(cursor)
    }

    /// Proper ancestors of `id`, innermost first.
    pub(crate) fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut cursor = self.node(id).parent;
        core::iter::from_fn(move || {
            let next = cursor?;
            cursor = self.node(next).parent;
            Some(next)
        })
    }

    pub(crate) fn self_and_ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        core::iter::once(id).chain(self.ancestors(id))
    }

    /// Is `a` a proper ancestor of `b`?
    pub(crate) fn is_ancestor(&self, a: NodeId, b: NodeId) -> bool {
        self.ancestors(b).any(|n| n == a)
    }

    /// Lowest common ancestor of `a` and `b`, counting a node as its own
    /// ancestor.
    pub(crate) fn lca(&self, a: NodeId, b: NodeId) -> NodeId {
        let path: BTreeSet<NodeId> = self.self_and_ancestors(a).collect();
        self.self_and_ancestors(b)
            .find(|n| path.contains(n))
            .unwrap_or_else(|| self.root())
    }

    /// Completeness invariant over an active configuration (sorted by id):
    /// the root is active, every active node's parent is active, an active
    /// compound node has exactly one active child, and an active parallel
    /// node has all children active.
    pub fn is_complete_configuration(&self, active: &[NodeId]) -> bool {
        if active.binary_search(&self.root()).is_err() {
            return false;
        }
        for &id in active {
            let node = self.node(id);
            if let Some(parent) = node.parent {
                if active.binary_search(&parent).is_err() {
                    return false;
                }
            }
            let active_children = node
                .children
                .iter()
                .filter(|c| active.binary_search(c).is_ok())
                .count();
            let ok = match node.kind {
                NodeKind::Atomic | NodeKind::Final => active_children == 0,
                NodeKind::Compound => active_children == 1,
                NodeKind::Parallel => active_children == node.children.len(),
            };
            if !ok {
                return false;
            }
        }
        true
    }

    /// All guard names referenced anywhere in the definition.
    pub(crate) fn guard_names(&self) -> BTreeSet<&'static str> {
        let mut names = BTreeSet::new();
        for node in &self.nodes {
            for t in node.transitions() {
                names.extend(t.candidates.iter().filter_map(|c| c.guard));
            }
        }
        names
    }

    /// All action names referenced anywhere in the definition.
    pub(crate) fn action_names(&self) -> BTreeSet<&'static str> {
        let mut names = BTreeSet::new();
        for node in &self.nodes {
            names.extend(node.entry.iter().copied());
            names.extend(node.exit.iter().copied());
            for t in node.transitions() {
                for c in &t.candidates {
                    names.extend(c.actions.iter().copied());
                }
            }
        }
        names
    }

    /// All actor source names referenced by invocations.
    pub(crate) fn actor_names(&self) -> BTreeSet<&'static str> {
        self.nodes
            .iter()
            .filter_map(|n| n.invoke.as_ref().map(|i| i.src))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn music_player() -> MachineDef {
        let mut b = MachineBuilder::new_parallel("musicPlayer");
        let root = b.root();
        let playback = b.state(root, "playback");
        let playing = b.state(playback, "playing");
        let stopped = b.state(playback, "stopped");
        b.initial(playback, stopped);
        let volume = b.state(root, "volume");
        let normal = b.state(volume, "normal");
        let muted = b.state(volume, "muted");
        b.initial(volume, normal);
        b.on(playing, "STOP").target(stopped);
        b.on(stopped, "PLAY").target(playing);
        b.on(normal, "MUTE").target(muted);
        b.on(muted, "UNMUTE").target(normal);
        b.build().expect("valid definition")
    }

    #[test]
    fn ids_follow_document_order() {
        let def = music_player();
        let playback = def.find(&["playback"]).unwrap();
        let stopped = def.find(&["playback", "stopped"]).unwrap();
        assert!(def.root() < playback);
        assert!(playback < stopped);
        assert_eq!(def.parent(stopped), Some(playback));
    }

    #[test]
    fn path_renders_dotted_names() {
        let def = music_player();
        let muted = def.find(&["volume", "muted"]).unwrap();
        assert_eq!(def.path(muted), "volume.muted");
        assert_eq!(def.path(def.root()), "musicPlayer");
    }

    #[test]
    fn lca_of_sibling_regions_is_the_parallel_root() {
        let def = music_player();
        let playing = def.find(&["playback", "playing"]).unwrap();
        let muted = def.find(&["volume", "muted"]).unwrap();
        assert_eq!(def.lca(playing, muted), def.root());
        assert_eq!(def.kind(def.lca(playing, muted)), NodeKind::Parallel);
    }

    #[test]
    fn lca_counts_a_node_as_its_own_ancestor() {
        let def = music_player();
        let playback = def.find(&["playback"]).unwrap();
        let playing = def.find(&["playback", "playing"]).unwrap();
        assert_eq!(def.lca(playback, playing), playback);
        assert!(def.is_ancestor(playback, playing));
        assert!(!def.is_ancestor(playing, playback));
    }

    #[test]
    fn name_sets_cover_all_references() {
        let mut b = MachineBuilder::new("m");
        let root = b.root();
        let a = b.state(root, "a");
        let c = b.state(root, "c");
        b.initial(root, a);
        b.entry(a, "onEnterA");
        b.exit_action(a, "onExitA");
        b.on(a, "GO").guard("ready").target(c).action("doGo");
        b.invoke(c, "fetch");
        b.on_done(c).target(a);
        b.on_error(c).target(a).action("recordError");
        let def = b.build().unwrap();

        assert!(def.guard_names().contains("ready"));
        for name in ["onEnterA", "onExitA", "doGo", "recordError"] {
            assert!(def.action_names().contains(name), "missing {name}");
        }
        assert!(def.actor_names().contains("fetch"));
    }
}
