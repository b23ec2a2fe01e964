//! Fluent construction and fail-fast validation of machine definitions.

use std::collections::BTreeSet;
use std::time::Duration;

use super::{AfterDef, Candidate, InvokeDef, MachineDef, NodeId, NodeKind, StateNode, TransitionDef};
use crate::error::DefinitionError;

/// Builds a [`MachineDef`] incrementally.
///
/// Nodes are declared parent-first; adding a child to an atomic node
/// promotes it to a compound node. Structural rules (initial children,
/// region counts, cross-region targets, final-state restrictions) are
/// checked in [`build`](MachineBuilder::build), which refuses to produce a
/// malformed definition.
pub struct MachineBuilder {
    id: &'static str,
    nodes: Vec<StateNode>,
    // Shape mistakes observed during mutation, reported at build() since
    // the mutating methods are infallible for chaining ergonomics.
    deferred: Vec<DefinitionError>,
}

impl MachineBuilder {
    /// A machine whose root is compound (or atomic, if it never gains
    /// children — the counter machine is a single root state with
    /// targetless transitions).
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            nodes: vec![StateNode::new(id, None, NodeKind::Compound)],
            deferred: Vec::new(),
        }
    }

    /// A machine whose root is a parallel node: every child region is
    /// active simultaneously.
    pub fn new_parallel(id: &'static str) -> Self {
        Self {
            id,
            nodes: vec![StateNode::new(id, None, NodeKind::Parallel)],
            deferred: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push_child(&mut self, parent: NodeId, name: &'static str, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(StateNode::new(name, Some(parent), kind));
        let parent_node = &mut self.nodes[parent.index()];
        parent_node.children.push(id);
        if parent_node.kind == NodeKind::Atomic {
            parent_node.kind = NodeKind::Compound;
        }
        id
    }

    /// Declare an atomic child state (promoted to compound if it later
    /// gains children of its own).
    pub fn state(&mut self, parent: NodeId, name: &'static str) -> NodeId {
        self.push_child(parent, name, NodeKind::Atomic)
    }

    /// Declare a parallel child state.
    pub fn parallel(&mut self, parent: NodeId, name: &'static str) -> NodeId {
        self.push_child(parent, name, NodeKind::Parallel)
    }

    /// Declare a final child state.
    pub fn final_state(&mut self, parent: NodeId, name: &'static str) -> NodeId {
        self.push_child(parent, name, NodeKind::Final)
    }

    /// Designate the initial child of a compound state.
    pub fn initial(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.index()].initial = Some(child);
    }

    /// Append an entry action (by registry name) to a node.
    pub fn entry(&mut self, node: NodeId, action: &'static str) {
        self.nodes[node.index()].entry.push(action);
    }

    /// Append an exit action (by registry name) to a node.
    pub fn exit_action(&mut self, node: NodeId, action: &'static str) {
        self.nodes[node.index()].exit.push(action);
    }

    /// Declare a transition on `node` for events of type `event_type`.
    ///
    /// Returns a [`TransitionBuilder`] for attaching guard/target/actions;
    /// call [`or`](TransitionBuilder::or) to chain fallback candidates.
    pub fn on(&mut self, node: NodeId, event_type: &'static str) -> TransitionBuilder<'_> {
        let n = &mut self.nodes[node.index()];
        let slot = match n.on.iter().position(|(ty, _)| *ty == event_type) {
            Some(i) => i,
            None => {
                n.on.push((event_type, TransitionDef::default()));
                n.on.len() - 1
            }
        };
        TransitionBuilder::open(&mut n.on[slot].1)
    }

    /// Declare an eventless ("always") transition on `node`, re-evaluated
    /// during settling after every applied event.
    pub fn always(&mut self, node: NodeId) -> TransitionBuilder<'_> {
        let n = &mut self.nodes[node.index()];
        TransitionBuilder::open(n.always.get_or_insert_with(TransitionDef::default))
    }

    /// Declare a delayed transition firing `delay` after `node` is entered.
    pub fn after(&mut self, node: NodeId, delay: Duration) -> TransitionBuilder<'_> {
        if self.nodes[node.index()].after.is_some() {
            self.deferred
                .push(DefinitionError::DuplicateAfter(self.path_of(node)));
        }
        let n = &mut self.nodes[node.index()];
        let after = n.after.get_or_insert_with(|| AfterDef {
            delay,
            transition: TransitionDef::default(),
        });
        TransitionBuilder::open(&mut after.transition)
    }

    /// Invoke the named actor while `node` is active. Route the settlement
    /// with [`on_done`](MachineBuilder::on_done) and
    /// [`on_error`](MachineBuilder::on_error).
    pub fn invoke(&mut self, node: NodeId, src: &'static str) {
        match &mut self.nodes[node.index()].invoke {
            Some(invoke) if invoke.src.is_empty() => invoke.src = src,
            Some(_) => {
                let path = self.path_of(node);
                self.deferred.push(DefinitionError::DuplicateInvoke(path));
            }
            slot @ None => {
                *slot = Some(InvokeDef {
                    src,
                    on_done: TransitionDef::default(),
                    on_error: TransitionDef::default(),
                });
            }
        }
    }

    /// Transition taken when `node`'s invoked actor settles successfully.
    /// Declaration order relative to [`invoke`](MachineBuilder::invoke) is
    /// free; an `on_done` without any `invoke` fails name resolution when
    /// the interpreter is constructed.
    pub fn on_done(&mut self, node: NodeId) -> TransitionBuilder<'_> {
        let n = &mut self.nodes[node.index()];
        let invoke = n.invoke.get_or_insert_with(|| InvokeDef {
            src: "",
            on_done: TransitionDef::default(),
            on_error: TransitionDef::default(),
        });
        TransitionBuilder::open(&mut invoke.on_done)
    }

    /// Transition taken when `node`'s invoked actor settles with a failure.
    pub fn on_error(&mut self, node: NodeId) -> TransitionBuilder<'_> {
        let n = &mut self.nodes[node.index()];
        let invoke = n.invoke.get_or_insert_with(|| InvokeDef {
            src: "",
            on_done: TransitionDef::default(),
            on_error: TransitionDef::default(),
        });
        TransitionBuilder::open(&mut invoke.on_error)
    }

    /// Transition taken when a final child of compound `node` becomes
    /// active (the region completed).
    pub fn on_region_done(&mut self, node: NodeId) -> TransitionBuilder<'_> {
        let n = &mut self.nodes[node.index()];
        TransitionBuilder::open(n.on_region_done.get_or_insert_with(TransitionDef::default))
    }

    fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(n) = cursor {
            let node = &self.nodes[n.index()];
            if node.parent.is_some() || names.is_empty() {
                names.push(node.name);
            }
            cursor = node.parent;
        }
        names.reverse();
        names.join(".")
    }

    /// Validate and freeze the definition.
    pub fn build(mut self) -> Result<MachineDef, DefinitionError> {
        if let Some(err) = self.deferred.first() {
            return Err(err.clone());
        }

        // A childless compound root is an atomic machine (counter-style).
        if self.nodes[0].kind == NodeKind::Compound && self.nodes[0].children.is_empty() {
            self.nodes[0].kind = NodeKind::Atomic;
        }

        for idx in 0..self.nodes.len() {
            let id = NodeId(idx as u32);
            self.validate_node(id)?;
        }
        for idx in 0..self.nodes.len() {
            let id = NodeId(idx as u32);
            self.validate_targets(id)?;
        }

        Ok(MachineDef::from_parts(self.id, self.nodes))
    }

    fn validate_node(&self, id: NodeId) -> Result<(), DefinitionError> {
        let node = &self.nodes[id.index()];
        let path = || self.path_of(id);

        let mut seen = BTreeSet::new();
        for &child in &node.children {
            if !seen.insert(self.nodes[child.index()].name) {
                return Err(DefinitionError::DuplicateState {
                    parent: path(),
                    name: self.nodes[child.index()].name.to_owned(),
                });
            }
        }

        match node.kind {
            NodeKind::Compound => {
                let initial = node
                    .initial
                    .ok_or_else(|| DefinitionError::MissingInitial(path()))?;
                if !node.children.contains(&initial) {
                    return Err(DefinitionError::InitialNotChild { parent: path() });
                }
            }
            NodeKind::Parallel => {
                if node.children.len() < 2 {
                    return Err(DefinitionError::ParallelNeedsRegions(path()));
                }
                if node.initial.is_some() {
                    return Err(DefinitionError::ParallelWithInitial(path()));
                }
            }
            NodeKind::Final => {
                let has_behavior = !node.children.is_empty()
                    || !node.on.is_empty()
                    || node.always.is_some()
                    || node.after.is_some()
                    || node.invoke.is_some();
                if has_behavior {
                    return Err(DefinitionError::FinalWithBehavior(path()));
                }
            }
            NodeKind::Atomic => {}
        }

        if node.on_region_done.is_some() && node.children.is_empty() {
            return Err(DefinitionError::DoneWithoutChildren(path()));
        }

        if let Some(invoke) = &node.invoke {
            if invoke.src.is_empty() {
                return Err(DefinitionError::InvokeWithoutSource(path()));
            }
        }

        Ok(())
    }

    fn validate_targets(&self, id: NodeId) -> Result<(), DefinitionError> {
        let node = &self.nodes[id.index()];
        let transitions = node
            .on
            .iter()
            .map(|(_, t)| t)
            .chain(node.always.as_ref())
            .chain(node.after.as_ref().map(|a| &a.transition))
            .chain(node.invoke.as_ref().map(|i| &i.on_done))
            .chain(node.invoke.as_ref().map(|i| &i.on_error))
            .chain(node.on_region_done.as_ref());
        for t in transitions {
            for candidate in &t.candidates {
                let Some(target) = candidate.target else {
                    continue;
                };
                let lca = self.lca(id, target);
                if self.nodes[lca.index()].kind == NodeKind::Parallel && lca != id && lca != target
                {
                    return Err(DefinitionError::CrossRegionTarget {
                        from: self.path_of(id),
                        target: self.path_of(target),
                    });
                }
            }
        }
        Ok(())
    }

    fn lca(&self, a: NodeId, b: NodeId) -> NodeId {
        let mut chain = BTreeSet::new();
        let mut cursor = Some(a);
        while let Some(n) = cursor {
            chain.insert(n);
            cursor = self.nodes[n.index()].parent;
        }
        let mut cursor = Some(b);
        while let Some(n) = cursor {
            if chain.contains(&n) {
                return n;
            }
            cursor = self.nodes[n.index()].parent;
        }
        NodeId(0)
    }
}

/// Chaining proxy for one transition's candidate list.
///
/// `guard`/`target`/`action`/`reenter` apply to the current (last)
/// candidate; `or()` opens the next fallback candidate.
pub struct TransitionBuilder<'a> {
    transition: &'a mut TransitionDef,
}

impl<'a> TransitionBuilder<'a> {
    fn open(transition: &'a mut TransitionDef) -> Self {
        transition.candidates.push(Candidate::default());
        Self { transition }
    }

    fn current(&mut self) -> &mut Candidate {
        self.transition
            .candidates
            .last_mut()
            .expect("transition has at least one candidate")
    }

    /// Require the named guard to pass for this candidate.
    pub fn guard(mut self, name: &'static str) -> Self {
        self.current().guard = Some(name);
        self
    }

    /// Set the target state. Omitting the target makes the candidate an
    /// actions-only (internal) transition.
    pub fn target(mut self, node: NodeId) -> Self {
        self.current().target = Some(node);
        self
    }

    /// Append a named action to run between exit and entry actions.
    pub fn action(mut self, name: &'static str) -> Self {
        self.current().actions.push(name);
        self
    }

    /// Force exit and re-entry of the source even when the target equals
    /// it, re-arming its timers and invocations.
    pub fn reenter(mut self) -> Self {
        self.current().reenter = true;
        self
    }

    /// Open the next fallback candidate, evaluated only when every earlier
    /// candidate's guard failed.
    pub fn or(self) -> Self {
        self.transition.candidates.push(Candidate::default());
        self
    }
}
