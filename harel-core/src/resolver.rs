//! Transition resolution: given the active configuration and a trigger,
//! compute which transition fires, what exits, what enters, and in what
//! order actions run.
//!
//! Selection is innermost-first: each active leaf walks its ancestor chain
//! until a node declares a matching transition, so nested states override
//! parent handling. Parallel regions resolve independently; a selection in
//! one region never exits a sibling region. Guard candidates are evaluated
//! in declaration order and the first satisfied one wins.

use crate::machine::{Candidate, MachineDef, NodeId, NodeKind, TransitionDef};

/// A transition chosen for application: the node it is declared on plus the
/// winning candidate (cloned out of the definition so the caller can mutate
/// the interpreter while holding it).
#[derive(Debug, Clone)]
pub(crate) struct Selected {
    pub source: NodeId,
    pub candidate: Candidate,
}

/// The computed effect of one transition: nodes to exit (deepest first),
/// nodes to enter (shallowest first), and the transition's own actions.
#[derive(Debug, Clone, Default)]
pub(crate) struct Microstep {
    pub exit: Vec<NodeId>,
    pub entry: Vec<NodeId>,
    pub actions: Vec<&'static str>,
}

/// Pick the first candidate whose guard passes. `eval` already folds guard
/// panics into `false`.
pub(crate) fn pick_candidate<'d>(
    transition: &'d TransitionDef,
    eval: &mut dyn FnMut(&'static str) -> bool,
) -> Option<&'d Candidate> {
    transition
        .candidates
        .iter()
        .find(|c| c.guard.is_none_or(|g| eval(g)))
}

/// Active nodes with no active child, in document order.
pub(crate) fn active_leaves(def: &MachineDef, config: &[NodeId]) -> Vec<NodeId> {
    config
        .iter()
        .copied()
        .filter(|&n| {
            !def.children(n)
                .iter()
                .any(|c| config.binary_search(c).is_ok())
        })
        .collect()
}

/// Select the transitions an external event fires: one per independent
/// region at most, innermost declaration wins, duplicate ancestors
/// deduplicated (two regions bubbling to the same ancestor transition take
/// it once).
pub(crate) fn select_for_event(
    def: &MachineDef,
    config: &[NodeId],
    event_type: &str,
    eval: &mut dyn FnMut(&'static str) -> bool,
) -> Vec<Selected> {
    let mut selected: Vec<Selected> = Vec::new();
    for leaf in active_leaves(def, config) {
        let mut found = None;
        for node in def.self_and_ancestors(leaf) {
            if selected.iter().any(|s| s.source == node) {
                // Another region already claimed this ancestor's transition.
                found = None;
                break;
            }
            if let Some(transition) = def.node(node).transition_for(event_type) {
                if let Some(candidate) = pick_candidate(transition, eval) {
                    found = Some(Selected {
                        source: node,
                        candidate: candidate.clone(),
                    });
                    break;
                }
                // No candidate matched here; outer states may still handle it.
            }
        }
        if let Some(sel) = found {
            selected.push(sel);
        }
    }
    selected
}

/// First eventless transition that fires, scanning active nodes in
/// document order. Settling applies one at a time and rescans.
pub(crate) fn select_always(
    def: &MachineDef,
    config: &[NodeId],
    eval: &mut dyn FnMut(&'static str) -> bool,
) -> Option<Selected> {
    for &node in config {
        if let Some(transition) = &def.node(node).always {
            if let Some(candidate) = pick_candidate(transition, eval) {
                return Some(Selected {
                    source: node,
                    candidate: candidate.clone(),
                });
            }
        }
    }
    None
}

/// First region-completion transition that fires: an active compound node
/// with a done-transition whose active child is a final state.
pub(crate) fn select_region_done(
    def: &MachineDef,
    config: &[NodeId],
    eval: &mut dyn FnMut(&'static str) -> bool,
) -> Option<Selected> {
    for &node in config {
        let record = def.node(node);
        let Some(transition) = &record.on_region_done else {
            continue;
        };
        let completed = record.children.iter().any(|&c| {
            def.kind(c) == NodeKind::Final && config.binary_search(&c).is_ok()
        });
        if !completed {
            continue;
        }
        if let Some(candidate) = pick_candidate(transition, eval) {
            return Some(Selected {
                source: node,
                candidate: candidate.clone(),
            });
        }
    }
    None
}

/// Compute the microstep for one selected transition against the current
/// configuration.
///
/// The transition domain is the least common compound ancestor of source
/// and target (the source itself when the target is its descendant; the
/// source's parent for reentrant self-transitions). Everything actively
/// below the domain exits; the chain from the domain down to the target —
/// expanded through initial children and parallel regions — enters.
pub(crate) fn plan(
    def: &MachineDef,
    config: &[NodeId],
    source: NodeId,
    candidate: &Candidate,
) -> Microstep {
    let actions = candidate.actions.clone();
    let Some(target) = candidate.target else {
        return Microstep {
            actions,
            ..Microstep::default()
        };
    };
    if target == source && !candidate.reenter {
        // Self-transition without reenter: actions only.
        return Microstep {
            actions,
            ..Microstep::default()
        };
    }

    let domain = if target == source {
        def.parent(source).unwrap_or(source)
    } else if def.is_ancestor(source, target) {
        source
    } else {
        def.lca(source, target)
    };

    // Active proper descendants of the domain, deepest first. Document
    // order puts parents before children, so reversing the sorted
    // configuration yields a valid exit order.
    let mut exit: Vec<NodeId> = config
        .iter()
        .copied()
        .filter(|&n| def.is_ancestor(domain, n))
        .collect();
    exit.reverse();

    let mut chain: Vec<NodeId> = Vec::new();
    if target != domain {
        chain.push(target);
        for ancestor in def.ancestors(target) {
            if ancestor == domain {
                break;
            }
            chain.push(ancestor);
        }
        chain.reverse();
    }

    let mut entry = Vec::new();
    if let Some((&head, rest)) = chain.split_first() {
        enter_node(def, head, rest, &mut entry);
    } else {
        // Target equals the domain: it stays active, its subtree restarts.
        descend(def, domain, &[], &mut entry);
    }

    Microstep {
        exit,
        entry,
        actions,
    }
}

/// The complete initial configuration in entry order (shallowest first),
/// expanding initial children and all parallel regions from the root.
pub(crate) fn initial_configuration(def: &MachineDef) -> Vec<NodeId> {
    let mut entry = Vec::new();
    enter_node(def, def.root(), &[], &mut entry);
    entry
}

fn enter_node(def: &MachineDef, node: NodeId, chain: &[NodeId], out: &mut Vec<NodeId>) {
    out.push(node);
    descend(def, node, chain, out);
}

fn descend(def: &MachineDef, node: NodeId, chain: &[NodeId], out: &mut Vec<NodeId>) {
    match def.kind(node) {
        NodeKind::Atomic | NodeKind::Final => {}
        NodeKind::Compound => {
            if let Some((&head, rest)) = chain.split_first() {
                enter_node(def, head, rest, out);
            } else if let Some(initial) = def.initial(node) {
                enter_node(def, initial, &[], out);
            }
        }
        NodeKind::Parallel => {
            for &child in def.children(node) {
                if chain.first() == Some(&child) {
                    enter_node(def, child, &chain[1..], out);
                } else {
                    enter_node(def, child, &[], out);
                }
            }
        }
    }
}
