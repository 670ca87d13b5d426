//! Feasibility predicates for morphism search.
//!
//! A predicate inspects a candidate pair `(p, t)` against the current partial
//! morphism and rejects pairs that can no longer lead to the kind of morphism
//! being searched for. The predicate set determines the morphism kind: plain
//! embeddings, full isomorphisms, or embeddings with additional restrictions
//! such as protected nodes. Predicates are assembled by the
//! [`MatcherBuilder`](super::MatcherBuilder) and can be extended by callers;
//! they are injected, not hard-coded.

use std::collections::HashSet;

use super::graph::{AdjacencyLabel, ElementGraph, ElementLabel};
use super::state::State;
use crate::types::NodeId;

pub trait FeasibilityPredicate {
    fn eval(&self, state: &State, p: usize, t: usize) -> bool;
}

/// Element labels must be compatible: equal node types, or the same
/// nonterminal symbol. With `exact_index`, indexed nonterminals must agree on
/// their whole index; without it the index is ignored (it is reconciled later
/// by the index matcher).
pub struct CompatibleLabels {
    pub exact_index: bool,
}

impl FeasibilityPredicate for CompatibleLabels {
    fn eval(&self, state: &State, p: usize, t: usize) -> bool {
        match (state.pattern().label(p), state.target().label(t)) {
            (ElementLabel::Node(a), ElementLabel::Node(b)) => a == b,
            (ElementLabel::Edge(a), ElementLabel::Edge(b)) => {
                if self.exact_index {
                    a == b
                } else {
                    a.same_symbol(b)
                }
            }
            _ => false,
        }
    }
}

/// Adjacencies to the already-matched part must carry compatible labels.
///
/// For embeddings, every pattern adjacency between `p` and a matched element
/// must exist between `t` and the element's image (label multiset inclusion).
/// For isomorphisms (`exact`), the label multisets must be equal and the
/// check also runs from the target side, so that `t` has no extra adjacency
/// into the matched region.
pub struct ConsistentEdges {
    pub exact: bool,
}

impl ConsistentEdges {
    /// Multiset inclusion of two sorted label sequences.
    fn included(sub: &[&AdjacencyLabel], sup: &[&AdjacencyLabel]) -> bool {
        let mut i = 0;
        for label in sup {
            if i < sub.len() && sub[i] == *label {
                i += 1;
            }
        }
        i == sub.len()
    }

    fn compatible(&self, sub: &[&AdjacencyLabel], sup: &[&AdjacencyLabel]) -> bool {
        if self.exact {
            sub == sup
        } else {
            Self::included(sub, sup)
        }
    }
}

impl FeasibilityPredicate for ConsistentEdges {
    fn eval(&self, state: &State, p: usize, t: usize) -> bool {
        let pattern = state.pattern();
        let target = state.target();

        for (p2, _) in pattern.successors(p) {
            // A self-loop closes against the candidate pair itself.
            let t2 = if *p2 == p { Some(t) } else { state.pattern_image(*p2) };
            if let Some(t2) = t2 {
                if !self.compatible(
                    &pattern.labels_between(p, *p2),
                    &target.labels_between(t, t2),
                ) {
                    return false;
                }
            }
        }
        for (p2, _) in pattern.predecessors(p) {
            let t2 = if *p2 == p { Some(t) } else { state.pattern_image(*p2) };
            if let Some(t2) = t2 {
                if !self.compatible(
                    &pattern.labels_between(*p2, p),
                    &target.labels_between(t2, t),
                ) {
                    return false;
                }
            }
        }

        if self.exact {
            // No extra target adjacency into the matched region.
            for (t2, _) in target.successors(t) {
                let p2 = if *t2 == t { Some(p) } else { state.target_preimage(*t2) };
                if let Some(p2) = p2 {
                    if pattern.labels_between(p, p2) != target.labels_between(t, *t2) {
                        return false;
                    }
                }
            }
            for (t2, _) in target.predecessors(t) {
                let p2 = if *t2 == t { Some(p) } else { state.target_preimage(*t2) };
                if let Some(p2) = p2 {
                    if pattern.labels_between(p2, p) != target.labels_between(*t2, t) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Internal pattern nodes must be covered exactly.
///
/// When a matched subgraph is folded into a nonterminal edge, the images of
/// internal pattern nodes are deleted. That is only sound if the target node
/// has no incidences beyond the images of the pattern's: degrees must be
/// equal, and an external target node can never be deleted.
pub struct InternalNodeIntegrity;

impl FeasibilityPredicate for InternalNodeIntegrity {
    fn eval(&self, state: &State, p: usize, t: usize) -> bool {
        let pattern = state.pattern();
        let target = state.target();
        if !pattern.is_node_element(p) || pattern.is_external(p) {
            return true;
        }
        !target.is_external(t)
            && pattern.out_degree(p) == target.out_degree(t)
            && pattern.in_degree(p) == target.in_degree(t)
    }
}

/// Forbids abstracting away the given target nodes: internal pattern nodes
/// may not map onto them. Used to keep constants and marked nodes concrete.
pub struct ProtectedTargets {
    pub nodes: HashSet<NodeId>,
}

impl FeasibilityPredicate for ProtectedTargets {
    fn eval(&self, state: &State, p: usize, t: usize) -> bool {
        let pattern = state.pattern();
        let target = state.target();
        if !pattern.is_node_element(p) || pattern.is_external(p) || !target.is_node_element(t) {
            return true;
        }
        !self.nodes.contains(&target.node_id(t))
    }
}

/// External ranks must correspond exactly (isomorphism only). A morphism
/// passing this predicate maps the i-th external node onto the i-th external
/// node, which is what makes the track-morphism check of the confluence
/// analysis work.
pub struct ExternalRanks;

impl FeasibilityPredicate for ExternalRanks {
    fn eval(&self, state: &State, p: usize, t: usize) -> bool {
        state.pattern().external_rank(p) == state.target().external_rank(t)
    }
}

/// Convenience: check a label multiset equality from outside the search.
pub fn labels_equal(a: &ElementGraph, from_a: usize, to_a: usize, b: &ElementGraph, from_b: usize, to_b: usize) -> bool {
    a.labels_between(from_a, to_a) == b.labels_between(from_b, to_b)
}
