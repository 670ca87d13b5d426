//! Morphism search between configuration graphs.
//!
//! The search finds injective maps from a pattern graph into a target graph
//! that preserve node types, selector structure and direction, and
//! nonterminal labels with tentacle order. The same backtracking engine is
//! parameterized into two front ends:
//!
//! - [`MatcherBuilder::embedding`]: subgraph embeddings, as used by
//!   canonicalization to locate grammar right-hand sides;
//! - [`MatcherBuilder::isomorphism`]: full isomorphism checks (size
//!   equality, exact labels, external-rank correspondence), as used by the
//!   confluence analysis to compare canonicalization results.
//!
//! Feasibility predicates are swappable per use case; see [`feasibility`].

pub mod feasibility;
pub mod graph;
pub mod search;
pub mod state;

use std::collections::BTreeMap;

use feasibility::{
    CompatibleLabels, ConsistentEdges, ExternalRanks, FeasibilityPredicate, InternalNodeIntegrity,
    ProtectedTargets,
};
use graph::ElementGraph;
use search::MorphismSearch;
use state::State;

use crate::heap::Heap;
use crate::types::{EdgeId, NodeId};

/// A complete morphism over the element view: element `i` of the pattern
/// maps to element `map[i]` of the target.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Morphism {
    map: Vec<usize>,
}

impl Morphism {
    pub(crate) fn new(map: Vec<usize>) -> Self {
        Morphism { map }
    }

    pub fn empty() -> Self {
        Morphism { map: Vec::new() }
    }

    pub fn map(&self) -> &[usize] {
        &self.map
    }

    pub fn image_of(&self, element: usize) -> usize {
        self.map[element]
    }

    /// Translate the element-level morphism back to heap ids.
    pub fn to_embedding(&self, pattern: &ElementGraph, target: &ElementGraph) -> Embedding {
        let mut node_map = BTreeMap::new();
        let mut edge_map = BTreeMap::new();
        for (p, &t) in self.map.iter().enumerate() {
            if pattern.is_node_element(p) {
                node_map.insert(pattern.node_id(p), target.node_id(t));
            } else {
                edge_map.insert(pattern.edge_id(p), target.edge_id(t));
            }
        }
        Embedding { node_map, edge_map }
    }
}

/// A matching between two heaps, in heap-id terms: pattern nodes to target
/// nodes and pattern hyperedges to target hyperedges. Selector
/// correspondence is implied by the node map, since a selector is identified
/// by its source node and label.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Embedding {
    node_map: BTreeMap<NodeId, NodeId>,
    edge_map: BTreeMap<EdgeId, EdgeId>,
}

impl Embedding {
    pub fn new(node_map: BTreeMap<NodeId, NodeId>, edge_map: BTreeMap<EdgeId, EdgeId>) -> Self {
        Embedding { node_map, edge_map }
    }

    pub fn node(&self, node: NodeId) -> NodeId {
        *self
            .node_map
            .get(&node)
            .unwrap_or_else(|| panic!("pattern node {} is not mapped", node))
    }

    pub fn edge(&self, edge: EdgeId) -> EdgeId {
        *self
            .edge_map
            .get(&edge)
            .unwrap_or_else(|| panic!("pattern edge {} is not mapped", edge))
    }

    pub fn node_pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.node_map.iter().map(|(&p, &t)| (p, t))
    }

    pub fn edge_pairs(&self) -> impl Iterator<Item = (EdgeId, EdgeId)> + '_ {
        self.edge_map.iter().map(|(&p, &t)| (p, t))
    }
}

/// Assembles the predicate set and runs the search.
pub struct MatcherBuilder {
    predicates: Vec<Box<dyn FeasibilityPredicate>>,
    require_equal_size: bool,
}

impl MatcherBuilder {
    /// Subgraph embedding search: labels compatible up to index stacks,
    /// pattern adjacencies included in the target, internal pattern nodes
    /// covered exactly.
    pub fn embedding() -> Self {
        MatcherBuilder {
            predicates: vec![
                Box::new(CompatibleLabels { exact_index: false }),
                Box::new(ConsistentEdges { exact: false }),
                Box::new(InternalNodeIntegrity),
            ],
            require_equal_size: false,
        }
    }

    /// Full isomorphism search: equal sizes, exact labels (index stacks
    /// included), exact adjacency in both directions, corresponding external
    /// ranks.
    pub fn isomorphism() -> Self {
        MatcherBuilder {
            predicates: vec![
                Box::new(CompatibleLabels { exact_index: true }),
                Box::new(ConsistentEdges { exact: true }),
                Box::new(ExternalRanks),
            ],
            require_equal_size: true,
        }
    }

    /// Add a caller-supplied feasibility predicate.
    pub fn with_predicate(mut self, predicate: Box<dyn FeasibilityPredicate>) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Forbid abstracting the given target nodes away.
    pub fn with_protected_targets(self, nodes: std::collections::HashSet<NodeId>) -> Self {
        self.with_predicate(Box::new(ProtectedTargets { nodes }))
    }

    /// Run the search; the returned iterator lazily yields every morphism.
    pub fn search<'g>(
        self,
        pattern: &'g ElementGraph,
        target: &'g ElementGraph,
    ) -> MorphismSearch<'g> {
        MorphismSearch::new(
            State::new(pattern, target),
            self.predicates,
            self.require_equal_size,
        )
    }
}

/// Whether two heaps are isomorphic (externals must correspond rank-wise).
pub fn isomorphic(a: &Heap, b: &Heap) -> bool {
    let view_a = ElementGraph::new(a);
    let view_b = ElementGraph::new(b);
    MatcherBuilder::isomorphism().search(&view_a, &view_b).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::feasibility::labels_equal;
    use super::graph::ElementLabel;
    use super::*;
    use crate::nonterminal::{NodeType, Nonterminal, SelectorLabel};

    fn ty() -> NodeType {
        NodeType::new("node")
    }

    fn sel(name: &str) -> SelectorLabel {
        SelectorLabel::new(name)
    }

    /// Chain of `len` nodes connected by `next` selectors.
    fn chain(len: usize) -> Heap {
        let mut heap = Heap::new();
        let nodes = heap.add_nodes(&ty(), len);
        for window in nodes.windows(2) {
            heap.add_selector(window[0], sel("next"), window[1]);
        }
        heap
    }

    #[test]
    fn test_embedding_completeness_chain() {
        // A 2-chain pattern with both nodes external embeds into a 4-chain
        // at three positions.
        let mut pattern = chain(2);
        for node in pattern.node_ids().collect::<Vec<_>>() {
            pattern.set_external(node);
        }
        let target = chain(4);

        let pattern_view = ElementGraph::new(&pattern);
        let target_view = ElementGraph::new(&target);
        let found: Vec<Morphism> = MatcherBuilder::embedding()
            .search(&pattern_view, &target_view)
            .collect();
        assert_eq!(found.len(), 3);

        // No duplicates.
        for (i, a) in found.iter().enumerate() {
            for b in &found[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_embedding_soundness_replay() {
        let mut pattern = chain(3);
        let externals: Vec<_> = pattern.node_ids().collect();
        pattern.set_external(externals[0]);
        pattern.set_external(externals[2]);
        let target = chain(5);

        let pattern_view = ElementGraph::new(&pattern);
        let target_view = ElementGraph::new(&target);
        for morphism in MatcherBuilder::embedding().search(&pattern_view, &target_view) {
            // Replay: labels and adjacency agree element by element.
            for p in 0..pattern_view.size() {
                let t = morphism.image_of(p);
                match (pattern_view.label(p), target_view.label(t)) {
                    (ElementLabel::Node(a), ElementLabel::Node(b)) => assert_eq!(a, b),
                    (ElementLabel::Edge(a), ElementLabel::Edge(b)) => {
                        assert!(a.same_symbol(b))
                    }
                    _ => panic!("element kinds differ"),
                }
                for (p2, _) in pattern_view.successors(p) {
                    assert!(labels_equal(
                        &pattern_view,
                        p,
                        *p2,
                        &target_view,
                        t,
                        morphism.image_of(*p2),
                    ));
                }
            }
        }
    }

    #[test]
    fn test_internal_nodes_need_exact_degree() {
        // Pattern: 2-chain with only the first node external. Its internal
        // end node has degree 0 out / 1 in, so it can only match the very
        // last node of the target chain.
        let mut pattern = chain(2);
        let first = pattern.node_ids().next().unwrap();
        pattern.set_external(first);
        let target = chain(4);

        let pattern_view = ElementGraph::new(&pattern);
        let target_view = ElementGraph::new(&target);
        let found: Vec<Morphism> = MatcherBuilder::embedding()
            .search(&pattern_view, &target_view)
            .collect();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_isomorphism_respects_direction() {
        let mut forward = Heap::new();
        let nodes = forward.add_nodes(&ty(), 2);
        forward.add_selector(nodes[0], sel("next"), nodes[1]);

        let mut backward = Heap::new();
        let nodes = backward.add_nodes(&ty(), 2);
        backward.add_selector(nodes[1], sel("next"), nodes[0]);

        // Isomorphic as unlabeled-rank graphs: the map just swaps the nodes.
        assert!(isomorphic(&forward, &backward));

        let mut loops = Heap::new();
        let nodes = loops.add_nodes(&ty(), 2);
        loops.add_selector(nodes[0], sel("next"), nodes[0]);
        assert!(!isomorphic(&forward, &loops));
    }

    #[test]
    fn test_isomorphism_external_ranks() {
        let mut a = Heap::new();
        let nodes = a.add_nodes(&ty(), 2);
        a.add_selector(nodes[0], sel("next"), nodes[1]);
        a.set_external(nodes[0]);
        a.set_external(nodes[1]);

        let mut b = Heap::new();
        let nodes = b.add_nodes(&ty(), 2);
        b.add_selector(nodes[1], sel("next"), nodes[0]);
        b.set_external(nodes[0]);
        b.set_external(nodes[1]);

        // The only structural isomorphism maps a.0 to b.1, which breaks the
        // rank correspondence.
        assert!(!isomorphic(&a, &b));
    }

    #[test]
    fn test_nonterminal_edges_match_with_tentacle_order() {
        let nt = Nonterminal::plain("L", 2, vec![false, false]);
        let mut pattern = Heap::new();
        let nodes = pattern.add_nodes(&ty(), 2);
        pattern.add_edge(nt.clone(), vec![nodes[0], nodes[1]]);
        pattern.set_external(nodes[0]);
        pattern.set_external(nodes[1]);

        let mut target = Heap::new();
        let nodes = target.add_nodes(&ty(), 2);
        target.add_edge(nt.clone(), vec![nodes[1], nodes[0]]);

        let pattern_view = ElementGraph::new(&pattern);
        let target_view = ElementGraph::new(&target);
        let found: Vec<Morphism> = MatcherBuilder::embedding()
            .search(&pattern_view, &target_view)
            .collect();
        // Exactly one embedding: tentacle order forces the node map to be
        // reversed, not two embeddings one per node assignment.
        assert_eq!(found.len(), 1);
        let embedding = found[0].to_embedding(&pattern_view, &target_view);
        assert_eq!(embedding.node(pattern.externals()[0]), target.tentacles(target.edge_ids().next().unwrap())[0]);
    }

    #[test]
    fn test_protected_targets_reject_embedding() {
        use std::collections::HashSet;

        // Pattern: 2-chain, both internal -> must cover the whole target.
        let pattern = chain(2);
        let target = chain(2);
        let protected: HashSet<NodeId> = target.node_ids().take(1).collect();

        let pattern_view = ElementGraph::new(&pattern);
        let target_view = ElementGraph::new(&target);
        assert_eq!(
            MatcherBuilder::embedding()
                .search(&pattern_view, &target_view)
                .count(),
            1
        );
        let pattern_view = ElementGraph::new(&pattern);
        let target_view = ElementGraph::new(&target);
        assert_eq!(
            MatcherBuilder::embedding()
                .with_protected_targets(protected)
                .search(&pattern_view, &target_view)
                .count(),
            0
        );
    }
}
