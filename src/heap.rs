//! The configuration graph: an arena-indexed, typed hypergraph modeling a
//! heap shape.
//!
//! A [`Heap`] owns three element kinds:
//!
//! - **nodes**, each carrying a [`NodeType`]; a subset is marked *external*
//!   with a contiguous rank 0..k-1, making them the interface of the graph
//!   when it is substituted for a nonterminal;
//! - **selector edges**: labeled, directed, binary edges stored in per-node
//!   adjacency. A node has at most one selector per label (pointer-field
//!   semantics), so a selector is identified by `(source, label)`;
//! - **nonterminal hyperedges**, each carrying a [`Nonterminal`] and an
//!   ordered tuple of attached nodes ("tentacles") whose length equals the
//!   nonterminal's rank.
//!
//! Heaps are value-like: every transformation clones first and mutates the
//! clone, and ids survive both cloning and deletion (slots are tombstoned,
//! never reused). Structural violations are programming errors and abort via
//! assertions rather than producing a malformed graph.

use log::debug;

use crate::index::IndexSymbol;
use crate::morphism::Embedding;
use crate::nonterminal::{NodeType, Nonterminal, SelectorLabel};
use crate::types::{EdgeId, NodeId};

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct NodeData {
    ty: NodeType,
    /// Outgoing selectors, kept sorted by label.
    selectors: Vec<(SelectorLabel, NodeId)>,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct EdgeData {
    label: Nonterminal,
    tentacles: Vec<NodeId>,
}

/// A configuration graph.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    nodes: Vec<Option<NodeData>>,
    edges: Vec<Option<EdgeData>>,
    /// External nodes in rank order.
    externals: Vec<NodeId>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    // -- Nodes --------------------------------------------------------------

    pub fn add_node(&mut self, ty: NodeType) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Some(NodeData {
            ty,
            selectors: Vec::new(),
        }));
        id
    }

    pub fn add_nodes(&mut self, ty: &NodeType, count: usize) -> Vec<NodeId> {
        (0..count).map(|_| self.add_node(ty.clone())).collect()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.get(node.index()).is_some_and(|slot| slot.is_some())
    }

    fn node(&self, node: NodeId) -> &NodeData {
        self.nodes[node.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("node {} is not present", node))
    }

    fn node_mut(&mut self, node: NodeId) -> &mut NodeData {
        self.nodes[node.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("node {} is not present", node))
    }

    pub fn node_type(&self, node: NodeId) -> &NodeType {
        &self.node(node).ty
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| NodeId::new(i as u32)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Remove a node. The node must be isolated: no selector may point at it,
    /// no live selector may leave it, and no tentacle may touch it.
    pub fn remove_node(&mut self, node: NodeId) {
        assert!(
            self.node(node).selectors.is_empty(),
            "removing node {} that still has outgoing selectors",
            node
        );
        for other in self.node_ids() {
            assert!(
                !self.node(other).selectors.iter().any(|(_, to)| *to == node),
                "removing node {} that is still the target of a selector",
                node
            );
        }
        for edge in self.edge_ids() {
            assert!(
                !self.tentacles(edge).contains(&node),
                "removing node {} that is still attached to {}",
                node,
                edge
            );
        }
        assert!(
            !self.externals.contains(&node),
            "removing external node {}",
            node
        );
        self.nodes[node.index()] = None;
    }

    // -- Selectors ----------------------------------------------------------

    pub fn add_selector(&mut self, from: NodeId, label: SelectorLabel, to: NodeId) {
        assert!(self.contains_node(to), "selector target {} is not present", to);
        let data = self.node_mut(from);
        match data.selectors.binary_search_by(|(l, _)| l.cmp(&label)) {
            Ok(_) => panic!("node {} already has a selector labeled `{}`", from, label),
            Err(pos) => data.selectors.insert(pos, (label, to)),
        }
    }

    pub fn selector_target(&self, from: NodeId, label: &SelectorLabel) -> Option<NodeId> {
        self.node(from)
            .selectors
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, to)| *to)
    }

    /// Outgoing selectors of a node, sorted by label.
    pub fn selectors_of(&self, node: NodeId) -> &[(SelectorLabel, NodeId)] {
        &self.node(node).selectors
    }

    pub fn remove_selector(&mut self, from: NodeId, label: &SelectorLabel) {
        let data = self.node_mut(from);
        let pos = data
            .selectors
            .iter()
            .position(|(l, _)| l == label)
            .unwrap_or_else(|| panic!("node {} has no selector labeled `{}`", from, label));
        data.selectors.remove(pos);
    }

    pub fn selector_count(&self) -> usize {
        self.node_ids().map(|n| self.node(n).selectors.len()).sum()
    }

    // -- Nonterminal edges --------------------------------------------------

    pub fn add_edge(&mut self, label: Nonterminal, tentacles: Vec<NodeId>) -> EdgeId {
        assert_eq!(
            tentacles.len(),
            label.rank(),
            "tentacle count must equal the rank of `{}`",
            label
        );
        for &tentacle in &tentacles {
            assert!(self.contains_node(tentacle), "tentacle {} is not present", tentacle);
        }
        let id = EdgeId::new(self.edges.len() as u32);
        self.edges.push(Some(EdgeData { label, tentacles }));
        id
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.get(edge.index()).is_some_and(|slot| slot.is_some())
    }

    fn edge(&self, edge: EdgeId) -> &EdgeData {
        self.edges[edge.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("edge {} is not present", edge))
    }

    pub fn edge_label(&self, edge: EdgeId) -> &Nonterminal {
        &self.edge(edge).label
    }

    pub fn tentacles(&self, edge: EdgeId) -> &[NodeId] {
        &self.edge(edge).tentacles
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| EdgeId::new(i as u32)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn remove_edge(&mut self, edge: EdgeId) {
        assert!(self.contains_edge(edge), "edge {} is not present", edge);
        self.edges[edge.index()] = None;
    }

    /// Replace the label of an edge by another nonterminal of the same rank.
    pub fn set_edge_label(&mut self, edge: EdgeId, label: Nonterminal) {
        let data = self.edges[edge.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("edge {} is not present", edge));
        assert_eq!(
            label.rank(),
            data.tentacles.len(),
            "replacement label `{}` has the wrong rank",
            label
        );
        data.label = label;
    }

    // -- External nodes -----------------------------------------------------

    /// Mark a node external; it receives the next free rank.
    pub fn set_external(&mut self, node: NodeId) {
        assert!(self.contains_node(node), "node {} is not present", node);
        assert!(
            !self.externals.contains(&node),
            "node {} is already external",
            node
        );
        self.externals.push(node);
    }

    /// External nodes in rank order.
    pub fn externals(&self) -> &[NodeId] {
        &self.externals
    }

    pub fn is_external(&self, node: NodeId) -> bool {
        self.externals.contains(&node)
    }

    pub fn external_rank(&self, node: NodeId) -> Option<usize> {
        self.externals.iter().position(|&n| n == node)
    }

    pub fn external_count(&self) -> usize {
        self.externals.len()
    }

    // -- Index rewriting ----------------------------------------------------

    /// Materialize an abstract index symbol: every edge whose index ends with
    /// `Abstract(symbol)` gets that symbol replaced by `expansion`.
    pub fn materialize_index(&mut self, symbol: &str, expansion: &[IndexSymbol]) {
        for slot in self.edges.iter_mut().flatten() {
            let ends_with = slot
                .label
                .index()
                .and_then(|idx| idx.last())
                .is_some_and(|last| matches!(last, IndexSymbol::Abstract(name) if name == symbol));
            if ends_with {
                slot.label = slot.label.with_prolonged_index(expansion);
            }
        }
    }

    /// Instantiate the index variable: every edge whose index ends with the
    /// variable gets it replaced by `instantiation`.
    pub fn instantiate_index(&mut self, instantiation: &[IndexSymbol]) {
        for slot in self.edges.iter_mut().flatten() {
            let ends_with = slot
                .label
                .index()
                .is_some_and(|idx| idx.ends_with_variable());
            if ends_with {
                slot.label = slot.label.with_prolonged_index(instantiation);
            }
        }
    }

    // -- Structure rewriting ------------------------------------------------

    /// Derive the collapsed variant of a rule right-hand side by merging
    /// external nodes.
    ///
    /// `partition` maps each external rank to a block number (a restricted
    /// growth string: block numbers appear in increasing order of first use).
    /// All externals of a block are identified with the block's first member;
    /// the result's externals are the block representatives in block order.
    pub fn merge_externals(&self, partition: &[usize]) -> Heap {
        assert_eq!(
            partition.len(),
            self.externals.len(),
            "partition must cover every external node"
        );
        let block_count = partition.iter().copied().max().map_or(0, |m| m + 1);
        let mut representative: Vec<Option<NodeId>> = vec![None; block_count];
        let mut seen_blocks = 0;
        for (rank, &block) in partition.iter().enumerate() {
            assert!(
                block <= seen_blocks,
                "partition is not a restricted growth string"
            );
            if representative[block].is_none() {
                representative[block] = Some(self.externals[rank]);
                seen_blocks += 1;
            }
        }

        let mut result = self.clone();
        result.externals.clear();
        for (rank, &block) in partition.iter().enumerate() {
            let rep = representative[block].expect("every block has a representative");
            let node = self.externals[rank];
            if node != rep {
                result.redirect_node(node, rep);
            }
        }
        result.externals = representative
            .into_iter()
            .map(|rep| rep.expect("every block has a representative"))
            .collect();
        result
    }

    /// Identify `from` with `to`: move selectors, retarget incoming selectors
    /// and tentacles, then delete `from`.
    fn redirect_node(&mut self, from: NodeId, to: NodeId) {
        assert_eq!(
            self.node(from).ty,
            self.node(to).ty,
            "cannot identify nodes of different types"
        );
        let moved = std::mem::take(&mut self.node_mut(from).selectors);
        for (label, target) in moved {
            let target = if target == from { to } else { target };
            match self.selector_target(to, &label) {
                None => self.add_selector(to, label, target),
                Some(existing) => assert_eq!(
                    existing, target,
                    "identifying nodes with conflicting `{}` selectors",
                    label
                ),
            }
        }
        for slot in self.nodes.iter_mut().flatten() {
            for (_, target) in slot.selectors.iter_mut() {
                if *target == from {
                    *target = to;
                }
            }
        }
        for slot in self.edges.iter_mut().flatten() {
            for tentacle in slot.tentacles.iter_mut() {
                if *tentacle == from {
                    *tentacle = to;
                }
            }
        }
        self.nodes[from.index()] = None;
    }

    /// Fold an embedded rule right-hand side into a single nonterminal edge.
    ///
    /// Deletes the images of the pattern's hyperedges, selectors and internal
    /// nodes, then attaches a fresh edge labeled `lhs` to the images of the
    /// pattern's external nodes. For a collapsed rule, `ext_map` translates
    /// the original external rank `i` to the collapsed rank the tentacle `i`
    /// attaches to.
    pub fn replace_matching(
        &self,
        pattern: &Heap,
        embedding: &Embedding,
        lhs: &Nonterminal,
        ext_map: Option<&[usize]>,
    ) -> Heap {
        let mut result = self.clone();
        for (_, target_edge) in embedding.edge_pairs() {
            result.remove_edge(target_edge);
        }
        for pattern_node in pattern.node_ids() {
            let target_node = embedding.node(pattern_node);
            for (label, _) in pattern.selectors_of(pattern_node).to_vec() {
                result.remove_selector(target_node, &label);
            }
        }

        let rank = lhs.rank();
        let mut tentacles = Vec::with_capacity(rank);
        for i in 0..rank {
            let ext_index = ext_map.map_or(i, |m| m[i]);
            tentacles.push(embedding.node(pattern.externals()[ext_index]));
        }

        for pattern_node in pattern.node_ids() {
            if !pattern.is_external(pattern_node) {
                result.remove_node(embedding.node(pattern_node));
            }
        }
        let edge = result.add_edge(lhs.clone(), tentacles);
        debug!("folded embedding into {} labeled {}", edge, lhs);
        result
    }

    /// Check the structural invariants; panics on violation.
    pub fn assert_valid(&self) {
        for node in self.node_ids() {
            for (_, target) in self.selectors_of(node) {
                assert!(self.contains_node(*target), "dangling selector target");
            }
        }
        for edge in self.edge_ids() {
            assert_eq!(
                self.tentacles(edge).len(),
                self.edge_label(edge).rank(),
                "tentacle count differs from rank"
            );
            for tentacle in self.tentacles(edge) {
                assert!(self.contains_node(*tentacle), "dangling tentacle");
            }
        }
        for external in &self.externals {
            assert!(self.contains_node(*external), "dangling external node");
        }
    }
}

/// Equality over live content: two heaps are equal when the same ids are
/// occupied with equal data and the external sequences agree. The shape of
/// the tombstone regions does not matter.
impl PartialEq for Heap {
    fn eq(&self, other: &Self) -> bool {
        self.externals == other.externals
            && self.node_ids().eq(other.node_ids())
            && self.node_ids().all(|n| self.node(n) == other.node(n))
            && self.edge_ids().eq(other.edge_ids())
            && self.edge_ids().all(|e| self.edge(e) == other.edge(e))
    }
}

impl Eq for Heap {}

impl std::hash::Hash for Heap {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for node in self.node_ids() {
            node.hash(state);
            self.node(node).hash(state);
        }
        for edge in self.edge_ids() {
            edge.hash(state);
            self.edge(edge).hash(state);
        }
        self.externals.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonterminal::{NodeType, SelectorLabel};

    fn ty() -> NodeType {
        NodeType::new("node")
    }

    fn sel(name: &str) -> SelectorLabel {
        SelectorLabel::new(name)
    }

    #[test]
    fn test_ids_survive_deletion() {
        let mut heap = Heap::new();
        let nodes = heap.add_nodes(&ty(), 3);
        heap.remove_node(nodes[1]);
        assert!(heap.contains_node(nodes[0]));
        assert!(!heap.contains_node(nodes[1]));
        assert!(heap.contains_node(nodes[2]));
        // A later node gets a fresh id, not the tombstoned one.
        let fresh = heap.add_node(ty());
        assert_ne!(fresh, nodes[1]);
    }

    #[test]
    #[should_panic(expected = "already has a selector")]
    fn test_selector_is_a_function() {
        let mut heap = Heap::new();
        let nodes = heap.add_nodes(&ty(), 2);
        heap.add_selector(nodes[0], sel("next"), nodes[1]);
        heap.add_selector(nodes[0], sel("next"), nodes[0]);
    }

    #[test]
    #[should_panic(expected = "tentacle count")]
    fn test_rank_mismatch_aborts() {
        let mut heap = Heap::new();
        let nodes = heap.add_nodes(&ty(), 1);
        heap.add_edge(Nonterminal::plain("L", 2, vec![false, false]), vec![nodes[0]]);
    }

    #[test]
    fn test_merge_externals() {
        // Rule rhs: three externals, selector from 0 to 1.
        let mut rhs = Heap::new();
        let nodes = rhs.add_nodes(&ty(), 3);
        rhs.add_selector(nodes[0], sel("next"), nodes[1]);
        rhs.set_external(nodes[0]);
        rhs.set_external(nodes[1]);
        rhs.set_external(nodes[2]);

        // Merge externals 1 and 2.
        let collapsed = rhs.merge_externals(&[0, 1, 1]);
        collapsed.assert_valid();
        assert_eq!(collapsed.node_count(), 2);
        assert_eq!(collapsed.externals(), &[nodes[0], nodes[1]]);
        assert_eq!(collapsed.selector_target(nodes[0], &sel("next")), Some(nodes[1]));
    }

    #[test]
    fn test_merge_externals_self_loop() {
        let mut rhs = Heap::new();
        let nodes = rhs.add_nodes(&ty(), 2);
        rhs.add_selector(nodes[0], sel("next"), nodes[1]);
        rhs.set_external(nodes[0]);
        rhs.set_external(nodes[1]);

        let collapsed = rhs.merge_externals(&[0, 0]);
        collapsed.assert_valid();
        assert_eq!(collapsed.node_count(), 1);
        assert_eq!(collapsed.selector_target(nodes[0], &sel("next")), Some(nodes[0]));
    }

    #[test]
    fn test_live_content_equality() {
        let mut a = Heap::new();
        let nodes = a.add_nodes(&ty(), 3);
        a.add_selector(nodes[0], sel("next"), nodes[1]);

        let mut b = a.clone();
        assert_eq!(a, b);
        b.remove_selector(nodes[0], &sel("next"));
        assert_ne!(a, b);

        a.remove_node(nodes[2]);
        let mut c = Heap::new();
        let _ = c.add_nodes(&ty(), 3);
        // Different live sets, even though node 2 in `c` was never deleted.
        assert_ne!(a, c);
    }
}
