//! Construction of the joint graph for an overlapping.
//!
//! The joint graph is the gluing of two rule right-hand sides along the
//! node and edge correspondences of an overlapping: nodes are added first
//! (all of graph 1, then the graph-2 nodes without a partner), then
//! selectors and hyperedges the same way. Elements in the intersection are
//! shared. The joint graph carries one embedding per source graph, so each
//! rule can be applied inside it. It has no external nodes of its own.

use std::collections::BTreeMap;

use super::overlapping::{EdgeElement, NodeOverlapping, OverlapContext};
use crate::heap::Heap;
use crate::morphism::Embedding;
use crate::types::{EdgeId, NodeId};

#[derive(Debug, Clone)]
pub struct JointHeap {
    pub heap: Heap,
    /// Embedding of the first right-hand side into the joint graph.
    pub embedding1: Embedding,
    /// Embedding of the second right-hand side into the joint graph.
    pub embedding2: Embedding,
}

impl JointHeap {
    pub fn new(overlapping: &NodeOverlapping<'_>) -> Self {
        let ctx: &OverlapContext<'_> = overlapping.context();
        let node_map = overlapping.node_map();
        let edge_map = overlapping.edge_map();
        let node_map_back: BTreeMap<NodeId, NodeId> =
            node_map.iter().map(|(&n1, &n2)| (n2, n1)).collect();
        let edge_map_back: BTreeMap<&EdgeElement, &EdgeElement> =
            edge_map.iter().map(|(e1, e2)| (e2, e1)).collect();

        let mut heap = Heap::new();

        // Nodes: all of graph 1, then the unshared ones of graph 2.
        let mut joint1: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        for node in ctx.hc1.node_ids() {
            joint1.insert(node, heap.add_node(ctx.hc1.node_type(node).clone()));
        }
        let mut joint2: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        for node in ctx.hc2.node_ids() {
            let joint = match node_map_back.get(&node) {
                Some(partner) => joint1[partner],
                None => heap.add_node(ctx.hc2.node_type(node).clone()),
            };
            joint2.insert(node, joint);
        }

        // Selectors: all of graph 1, then the unshared ones of graph 2.
        for node in ctx.hc1.node_ids() {
            for (label, target) in ctx.hc1.selectors_of(node) {
                heap.add_selector(joint1[&node], label.clone(), joint1[target]);
            }
        }
        for node in ctx.hc2.node_ids() {
            for (label, target) in ctx.hc2.selectors_of(node) {
                let element = EdgeElement::Selector(node, label.clone());
                if edge_map_back.contains_key(&element) {
                    continue; // Shared, already added from graph 1.
                }
                heap.add_selector(joint2[&node], label.clone(), joint2[target]);
            }
        }

        // Hyperedges the same way.
        let mut joint_edges1: BTreeMap<EdgeId, EdgeId> = BTreeMap::new();
        for edge in ctx.hc1.edge_ids() {
            let tentacles = ctx.hc1.tentacles(edge).iter().map(|t| joint1[t]).collect();
            joint_edges1.insert(
                edge,
                heap.add_edge(ctx.hc1.edge_label(edge).clone(), tentacles),
            );
        }
        let mut joint_edges2: BTreeMap<EdgeId, EdgeId> = BTreeMap::new();
        for edge in ctx.hc2.edge_ids() {
            let joint = match edge_map_back.get(&EdgeElement::Hyperedge(edge)) {
                Some(EdgeElement::Hyperedge(partner)) => joint_edges1[partner],
                Some(EdgeElement::Selector(..)) => {
                    unreachable!("a hyperedge is never matched with a selector")
                }
                None => {
                    let tentacles =
                        ctx.hc2.tentacles(edge).iter().map(|t| joint2[t]).collect();
                    heap.add_edge(ctx.hc2.edge_label(edge).clone(), tentacles)
                }
            };
            joint_edges2.insert(edge, joint);
        }

        JointHeap {
            heap,
            embedding1: Embedding::new(joint1, joint_edges1),
            embedding2: Embedding::new(joint2, joint_edges2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::overlapping::EdgeOverlapping;
    use super::*;
    use crate::nonterminal::{NodeType, SelectorLabel};

    fn ty() -> NodeType {
        NodeType::new("node")
    }

    fn sel(name: &str) -> SelectorLabel {
        SelectorLabel::new(name)
    }

    #[test]
    fn test_joint_counts_and_embeddings() {
        // hc1: a -next-> b; hc2: c -next-> d -prev-> e, with the `next`
        // selectors matched. Shared: 1 edge, 2 nodes.
        let mut hc1 = Heap::new();
        let nodes1 = hc1.add_nodes(&ty(), 2);
        hc1.add_selector(nodes1[0], sel("next"), nodes1[1]);
        hc1.set_external(nodes1[0]);
        hc1.set_external(nodes1[1]);

        let mut hc2 = Heap::new();
        let nodes2 = hc2.add_nodes(&ty(), 3);
        hc2.add_selector(nodes2[0], sel("next"), nodes2[1]);
        hc2.add_selector(nodes2[2], sel("prev"), nodes2[1]);

        let ctx = OverlapContext::new(&hc1, &hc2);
        let edges = EdgeOverlapping::base(&ctx).with_pair(0, 0).unwrap();
        assert!(edges.is_valid());
        let overlapping = NodeOverlapping::base(&edges);

        let joint = JointHeap::new(&overlapping);
        joint.heap.assert_valid();
        // |nodes(hc1)| + |nodes(hc2)| - |shared| = 2 + 3 - 2.
        assert_eq!(joint.heap.node_count(), 3);
        // 1 + 2 - 1 shared selector.
        assert_eq!(joint.heap.selector_count(), 2);

        // Both embeddings replay into the joint graph.
        for (heap, embedding) in [(&hc1, &joint.embedding1), (&hc2, &joint.embedding2)] {
            for node in heap.node_ids() {
                assert_eq!(
                    joint.heap.node_type(embedding.node(node)),
                    heap.node_type(node)
                );
                for (label, target) in heap.selectors_of(node) {
                    assert_eq!(
                        joint.heap.selector_target(embedding.node(node), label),
                        Some(embedding.node(*target))
                    );
                }
            }
        }

        // The matched selector maps to one shared joint selector.
        assert_eq!(
            joint.embedding1.node(nodes1[0]),
            joint.embedding2.node(nodes2[0])
        );
        assert_eq!(
            joint.embedding1.node(nodes1[1]),
            joint.embedding2.node(nodes2[1])
        );
    }
}
