//! Uniform element view of a configuration graph for morphism search.
//!
//! Morphism search treats nodes and nonterminal hyperedges uniformly: both
//! become *elements* of an [`ElementGraph`]. A hyperedge element points at
//! its attached nodes through successor edges labeled with the tentacle
//! position, and a selector becomes a labeled successor edge between two node
//! elements. A morphism is then simply an injective, label-preserving map
//! between element sets, and tentacle order is preserved for free because the
//! position is part of the adjacency label.
//!
//! Elements are numbered nodes-first (in node id order), then hyperedges (in
//! edge id order).

use std::collections::HashMap;

use crate::heap::Heap;
use crate::nonterminal::{NodeType, Nonterminal, SelectorLabel};
use crate::types::{EdgeId, NodeId};

/// Label of an element: a node type or a nonterminal.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ElementLabel {
    Node(NodeType),
    Edge(Nonterminal),
}

/// Label of an adjacency between two elements.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum AdjacencyLabel {
    /// A selector edge between two node elements.
    Selector(SelectorLabel),
    /// The i-th tentacle of a hyperedge element.
    Tentacle(usize),
}

/// The element view of one [`Heap`]. Immutable once built.
#[derive(Debug)]
pub struct ElementGraph {
    node_ids: Vec<NodeId>,
    edge_ids: Vec<EdgeId>,
    labels: Vec<ElementLabel>,
    /// Successor adjacency per element, sorted by (element, label).
    succ: Vec<Vec<(usize, AdjacencyLabel)>>,
    /// Predecessor adjacency per element, sorted by (element, label).
    pred: Vec<Vec<(usize, AdjacencyLabel)>>,
    /// External rank per element (node elements only).
    external: Vec<Option<usize>>,
}

impl ElementGraph {
    pub fn new(heap: &Heap) -> Self {
        let node_ids: Vec<NodeId> = heap.node_ids().collect();
        let edge_ids: Vec<EdgeId> = heap.edge_ids().collect();
        let size = node_ids.len() + edge_ids.len();

        let node_element: HashMap<NodeId, usize> = node_ids
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i))
            .collect();

        let mut labels = Vec::with_capacity(size);
        let mut external = Vec::with_capacity(size);
        for &node in &node_ids {
            labels.push(ElementLabel::Node(heap.node_type(node).clone()));
            external.push(heap.external_rank(node));
        }
        for &edge in &edge_ids {
            labels.push(ElementLabel::Edge(heap.edge_label(edge).clone()));
            external.push(None);
        }

        let mut succ: Vec<Vec<(usize, AdjacencyLabel)>> = vec![Vec::new(); size];
        let mut pred: Vec<Vec<(usize, AdjacencyLabel)>> = vec![Vec::new(); size];
        for &node in &node_ids {
            let from = node_element[&node];
            for (label, target) in heap.selectors_of(node) {
                let to = node_element[target];
                succ[from].push((to, AdjacencyLabel::Selector(label.clone())));
                pred[to].push((from, AdjacencyLabel::Selector(label.clone())));
            }
        }
        for (i, &edge) in edge_ids.iter().enumerate() {
            let from = node_ids.len() + i;
            for (position, tentacle) in heap.tentacles(edge).iter().enumerate() {
                let to = node_element[tentacle];
                succ[from].push((to, AdjacencyLabel::Tentacle(position)));
                pred[to].push((from, AdjacencyLabel::Tentacle(position)));
            }
        }
        for adjacency in succ.iter_mut().chain(pred.iter_mut()) {
            adjacency.sort();
        }

        ElementGraph {
            node_ids,
            edge_ids,
            labels,
            succ,
            pred,
            external,
        }
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn label(&self, element: usize) -> &ElementLabel {
        &self.labels[element]
    }

    pub fn is_node_element(&self, element: usize) -> bool {
        element < self.node_ids.len()
    }

    /// The heap node id behind a node element.
    pub fn node_id(&self, element: usize) -> NodeId {
        assert!(self.is_node_element(element), "element is a hyperedge");
        self.node_ids[element]
    }

    /// The heap edge id behind a hyperedge element.
    pub fn edge_id(&self, element: usize) -> EdgeId {
        assert!(!self.is_node_element(element), "element is a node");
        self.edge_ids[element - self.node_ids.len()]
    }

    pub fn successors(&self, element: usize) -> &[(usize, AdjacencyLabel)] {
        &self.succ[element]
    }

    pub fn predecessors(&self, element: usize) -> &[(usize, AdjacencyLabel)] {
        &self.pred[element]
    }

    pub fn out_degree(&self, element: usize) -> usize {
        self.succ[element].len()
    }

    pub fn in_degree(&self, element: usize) -> usize {
        self.pred[element].len()
    }

    /// Sorted labels of all adjacencies from `from` to `to`.
    pub fn labels_between(&self, from: usize, to: usize) -> Vec<&AdjacencyLabel> {
        self.succ[from]
            .iter()
            .filter(|(element, _)| *element == to)
            .map(|(_, label)| label)
            .collect()
    }

    pub fn external_rank(&self, element: usize) -> Option<usize> {
        self.external[element]
    }

    pub fn is_external(&self, element: usize) -> bool {
        self.external[element].is_some()
    }
}
