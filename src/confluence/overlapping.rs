//! Enumeration of overlappings between two rule right-hand sides.
//!
//! An overlapping glues the two graphs along a partial correspondence of
//! their elements. It is built in two layers, each by incremental search
//! from a base (empty) overlapping: *edges* first (selectors and
//! nonterminal hyperedges), then *nodes*. Equivalence pairs are enumerated
//! in lexicographic order (graph-1 element major); each overlapping
//! remembers the last pair it added and only extends with strictly later
//! pairs whose two elements are both still free, so every overlapping is
//! produced exactly once.
//!
//! Matching two edges induces equivalences on their attached nodes.
//! Compatibility of a pair requires equal labels, equal attached-node
//! types, and consistency with the node equivalences accumulated so far.
//! An edge overlapping is *valid* when every edge outside the intersection
//! touches intersection nodes only where the counterpart node is external
//! in the other graph; otherwise applying one rule would delete a node the
//! other rule still needs.

use std::collections::{BTreeMap, BTreeSet};

use crate::heap::Heap;
use crate::nonterminal::SelectorLabel;
use crate::types::{EdgeId, NodeId};

/// An edge-layer element: a selector (identified by source node and label)
/// or a nonterminal hyperedge.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum EdgeElement {
    Selector(NodeId, SelectorLabel),
    Hyperedge(EdgeId),
}

impl EdgeElement {
    /// The nodes an edge element touches, in a fixed order (source before
    /// target; tentacles by position).
    pub fn attached_nodes(&self, heap: &Heap) -> Vec<NodeId> {
        match self {
            EdgeElement::Selector(source, label) => {
                let target = heap
                    .selector_target(*source, label)
                    .expect("selector element exists in its heap");
                vec![*source, target]
            }
            EdgeElement::Hyperedge(edge) => heap.tentacles(*edge).to_vec(),
        }
    }
}

/// The two right-hand sides an overlapping is built over, with their element
/// lists in enumeration order.
#[derive(Debug)]
pub struct OverlapContext<'a> {
    pub hc1: &'a Heap,
    pub hc2: &'a Heap,
    edges1: Vec<EdgeElement>,
    edges2: Vec<EdgeElement>,
    nodes1: Vec<NodeId>,
    nodes2: Vec<NodeId>,
}

impl<'a> OverlapContext<'a> {
    pub fn new(hc1: &'a Heap, hc2: &'a Heap) -> Self {
        OverlapContext {
            hc1,
            hc2,
            edges1: edge_elements(hc1),
            edges2: edge_elements(hc2),
            nodes1: hc1.node_ids().collect(),
            nodes2: hc2.node_ids().collect(),
        }
    }

    pub fn edges1(&self) -> &[EdgeElement] {
        &self.edges1
    }

    pub fn edges2(&self) -> &[EdgeElement] {
        &self.edges2
    }
}

/// All edge elements of a heap, sorted.
fn edge_elements(heap: &Heap) -> Vec<EdgeElement> {
    let mut elements = Vec::new();
    for node in heap.node_ids() {
        for (label, _) in heap.selectors_of(node) {
            elements.push(EdgeElement::Selector(node, label.clone()));
        }
    }
    for edge in heap.edge_ids() {
        elements.push(EdgeElement::Hyperedge(edge));
    }
    elements.sort();
    elements
}

/// Lexicographic successor over the pair grid, or the first pair when
/// `after` is `None`.
fn next_pair(
    after: Option<(usize, usize)>,
    len1: usize,
    len2: usize,
) -> Option<(usize, usize)> {
    if len1 == 0 || len2 == 0 {
        return None;
    }
    let (mut i, mut j) = match after {
        None => return Some((0, 0)),
        Some((i, j)) => (i, j + 1),
    };
    if j == len2 {
        i += 1;
        j = 0;
    }
    if i == len1 {
        None
    } else {
        Some((i, j))
    }
}

/// The edge layer of an overlapping.
#[derive(Debug, Clone)]
pub struct EdgeOverlapping<'a> {
    ctx: &'a OverlapContext<'a>,
    map1: BTreeMap<usize, usize>,
    map2: BTreeMap<usize, usize>,
    node1: BTreeMap<NodeId, NodeId>,
    node2: BTreeMap<NodeId, NodeId>,
    last: Option<(usize, usize)>,
}

impl<'a> EdgeOverlapping<'a> {
    /// The base overlapping with an empty intersection.
    pub fn base(ctx: &'a OverlapContext<'a>) -> Self {
        EdgeOverlapping {
            ctx,
            map1: BTreeMap::new(),
            map2: BTreeMap::new(),
            node1: BTreeMap::new(),
            node2: BTreeMap::new(),
            last: None,
        }
    }

    pub fn context(&self) -> &'a OverlapContext<'a> {
        self.ctx
    }

    /// Matched edge elements of graph 1 mapped to their partners in graph 2.
    pub fn edge_map(&self) -> BTreeMap<EdgeElement, EdgeElement> {
        self.map1
            .iter()
            .map(|(&i, &j)| (self.ctx.edges1[i].clone(), self.ctx.edges2[j].clone()))
            .collect()
    }

    pub fn node_map(&self) -> &BTreeMap<NodeId, NodeId> {
        &self.node1
    }

    /// The next free equivalence pair strictly after `previous` (or after the
    /// pair this overlapping was created with, when `previous` is `None`).
    /// Freeness is required, compatibility is not checked here.
    pub fn next_equivalence(
        &self,
        previous: Option<(usize, usize)>,
    ) -> Option<(usize, usize)> {
        let mut cursor = previous.or(self.last);
        loop {
            cursor = next_pair(cursor, self.ctx.edges1.len(), self.ctx.edges2.len());
            let (i, j) = cursor?;
            if !self.map1.contains_key(&i) && !self.map2.contains_key(&j) {
                return Some((i, j));
            }
        }
    }

    /// Node equivalences induced by matching the pair, or `None` when the
    /// pair is incompatible.
    fn pair_consequences(&self, i: usize, j: usize) -> Option<Vec<(NodeId, NodeId)>> {
        let e1 = &self.ctx.edges1[i];
        let e2 = &self.ctx.edges2[j];
        let (attached1, attached2) = match (e1, e2) {
            (EdgeElement::Selector(_, l1), EdgeElement::Selector(_, l2)) => {
                if l1 != l2 {
                    return None;
                }
                (e1.attached_nodes(self.ctx.hc1), e2.attached_nodes(self.ctx.hc2))
            }
            (EdgeElement::Hyperedge(a), EdgeElement::Hyperedge(b)) => {
                if self.ctx.hc1.edge_label(*a) != self.ctx.hc2.edge_label(*b) {
                    return None;
                }
                (e1.attached_nodes(self.ctx.hc1), e2.attached_nodes(self.ctx.hc2))
            }
            _ => return None,
        };

        let mut consequences = Vec::new();
        let mut added1: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        let mut added2: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        for (&n1, &n2) in attached1.iter().zip(attached2.iter()) {
            let known1 = self.node1.get(&n1).or_else(|| added1.get(&n1));
            let known2 = self.node2.get(&n2).or_else(|| added2.get(&n2));
            match (known1, known2) {
                (Some(&mapped), _) if mapped != n2 => return None,
                (_, Some(&mapped)) if mapped != n1 => return None,
                (Some(_), Some(_)) => {} // Consistent, already recorded.
                (None, None) => {
                    if self.ctx.hc1.node_type(n1) != self.ctx.hc2.node_type(n2) {
                        return None;
                    }
                    added1.insert(n1, n2);
                    added2.insert(n2, n1);
                    consequences.push((n1, n2));
                }
                // One side mapped consistently, the other unmapped: cannot
                // happen, the maps are kept mutually inverse.
                _ => return None,
            }
        }
        Some(consequences)
    }

    /// The overlapping extended by the pair, or `None` when incompatible.
    pub fn with_pair(&self, i: usize, j: usize) -> Option<EdgeOverlapping<'a>> {
        let consequences = self.pair_consequences(i, j)?;
        let mut extended = self.clone();
        extended.map1.insert(i, j);
        extended.map2.insert(j, i);
        for (n1, n2) in consequences {
            extended.node1.insert(n1, n2);
            extended.node2.insert(n2, n1);
        }
        extended.last = Some((i, j));
        Some(extended)
    }

    /// All compatible immediate extensions of this overlapping.
    pub fn all_next(&self) -> Vec<EdgeOverlapping<'a>> {
        let mut result = Vec::new();
        let mut cursor = None;
        while let Some((i, j)) = self.next_equivalence(cursor) {
            cursor = Some((i, j));
            if let Some(extended) = self.with_pair(i, j) {
                result.push(extended);
            }
        }
        result
    }

    /// Whether this edge overlapping can participate in a joint graph: every
    /// edge outside the intersection may touch an intersection node only if
    /// the node's counterpart is external in the other graph.
    pub fn is_valid(&self) -> bool {
        for (i, element) in self.ctx.edges1.iter().enumerate() {
            if self.map1.contains_key(&i) {
                continue;
            }
            for node in element.attached_nodes(self.ctx.hc1) {
                if let Some(&partner) = self.node1.get(&node) {
                    if !self.ctx.hc2.is_external(partner) {
                        return false;
                    }
                }
            }
        }
        for (j, element) in self.ctx.edges2.iter().enumerate() {
            if self.map2.contains_key(&j) {
                continue;
            }
            for node in element.attached_nodes(self.ctx.hc2) {
                if let Some(&partner) = self.node2.get(&node) {
                    if !self.ctx.hc1.is_external(partner) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Depth-first enumeration of every edge overlapping reachable from the
    /// base, base included.
    pub fn enumerate(ctx: &'a OverlapContext<'a>) -> Vec<EdgeOverlapping<'a>> {
        let mut result = Vec::new();
        let mut pending = vec![EdgeOverlapping::base(ctx)];
        while let Some(current) = pending.pop() {
            pending.extend(current.all_next());
            result.push(current);
        }
        result
    }
}

/// The node layer: extends the node equivalences induced by a valid edge
/// overlapping with additional node pairs.
#[derive(Debug, Clone)]
pub struct NodeOverlapping<'a> {
    ctx: &'a OverlapContext<'a>,
    edge_map: BTreeMap<EdgeElement, EdgeElement>,
    node1: BTreeMap<NodeId, NodeId>,
    node2: BTreeMap<NodeId, NodeId>,
    /// Nodes touched by an edge outside the intersection, per graph.
    dangling1: BTreeSet<NodeId>,
    dangling2: BTreeSet<NodeId>,
    last: Option<(usize, usize)>,
}

impl<'a> NodeOverlapping<'a> {
    /// The node-layer base induced by an edge overlapping.
    pub fn base(edges: &EdgeOverlapping<'a>) -> Self {
        let ctx = edges.ctx;
        let edge_map = edges.edge_map();
        let matched2: BTreeSet<&EdgeElement> = edge_map.values().collect();

        let mut dangling1 = BTreeSet::new();
        for element in &ctx.edges1 {
            if !edge_map.contains_key(element) {
                dangling1.extend(element.attached_nodes(ctx.hc1));
            }
        }
        let mut dangling2 = BTreeSet::new();
        for element in &ctx.edges2 {
            if !matched2.contains(element) {
                dangling2.extend(element.attached_nodes(ctx.hc2));
            }
        }

        NodeOverlapping {
            ctx,
            edge_map,
            node1: edges.node1.clone(),
            node2: edges.node2.clone(),
            dangling1,
            dangling2,
            last: None,
        }
    }

    pub fn context(&self) -> &'a OverlapContext<'a> {
        self.ctx
    }

    pub fn edge_map(&self) -> &BTreeMap<EdgeElement, EdgeElement> {
        &self.edge_map
    }

    pub fn node_map(&self) -> &BTreeMap<NodeId, NodeId> {
        &self.node1
    }

    fn next_equivalence(&self, previous: Option<(usize, usize)>) -> Option<(usize, usize)> {
        let mut cursor = previous.or(self.last);
        loop {
            cursor = next_pair(cursor, self.ctx.nodes1.len(), self.ctx.nodes2.len());
            let (i, j) = cursor?;
            if !self.node1.contains_key(&self.ctx.nodes1[i])
                && !self.node2.contains_key(&self.ctx.nodes2[j])
            {
                return Some((i, j));
            }
        }
    }

    fn pair_compatible(&self, i: usize, j: usize) -> bool {
        let n1 = self.ctx.nodes1[i];
        let n2 = self.ctx.nodes2[j];
        if self.ctx.hc1.node_type(n1) != self.ctx.hc2.node_type(n2) {
            return false;
        }
        // Identifying the nodes puts them into the intersection; edges
        // outside the intersection may then only touch them where the
        // counterpart is external.
        if self.dangling1.contains(&n1) && !self.ctx.hc2.is_external(n2) {
            return false;
        }
        if self.dangling2.contains(&n2) && !self.ctx.hc1.is_external(n1) {
            return false;
        }
        true
    }

    pub fn with_pair(&self, i: usize, j: usize) -> Option<NodeOverlapping<'a>> {
        if !self.pair_compatible(i, j) {
            return None;
        }
        let mut extended = self.clone();
        extended.node1.insert(self.ctx.nodes1[i], self.ctx.nodes2[j]);
        extended.node2.insert(self.ctx.nodes2[j], self.ctx.nodes1[i]);
        extended.last = Some((i, j));
        Some(extended)
    }

    pub fn all_next(&self) -> Vec<NodeOverlapping<'a>> {
        let mut result = Vec::new();
        let mut cursor = None;
        while let Some((i, j)) = self.next_equivalence(cursor) {
            cursor = Some((i, j));
            if let Some(extended) = self.with_pair(i, j) {
                result.push(extended);
            }
        }
        result
    }

    /// Two rule applications are independent when they share no edge (both
    /// applications delete their matched edges, so a shared edge is always a
    /// conflict) and every shared node is external on both sides. Independent
    /// overlappings are not critical.
    pub fn is_independent(&self) -> bool {
        self.edge_map.is_empty()
            && self
                .node1
                .iter()
                .all(|(&n1, &n2)| self.ctx.hc1.is_external(n1) && self.ctx.hc2.is_external(n2))
    }

    /// Whether gluing along this overlapping keeps selectors functional: if
    /// both of two identified nodes carry a selector with the same label,
    /// those two selectors must themselves be in the intersection (otherwise
    /// the joint node would carry the label twice).
    pub fn selectors_functional(&self) -> bool {
        for (&n1, &n2) in &self.node1 {
            for (label, _) in self.ctx.hc1.selectors_of(n1) {
                if self.ctx.hc2.selector_target(n2, label).is_some()
                    && !self
                        .edge_map
                        .contains_key(&EdgeElement::Selector(n1, label.clone()))
                {
                    return false;
                }
            }
        }
        true
    }

    /// Depth-first enumeration of every node overlapping over a valid edge
    /// overlapping, the induced base included.
    pub fn enumerate(edges: &EdgeOverlapping<'a>) -> Vec<NodeOverlapping<'a>> {
        let mut result = Vec::new();
        let mut pending = vec![NodeOverlapping::base(edges)];
        while let Some(current) = pending.pop() {
            pending.extend(current.all_next());
            result.push(current);
        }
        result
    }
}
