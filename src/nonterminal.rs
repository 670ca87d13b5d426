//! Labels of configuration graph elements: node types, selector labels, and
//! nonterminal symbols.

use std::fmt;

use crate::index::{Index, IndexSymbol};

/// The type label of a node (the class of the heap object it models).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeType(String);

impl NodeType {
    pub fn new(name: impl Into<String>) -> Self {
        NodeType(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The label of a selector edge (a pointer field).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SelectorLabel(String);

impl SelectorLabel {
    pub fn new(name: impl Into<String>) -> Self {
        SelectorLabel(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SelectorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A nonterminal symbol of fixed rank, standing for an abstracted subgraph.
///
/// Each tentacle position carries a *reduction* flag: a reduction tentacle is
/// an attachment point at which no derivation of the nonterminal can ever
/// create an outgoing selector. The flags govern which external-node merges
/// are legal when collapsed grammar rules are derived.
///
/// An *indexed* nonterminal additionally owns an [`Index`] stack.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Nonterminal {
    Plain {
        label: String,
        rank: usize,
        reduction_tentacles: Vec<bool>,
    },
    Indexed {
        label: String,
        rank: usize,
        reduction_tentacles: Vec<bool>,
        index: Index,
    },
}

impl Nonterminal {
    pub fn plain(label: impl Into<String>, rank: usize, reduction_tentacles: Vec<bool>) -> Self {
        assert_eq!(
            reduction_tentacles.len(),
            rank,
            "reduction tentacle flags must cover every tentacle"
        );
        Nonterminal::Plain {
            label: label.into(),
            rank,
            reduction_tentacles,
        }
    }

    pub fn indexed(
        label: impl Into<String>,
        rank: usize,
        reduction_tentacles: Vec<bool>,
        index: Index,
    ) -> Self {
        assert_eq!(
            reduction_tentacles.len(),
            rank,
            "reduction tentacle flags must cover every tentacle"
        );
        Nonterminal::Indexed {
            label: label.into(),
            rank,
            reduction_tentacles,
            index,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Nonterminal::Plain { label, .. } | Nonterminal::Indexed { label, .. } => label,
        }
    }

    pub fn rank(&self) -> usize {
        match self {
            Nonterminal::Plain { rank, .. } | Nonterminal::Indexed { rank, .. } => *rank,
        }
    }

    pub fn is_reduction_tentacle(&self, tentacle: usize) -> bool {
        match self {
            Nonterminal::Plain {
                reduction_tentacles, ..
            }
            | Nonterminal::Indexed {
                reduction_tentacles, ..
            } => reduction_tentacles[tentacle],
        }
    }

    pub fn index(&self) -> Option<&Index> {
        match self {
            Nonterminal::Plain { .. } => None,
            Nonterminal::Indexed { index, .. } => Some(index),
        }
    }

    /// Same symbol, different index. Panics on a plain nonterminal.
    pub fn with_index(&self, index: Index) -> Nonterminal {
        match self {
            Nonterminal::Plain { .. } => panic!("cannot attach an index to a plain nonterminal"),
            Nonterminal::Indexed {
                label,
                rank,
                reduction_tentacles,
                ..
            } => Nonterminal::Indexed {
                label: label.clone(),
                rank: *rank,
                reduction_tentacles: reduction_tentacles.clone(),
                index,
            },
        }
    }

    /// Apply a materialization or instantiation to the index, replacing its
    /// last symbol by `tail`.
    pub fn with_prolonged_index(&self, tail: &[IndexSymbol]) -> Nonterminal {
        let index = self
            .index()
            .expect("cannot prolong the index of a plain nonterminal");
        self.with_index(index.with_prolonged(tail))
    }

    /// Label-and-rank equality, ignoring the index.
    ///
    /// This is the compatibility notion used by embedding search: the stacks
    /// of structurally matched edges are reconciled afterwards by the index
    /// matcher.
    pub fn same_symbol(&self, other: &Nonterminal) -> bool {
        self.label() == other.label() && self.rank() == other.rank()
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nonterminal::Plain { label, rank, .. } => write!(f, "{}/{}", label, rank),
            Nonterminal::Indexed {
                label, rank, index, ..
            } => write!(f, "{}[{}]/{}", label, index, rank),
        }
    }
}
