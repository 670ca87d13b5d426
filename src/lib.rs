//! # hrg-rs: Hyperedge Replacement Grammar abstraction in Rust
//!
//! **`hrg-rs`** is a library for shape analysis over heap-like graphs: it
//! abstracts concrete heaps into bounded-size *configuration graphs* using a
//! hyperedge-replacement graph grammar, and it certifies that the
//! abstraction is well-defined (order-independent) before it is used for
//! verification.
//!
//! ## What is a configuration graph?
//!
//! A typed hypergraph modeling a heap shape: nodes are heap objects,
//! labeled binary *selector* edges are pointer fields, and *nonterminal*
//! hyperedges stand for whole abstracted subgraphs (a list segment, a
//! balanced tree, ...). A subset of nodes is marked *external*; they are the
//! interface along which a nonterminal edge can be replaced by a grammar
//! right-hand side, or a right-hand side folded back into a nonterminal.
//!
//! ## Core components
//!
//! - **[`heap`]**: the configuration graph, arena-indexed with stable ids
//!   under a clone-then-mutate discipline.
//! - **[`morphism`]**: backtracking subgraph-embedding and isomorphism
//!   search with pluggable feasibility predicates.
//! - **[`index`] / [`index_check`]**: pushdown-style index stacks on
//!   nonterminals, and the matcher that materializes and instantiates them
//!   so an embedding becomes exact.
//! - **[`grammar`]**: numbered grammar rules, including the automatically
//!   derived collapsed variants with merged external nodes.
//! - **[`canonicalize`]**: repeated folding of a graph into its most
//!   abstract form; never fails, returns the input unchanged when no rule
//!   applies.
//! - **[`confluence`]**: critical-pair enumeration and joinability
//!   classification over all overlapping rule applications, plus a greedy
//!   completion search that repairs non-confluent grammars.
//!
//! ## Basic usage
//!
//! ```rust
//! use hrg_rs::heap::Heap;
//! use hrg_rs::nonterminal::{NodeType, Nonterminal, SelectorLabel};
//! use hrg_rs::grammar::NamedGrammar;
//! use hrg_rs::canonicalize::CanonicalizationStrategy;
//! use hrg_rs::confluence::{CriticalPairFinder, Joinability};
//! use hrg_rs::index::PermissiveMaterialization;
//!
//! // L -> (ext) -next-> (ext)
//! let list = Nonterminal::plain("L", 2, vec![false, true]);
//! let ty = NodeType::new("node");
//! let mut rhs = Heap::new();
//! let nodes = rhs.add_nodes(&ty, 2);
//! rhs.add_selector(nodes[0], SelectorLabel::new("next"), nodes[1]);
//! rhs.set_external(nodes[0]);
//! rhs.set_external(nodes[1]);
//!
//! let grammar = NamedGrammar::new("list", vec![(list, vec![rhs])]);
//!
//! // Certify that rule order cannot change abstraction results.
//! let finder = CriticalPairFinder::new(&grammar, &PermissiveMaterialization);
//! assert_eq!(finder.joinability(), Joinability::StronglyJoinable);
//!
//! // Abstract a two-node heap into a single nonterminal edge.
//! let mut heap = Heap::new();
//! let nodes = heap.add_nodes(&ty, 2);
//! heap.add_selector(nodes[0], SelectorLabel::new("next"), nodes[1]);
//! let strategy = CanonicalizationStrategy::new(&grammar, &PermissiveMaterialization);
//! let canonical = strategy.canonicalize(&heap);
//! assert_eq!(canonical.edge_count(), 1);
//! assert_eq!(canonical.selector_count(), 0);
//! ```

pub mod canonicalize;
pub mod confluence;
pub mod grammar;
pub mod heap;
pub mod index;
pub mod index_check;
pub mod morphism;
pub mod nonterminal;
pub mod types;
