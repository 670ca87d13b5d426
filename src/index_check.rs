//! Reconciling index stacks across an embedding.
//!
//! Embedding search matches nonterminal edges up to their index stacks; this
//! module decides whether the stacks can be made equal, and if so which
//! *materializations* (abstract symbol -> concrete sequence, applied to the
//! target graph) and which *instantiation* (stack variable -> sequence,
//! applied to the pattern) achieve that.
//!
//! [`IndexMatcher`] unifies one stack pair; [`EmbeddingIndexChecker`] walks
//! every matched edge pair of an embedding, accumulates the required
//! substitutions while keeping them globally consistent, applies them, and
//! re-verifies the result.

use std::collections::BTreeMap;

use log::{debug, error};
use thiserror::Error;

use crate::heap::Heap;
use crate::index::{Index, IndexSymbol, MaterializationRuleProvider};
use crate::morphism::Embedding;
use crate::nonterminal::Nonterminal;

/// Index stacks of matched edges cannot be reconciled. Recovered locally by
/// canonicalization, which simply tries the next candidate matching.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum MatchError {
    #[error("index stacks cannot be matched")]
    CannotMatch,
}

/// A materialization was required for an abstract symbol the provider has no
/// rule for. This is a data inconsistency between grammar and materializer;
/// it is logged and the offending materialization is skipped.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum MaterializeError {
    #[error("no materialization rule for abstract symbol `{0}`")]
    NoRule(String),
}

/// What one stack pair demands to become equal.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct IndexMatch {
    /// Materialization `symbol -> expansion` to apply to the target graph.
    pub materialization: Option<(String, Vec<IndexSymbol>)>,
    /// Sequence the pattern's stack variable must be instantiated with.
    pub instantiation: Option<Vec<IndexSymbol>>,
}

/// Positional unification of one (target, pattern) stack pair.
pub struct IndexMatcher;

impl IndexMatcher {
    /// Unify `materializable` (a target stack, whose trailing abstract symbol
    /// may be expanded) with `instantiable` (a pattern stack, whose trailing
    /// variable may be substituted).
    pub fn unify(materializable: &Index, instantiable: &Index) -> Result<IndexMatch, MatchError> {
        let target = materializable.symbols();
        let pattern = instantiable.symbols();
        let mut i = 0;
        loop {
            match (target.get(i), pattern.get(i)) {
                (None, None) => return Ok(IndexMatch::default()),
                (Some(IndexSymbol::Variable), Some(IndexSymbol::Variable)) => {
                    return Ok(IndexMatch::default());
                }
                (rest, Some(IndexSymbol::Variable)) => {
                    // The pattern variable absorbs the remaining target
                    // suffix (possibly empty).
                    debug_assert!(i + 1 == pattern.len());
                    let suffix: Vec<IndexSymbol> = match rest {
                        Some(_) => target[i..].to_vec(),
                        None => Vec::new(),
                    };
                    return Ok(IndexMatch {
                        materialization: None,
                        instantiation: if suffix.is_empty() { None } else { Some(suffix) },
                    });
                }
                (Some(IndexSymbol::Abstract(symbol)), rest) => {
                    debug_assert!(i + 1 == target.len());
                    return Self::materialize_for(symbol, rest.map(|_| &pattern[i..]));
                }
                (Some(IndexSymbol::Concrete(a)), Some(IndexSymbol::Concrete(b))) if a == b => {
                    i += 1;
                }
                _ => return Err(MatchError::CannotMatch),
            }
        }
    }

    /// The target stack ends in an abstract symbol; compute the
    /// materialization that makes it equal to the remaining pattern suffix.
    fn materialize_for(
        symbol: &str,
        pattern_rest: Option<&[IndexSymbol]>,
    ) -> Result<IndexMatch, MatchError> {
        let Some(rest) = pattern_rest else {
            // The pattern is exhausted but the target still has its abstract
            // symbol: nothing can shorten the target.
            return Err(MatchError::CannotMatch);
        };
        match rest.last() {
            Some(IndexSymbol::Variable) => {
                if rest.len() == 1 {
                    // Bare variable against the abstract symbol: the variable
                    // absorbs it, no materialization needed.
                    Ok(IndexMatch {
                        materialization: None,
                        instantiation: Some(vec![IndexSymbol::abstracted(symbol)]),
                    })
                } else {
                    // The abstract symbol expands by the concrete part of the
                    // suffix and stays abstract at the end; the variable then
                    // absorbs exactly that symbol.
                    let mut expansion = rest[..rest.len() - 1].to_vec();
                    expansion.push(IndexSymbol::abstracted(symbol));
                    Ok(IndexMatch {
                        materialization: Some((symbol.to_string(), expansion)),
                        instantiation: Some(vec![IndexSymbol::abstracted(symbol)]),
                    })
                }
            }
            Some(_) => Ok(IndexMatch {
                materialization: Some((symbol.to_string(), rest.to_vec())),
                instantiation: None,
            }),
            None => Err(MatchError::CannotMatch),
        }
    }
}

/// Result of a successful index reconciliation: the materialized target
/// graph, the instantiated pattern graph, and the left-hand-side nonterminal
/// extended by the instantiation.
#[derive(Debug)]
pub struct IndexEmbeddingResult {
    pub heap: Heap,
    pub pattern: Heap,
    pub lhs: Nonterminal,
}

/// Walks all matched nonterminal-edge pairs of an embedding and reconciles
/// their stacks.
pub struct EmbeddingIndexChecker<'a> {
    provider: &'a dyn MaterializationRuleProvider,
}

impl<'a> EmbeddingIndexChecker<'a> {
    pub fn new(provider: &'a dyn MaterializationRuleProvider) -> Self {
        EmbeddingIndexChecker { provider }
    }

    pub fn check(
        &self,
        target: &Heap,
        pattern: &Heap,
        embedding: &Embedding,
        lhs: &Nonterminal,
    ) -> Result<IndexEmbeddingResult, MatchError> {
        let mut materializations: BTreeMap<String, Vec<IndexSymbol>> = BTreeMap::new();
        let mut instantiation: Vec<IndexSymbol> = Vec::new();

        for (pattern_edge, target_edge) in embedding.edge_pairs() {
            let pattern_label = pattern.edge_label(pattern_edge);
            let target_label = target.edge_label(target_edge);
            let (Some(pattern_index), Some(target_index)) =
                (pattern_label.index(), target_label.index())
            else {
                continue;
            };

            let materializable = apply_materializations(target_index, &materializations);
            let instantiable = apply_instantiation(pattern_index, &instantiation);

            let outcome = IndexMatcher::unify(&materializable, &instantiable)?;
            if let Some((symbol, expansion)) = outcome.materialization {
                debug!("index matching learned {} -> {:?}", symbol, expansion);
                update_materializations(&mut materializations, &symbol, &expansion);
                materialize_in(&mut instantiation, &symbol, &expansion);
            }
            if let Some(required) = outcome.instantiation {
                if instantiation.is_empty() {
                    instantiation = required;
                } else if instantiation != required {
                    return Err(MatchError::CannotMatch);
                }
            }
        }

        let mut heap = target.clone();
        for (symbol, expansion) in &materializations {
            match self.try_materialize(&mut heap, symbol, expansion) {
                Ok(()) => {}
                Err(e) => error!("materialization after index matching failed: {}", e),
            }
        }
        let mut pattern = pattern.clone();
        if !instantiation.is_empty() {
            pattern.instantiate_index(&instantiation);
        }
        let lhs = match lhs.index() {
            Some(index) if index.ends_with_variable() && !instantiation.is_empty() => {
                lhs.with_prolonged_index(&instantiation)
            }
            _ => lhs.clone(),
        };

        // Guard against order-dependent corner cases in the incremental
        // accumulation above: after substitution, every matched pair must
        // match exactly.
        for (pattern_edge, target_edge) in embedding.edge_pairs() {
            let (Some(pattern_index), Some(target_index)) = (
                pattern.edge_label(pattern_edge).index(),
                heap.edge_label(target_edge).index(),
            ) else {
                continue;
            };
            if !target_index.matches(pattern_index) {
                return Err(MatchError::CannotMatch);
            }
        }

        Ok(IndexEmbeddingResult { heap, pattern, lhs })
    }

    fn try_materialize(
        &self,
        heap: &mut Heap,
        symbol: &str,
        expansion: &[IndexSymbol],
    ) -> Result<(), MaterializeError> {
        if !self.provider.can_materialize(symbol, expansion) {
            return Err(MaterializeError::NoRule(symbol.to_string()));
        }
        heap.materialize_index(symbol, expansion);
        Ok(())
    }
}

/// Apply the recorded materialization for the stack's last symbol, if any.
fn apply_materializations(index: &Index, materializations: &BTreeMap<String, Vec<IndexSymbol>>) -> Index {
    if let Some(IndexSymbol::Abstract(symbol)) = index.last() {
        if let Some(expansion) = materializations.get(symbol) {
            return index.with_prolonged(expansion);
        }
    }
    index.clone()
}

/// Apply the current instantiation to a variable-ended stack.
fn apply_instantiation(index: &Index, instantiation: &[IndexSymbol]) -> Index {
    if index.ends_with_variable() && !instantiation.is_empty() {
        index.with_prolonged(instantiation)
    } else {
        index.clone()
    }
}

/// Record a newly learned materialization, propagating it into every
/// previously recorded expansion first so that all recorded rules stay
/// expressed in terms of the newest knowledge.
fn update_materializations(
    materializations: &mut BTreeMap<String, Vec<IndexSymbol>>,
    symbol: &str,
    expansion: &[IndexSymbol],
) {
    for recorded in materializations.values_mut() {
        materialize_in(recorded, symbol, expansion);
    }
    if !materializations.contains_key(symbol) {
        materializations.insert(symbol.to_string(), expansion.to_vec());
    }
}

/// Rewrite `stack` with the rule `symbol -> expansion` when its last element
/// is exactly that abstract symbol; otherwise leave it alone.
fn materialize_in(stack: &mut Vec<IndexSymbol>, symbol: &str, expansion: &[IndexSymbol]) {
    let applies = matches!(stack.last(), Some(IndexSymbol::Abstract(name)) if name == symbol);
    if applies {
        stack.pop();
        stack.extend_from_slice(expansion);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::index::PermissiveMaterialization;
    use crate::nonterminal::{NodeType, SelectorLabel};
    use crate::types::{EdgeId, NodeId};

    fn symbols(names: &[&str]) -> Vec<IndexSymbol> {
        names.iter()
            .map(|s| match *s {
                "()" => IndexSymbol::Variable,
                name if name.chars().next().unwrap().is_uppercase() => {
                    IndexSymbol::abstracted(name)
                }
                name => IndexSymbol::concrete(name),
            })
            .collect()
    }

    fn index(names: &[&str]) -> Index {
        Index::new(symbols(names))
    }

    #[test]
    fn test_unify_equal() {
        let outcome = IndexMatcher::unify(&index(&["s", "s", "z"]), &index(&["s", "s", "z"])).unwrap();
        assert_eq!(outcome, IndexMatch::default());
    }

    #[test]
    fn test_unify_materialization() {
        // Target ssX against pattern sssz: X -> sz.
        let outcome = IndexMatcher::unify(&index(&["s", "s", "X"]), &index(&["s", "s", "s", "z"])).unwrap();
        assert_eq!(
            outcome.materialization,
            Some(("X".to_string(), symbols(&["s", "z"])))
        );
        assert_eq!(outcome.instantiation, None);
    }

    #[test]
    fn test_unify_instantiation() {
        // Target ssz against pattern s(): () -> sz.
        let outcome = IndexMatcher::unify(&index(&["s", "s", "z"]), &index(&["s", "()"])).unwrap();
        assert_eq!(outcome.materialization, None);
        assert_eq!(outcome.instantiation, Some(symbols(&["s", "z"])));
    }

    #[test]
    fn test_unify_materialization_and_instantiation() {
        // Target sX against pattern s s (): X -> sX and () -> X.
        let outcome = IndexMatcher::unify(&index(&["s", "X"]), &index(&["s", "s", "()"])).unwrap();
        assert_eq!(
            outcome.materialization,
            Some(("X".to_string(), symbols(&["s", "X"])))
        );
        assert_eq!(outcome.instantiation, Some(symbols(&["X"])));
    }

    #[test]
    fn test_unify_mismatch() {
        assert_eq!(
            IndexMatcher::unify(&index(&["s", "z"]), &index(&["z"])),
            Err(MatchError::CannotMatch)
        );
        assert_eq!(
            IndexMatcher::unify(&index(&["s", "s", "X"]), &index(&["s", "z"])),
            Err(MatchError::CannotMatch)
        );
        assert_eq!(
            IndexMatcher::unify(&index(&["s", "X"]), &index(&["s"])),
            Err(MatchError::CannotMatch)
        );
    }

    // -- Checker tests over whole heaps --------------------------------------

    fn ty() -> NodeType {
        NodeType::new("node")
    }

    fn indexed_nt(label: &str, stack: &[&str]) -> Nonterminal {
        Nonterminal::indexed(label, 2, vec![false, false], index(stack))
    }

    /// Two external nodes with a selector plus one indexed edge (the shape of
    /// an indexed rule right-hand side).
    fn heap_with_stack(label: &str, stack: &[&str], external: bool) -> Heap {
        let mut heap = Heap::new();
        let nodes = heap.add_nodes(&ty(), 2);
        heap.add_selector(nodes[0], SelectorLabel::new("label"), nodes[1]);
        if external {
            heap.set_external(nodes[0]);
            heap.set_external(nodes[1]);
        }
        heap.add_edge(indexed_nt(label, stack), vec![nodes[0], nodes[1]]);
        heap
    }

    /// The identity embedding between two equally-built heaps.
    fn identity_embedding(pattern: &Heap) -> Embedding {
        let node_map: BTreeMap<NodeId, NodeId> =
            pattern.node_ids().map(|n| (n, n)).collect();
        let edge_map: BTreeMap<EdgeId, EdgeId> =
            pattern.edge_ids().map(|e| (e, e)).collect();
        Embedding::new(node_map, edge_map)
    }

    #[test]
    fn test_identical_stacks_leave_graphs_unchanged() {
        let target = heap_with_stack("B", &["s", "s", "z"], false);
        let pattern = heap_with_stack("B", &["s", "s", "z"], true);
        let lhs = indexed_nt("B", &["s", "s", "z"]);

        let checker = EmbeddingIndexChecker::new(&PermissiveMaterialization);
        let result = checker
            .check(&target, &pattern, &identity_embedding(&pattern), &lhs)
            .unwrap();
        assert_eq!(result.heap, target);
        assert_eq!(result.lhs, lhs);
    }

    #[test]
    fn test_materialization_rewrites_every_stack() {
        // The target has a matched edge with stack ssX and an unmatched
        // reference edge with stack (s other X); materializing X -> z must
        // rewrite both.
        let mut target = Heap::new();
        let nodes = target.add_nodes(&ty(), 4);
        target.add_selector(nodes[0], SelectorLabel::new("label"), nodes[1]);
        target.add_edge(indexed_nt("B", &["s", "s", "X"]), vec![nodes[0], nodes[1]]);
        target.add_edge(indexed_nt("R", &["s", "other", "X"]), vec![nodes[2], nodes[3]]);

        let pattern = heap_with_stack("B", &["s", "s", "z"], true);
        let lhs = indexed_nt("B", &["s", "s", "z"]);

        // The pattern's only edge matches the target's first edge.
        let node_map: BTreeMap<NodeId, NodeId> = pattern
            .node_ids()
            .zip(target.node_ids())
            .collect();
        let edge_map: BTreeMap<EdgeId, EdgeId> = pattern
            .edge_ids()
            .zip(target.edge_ids())
            .collect();
        let embedding = Embedding::new(node_map, edge_map);

        let checker = EmbeddingIndexChecker::new(&PermissiveMaterialization);
        let result = checker.check(&target, &pattern, &embedding, &lhs).unwrap();

        let edges: Vec<EdgeId> = result.heap.edge_ids().collect();
        assert_eq!(
            result.heap.edge_label(edges[0]).index().unwrap(),
            &index(&["s", "s", "z"])
        );
        assert_eq!(
            result.heap.edge_label(edges[1]).index().unwrap(),
            &index(&["s", "other", "z"])
        );
    }

    #[test]
    fn test_materialization_example_sssz() {
        // Target stack ssX, pattern stack ss·sz: matching materializes
        // X -> sz and the target stack becomes exactly sssz.
        let target = heap_with_stack("B", &["s", "s", "X"], false);
        let pattern = heap_with_stack("B", &["s", "s", "s", "z"], true);
        let lhs = indexed_nt("B", &["s", "s", "s", "z"]);

        let checker = EmbeddingIndexChecker::new(&PermissiveMaterialization);
        let result = checker
            .check(&target, &pattern, &identity_embedding(&pattern), &lhs)
            .unwrap();
        let edge = result.heap.edge_ids().next().unwrap();
        assert_eq!(
            result.heap.edge_label(edge).index().unwrap(),
            &index(&["s", "s", "s", "z"])
        );
    }

    #[test]
    fn test_different_abstract_symbols_materialize_independently() {
        // Two matched edges: ssX against ssz, and ssY against ssc. X and Y
        // must not interfere.
        let mut target = Heap::new();
        let nodes = target.add_nodes(&ty(), 2);
        target.add_selector(nodes[0], SelectorLabel::new("label"), nodes[1]);
        target.add_edge(indexed_nt("B", &["s", "s", "X"]), vec![nodes[0], nodes[1]]);
        target.add_edge(indexed_nt("C", &["s", "s", "Y"]), vec![nodes[0], nodes[1]]);

        let mut pattern = Heap::new();
        let nodes = pattern.add_nodes(&ty(), 2);
        pattern.add_selector(nodes[0], SelectorLabel::new("label"), nodes[1]);
        pattern.set_external(nodes[0]);
        pattern.set_external(nodes[1]);
        pattern.add_edge(indexed_nt("B", &["s", "s", "z"]), vec![nodes[0], nodes[1]]);
        pattern.add_edge(indexed_nt("C", &["s", "s", "c"]), vec![nodes[0], nodes[1]]);

        let lhs = indexed_nt("B", &["s", "s", "z"]);
        let checker = EmbeddingIndexChecker::new(&PermissiveMaterialization);
        let result = checker
            .check(&target, &pattern, &identity_embedding(&pattern), &lhs)
            .unwrap();

        let edges: Vec<EdgeId> = result.heap.edge_ids().collect();
        assert_eq!(
            result.heap.edge_label(edges[0]).index().unwrap(),
            &index(&["s", "s", "z"])
        );
        assert_eq!(
            result.heap.edge_label(edges[1]).index().unwrap(),
            &index(&["s", "s", "c"])
        );
    }

    #[test]
    fn test_conflicting_instantiations_cannot_match() {
        // Two matched edges require different instantiations of the same
        // variable: s() against ssz, and s() against szz.
        let mut target = Heap::new();
        let nodes = target.add_nodes(&ty(), 2);
        target.add_edge(indexed_nt("B", &["s", "s", "z"]), vec![nodes[0], nodes[1]]);
        target.add_edge(indexed_nt("C", &["s", "z", "z"]), vec![nodes[0], nodes[1]]);

        let mut pattern = Heap::new();
        let nodes = pattern.add_nodes(&ty(), 2);
        pattern.set_external(nodes[0]);
        pattern.set_external(nodes[1]);
        pattern.add_edge(indexed_nt("B", &["s", "()"]), vec![nodes[0], nodes[1]]);
        pattern.add_edge(indexed_nt("C", &["s", "()"]), vec![nodes[0], nodes[1]]);

        let lhs = indexed_nt("B", &["s", "()"]);
        let checker = EmbeddingIndexChecker::new(&PermissiveMaterialization);
        let result = checker.check(&target, &pattern, &identity_embedding(&pattern), &lhs);
        assert_eq!(result.unwrap_err(), MatchError::CannotMatch);
    }

    #[test]
    fn test_lhs_is_prolonged_by_instantiation() {
        let target = heap_with_stack("B", &["s", "s", "z"], false);
        let pattern = heap_with_stack("B", &["s", "()"], true);
        let lhs = indexed_nt("B", &["()"]);

        let checker = EmbeddingIndexChecker::new(&PermissiveMaterialization);
        let result = checker
            .check(&target, &pattern, &identity_embedding(&pattern), &lhs)
            .unwrap();
        assert_eq!(result.lhs.index().unwrap(), &index(&["s", "z"]));
        // The pattern's variable was instantiated the same way.
        let edge = result.pattern.edge_ids().next().unwrap();
        assert_eq!(
            result.pattern.edge_label(edge).index().unwrap(),
            &index(&["s", "s", "z"])
        );
    }
}
