//! Canonicalization: repeated folding of a configuration graph into its most
//! abstract form.
//!
//! For every rule of the grammar, the strategy searches for an embedding of
//! the rule's right-hand side; the first embedding whose index stacks can be
//! reconciled is folded into a single nonterminal edge, and the procedure
//! restarts on the result. The graph is canonical when no rule matches
//! anywhere. Rule and matching order are a deliberate source of
//! non-determinism; the confluence analysis certifies when that is
//! harmless.
//!
//! `canonicalize` never fails: a graph without matches is returned
//! unchanged, and stack mismatches simply skip to the next candidate.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use log::debug;

use crate::grammar::{NamedGrammar, RuleId};
use crate::heap::Heap;
use crate::index::MaterializationRuleProvider;
use crate::index_check::{EmbeddingIndexChecker, MatchError};
use crate::morphism::graph::ElementGraph;
use crate::morphism::MatcherBuilder;
use crate::types::NodeId;

/// Explicit per-run cache of canonicalization results.
///
/// The cache is owned by the caller and scoped to one canonicalization or
/// confluence run; it must be dropped (or a fresh one created) whenever the
/// grammar changes, since entries are only valid for the grammar they were
/// computed under.
#[derive(Debug, Default)]
pub struct AbstractionCache {
    map: HashMap<Heap, Heap>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl AbstractionCache {
    pub fn new() -> Self {
        AbstractionCache::default()
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    fn get(&self, heap: &Heap) -> Option<&Heap> {
        match self.map.get(heap) {
            Some(found) => {
                self.hits.set(self.hits.get() + 1);
                Some(found)
            }
            None => {
                self.misses.set(self.misses.get() + 1);
                None
            }
        }
    }

    fn insert(&mut self, heap: Heap, canonical: Heap) {
        self.map.insert(heap, canonical);
    }
}

/// The canonicalization strategy for one grammar.
pub struct CanonicalizationStrategy<'a> {
    grammar: &'a NamedGrammar,
    provider: &'a dyn MaterializationRuleProvider,
    protected: HashSet<NodeId>,
}

impl<'a> CanonicalizationStrategy<'a> {
    pub fn new(grammar: &'a NamedGrammar, provider: &'a dyn MaterializationRuleProvider) -> Self {
        CanonicalizationStrategy {
            grammar,
            provider,
            protected: HashSet::new(),
        }
    }

    /// Forbid abstracting the given nodes away (constants, marked nodes).
    /// Node ids are stable across folds, so the set stays meaningful for the
    /// whole run.
    pub fn with_protected_nodes(mut self, nodes: HashSet<NodeId>) -> Self {
        self.protected = nodes;
        self
    }

    /// The most-abstract graph reachable from `heap` under the grammar.
    pub fn canonicalize(&self, heap: &Heap) -> Heap {
        let mut current = heap.clone();
        'restart: loop {
            for id in self.grammar.all_rule_ids() {
                if let Some(folded) = self.try_fold(&current, id) {
                    debug!(
                        "folded rule {} of `{}`",
                        self.grammar.rule_identifier(id),
                        self.grammar.name()
                    );
                    current = folded;
                    continue 'restart;
                }
            }
            return current;
        }
    }

    /// Like [`canonicalize`](Self::canonicalize), memoized through an
    /// explicit per-run cache.
    pub fn canonicalize_with_cache(&self, heap: &Heap, cache: &mut AbstractionCache) -> Heap {
        if let Some(found) = cache.get(heap) {
            return found.clone();
        }
        let canonical = self.canonicalize(heap);
        cache.insert(heap.clone(), canonical.clone());
        canonical
    }

    /// Try to fold one rule anywhere in the graph: first embedding for which
    /// the index stacks reconcile wins. `None` when the rule does not apply.
    fn try_fold(&self, heap: &Heap, id: RuleId) -> Option<Heap> {
        let rule = self.grammar.rule(id);
        let pattern_view = ElementGraph::new(rule.rhs);
        let target_view = ElementGraph::new(heap);
        let mut builder = MatcherBuilder::embedding();
        if !self.protected.is_empty() {
            builder = builder.with_protected_targets(self.protected.clone());
        }
        let checker = EmbeddingIndexChecker::new(self.provider);
        for morphism in builder.search(&pattern_view, &target_view) {
            let embedding = morphism.to_embedding(&pattern_view, &target_view);
            match checker.check(heap, rule.rhs, &embedding, rule.nonterminal) {
                Ok(result) => {
                    return Some(result.heap.replace_matching(
                        &result.pattern,
                        &embedding,
                        &result.lhs,
                        rule.ext_map,
                    ));
                }
                // The stacks of this matching are irreconcilable; the next
                // candidate may still work.
                Err(MatchError::CannotMatch) => continue,
            }
        }
        None
    }
}
