//! Grammar completion: greedy repair of non-confluent grammars.
//!
//! A completion *heuristic* proposes grammar mutations from a current state;
//! a *loss* function scores states by how far they are from confluence. The
//! greedy driver applies one heuristic as long as it keeps improving the
//! loss, then moves to the next, and cycles as long as any heuristic makes
//! progress. A state without problematic critical pairs wins immediately;
//! otherwise the search stops at the step bound or when a full cycle brings
//! no improvement, returning the best state found. Heuristics and the loss
//! are injected, not hard-coded.

use std::collections::BTreeSet;

use log::{debug, info};

use super::{CriticalPair, CriticalPairFinder, Joinability};
use crate::grammar::NamedGrammar;
use crate::heap::Heap;
use crate::index::MaterializationRuleProvider;
use crate::nonterminal::Nonterminal;

/// A grammar with its recomputed problematic critical pairs.
#[derive(Debug, Clone)]
pub struct CompletionState {
    pub grammar: NamedGrammar,
    /// Critical pairs that are at most weakly joinable.
    pub critical_pairs: Vec<CriticalPair>,
}

impl CompletionState {
    pub fn new(grammar: NamedGrammar, provider: &dyn MaterializationRuleProvider) -> Self {
        let finder = CriticalPairFinder::new(&grammar, provider);
        let critical_pairs = finder
            .pairs_with_max_joinability(Joinability::WeaklyJoinable)
            .into_iter()
            .cloned()
            .collect();
        CompletionState {
            grammar,
            critical_pairs,
        }
    }

    pub fn is_confluent(&self) -> bool {
        self.critical_pairs.is_empty()
    }
}

/// Proposes all immediate successor states reachable by one mutation.
pub trait CompletionHeuristic {
    fn name(&self) -> &str;

    fn successors(
        &self,
        state: &CompletionState,
        provider: &dyn MaterializationRuleProvider,
    ) -> Vec<CompletionState>;
}

/// Scores a completion state; lower is better.
pub trait CompletionLoss {
    fn loss(&self, state: &CompletionState) -> f64;
}

/// Loss = number of problematic critical pairs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CriticalPairCountLoss;

impl CompletionLoss for CriticalPairCountLoss {
    fn loss(&self, state: &CompletionState) -> f64 {
        state.critical_pairs.len() as f64
    }
}

/// Propose dropping each original rule that participates in a problematic
/// critical pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveRuleHeuristic;

impl CompletionHeuristic for RemoveRuleHeuristic {
    fn name(&self) -> &str {
        "remove-rule"
    }

    fn successors(
        &self,
        state: &CompletionState,
        provider: &dyn MaterializationRuleProvider,
    ) -> Vec<CompletionState> {
        let mut involved: BTreeSet<usize> = BTreeSet::new();
        for pair in &state.critical_pairs {
            involved.insert(pair.rule1.original);
            involved.insert(pair.rule2.original);
        }
        involved
            .into_iter()
            .map(|original| {
                CompletionState::new(state.grammar.without_original_rule(original), provider)
            })
            .collect()
    }
}

/// When one canonical result of a problematic pair is a single-nonterminal
/// handle, propose adding a rule from that nonterminal to the other
/// canonical result, closing the pair directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddHandleRuleHeuristic;

impl AddHandleRuleHeuristic {
    /// A handle: one hyperedge, no selectors, and exactly its (distinct)
    /// attached nodes. Returns the label and the tentacle nodes.
    fn as_handle(heap: &Heap) -> Option<(Nonterminal, Vec<crate::types::NodeId>)> {
        if heap.edge_count() != 1 || heap.selector_count() != 0 || heap.external_count() != 0 {
            return None;
        }
        let edge = heap.edge_ids().next().expect("one edge exists");
        let tentacles = heap.tentacles(edge).to_vec();
        let distinct: BTreeSet<_> = tentacles.iter().collect();
        if distinct.len() != tentacles.len() || heap.node_count() != tentacles.len() {
            return None;
        }
        Some((heap.edge_label(edge).clone(), tentacles))
    }

    /// Turn `other` into a right-hand side for the handle's nonterminal by
    /// marking the handle's tentacle nodes external in tentacle order.
    fn proposed_rhs(tentacles: &[crate::types::NodeId], other: &Heap) -> Option<Heap> {
        if other.external_count() != 0 {
            return None;
        }
        if !tentacles.iter().all(|&node| other.contains_node(node)) {
            return None;
        }
        let mut rhs = other.clone();
        for &node in tentacles {
            rhs.set_external(node);
        }
        Some(rhs)
    }
}

impl CompletionHeuristic for AddHandleRuleHeuristic {
    fn name(&self) -> &str {
        "add-handle-rule"
    }

    fn successors(
        &self,
        state: &CompletionState,
        provider: &dyn MaterializationRuleProvider,
    ) -> Vec<CompletionState> {
        let mut result = Vec::new();
        for pair in &state.critical_pairs {
            let candidates = [
                (&pair.canonical1, &pair.canonical2),
                (&pair.canonical2, &pair.canonical1),
            ];
            for (handle_side, other_side) in candidates {
                let Some((label, tentacles)) = Self::as_handle(handle_side) else {
                    continue;
                };
                let Some(rhs) = Self::proposed_rhs(&tentacles, other_side) else {
                    continue;
                };
                debug!("proposing completion rule {} -> |{} nodes|", label, rhs.node_count());
                result.push(CompletionState::new(
                    state.grammar.with_added_rule(label, rhs),
                    provider,
                ));
            }
        }
        result
    }
}

/// Greedy completion, bounded by a maximum number of accepted steps
/// (`max_steps == 0` means unbounded).
#[derive(Debug, Clone, Copy)]
pub struct GreedyCompletion {
    max_steps: usize,
}

impl GreedyCompletion {
    pub fn new(max_steps: usize) -> Self {
        GreedyCompletion { max_steps }
    }

    pub fn run(
        &self,
        grammar: NamedGrammar,
        heuristics: &[Box<dyn CompletionHeuristic>],
        loss: &dyn CompletionLoss,
        provider: &dyn MaterializationRuleProvider,
    ) -> CompletionState {
        let mut current = CompletionState::new(grammar, provider);
        if current.is_confluent() {
            return current;
        }
        let mut current_loss = loss.loss(&current);
        let mut steps = 0;
        let mut made_progress = true;

        // Cycle through all heuristics as long as any makes progress.
        while made_progress {
            made_progress = false;
            for heuristic in heuristics {
                let mut applied = true;
                while applied {
                    applied = false;
                    for next in heuristic.successors(&current, provider) {
                        if next.is_confluent() {
                            info!("completion: `{}` reached confluence", heuristic.name());
                            return next;
                        }
                        let next_loss = loss.loss(&next);
                        if next_loss < current_loss {
                            debug!(
                                "completion: `{}` improved loss {} -> {}",
                                heuristic.name(),
                                current_loss,
                                next_loss
                            );
                            current = next;
                            current_loss = next_loss;
                            // Retry the same heuristic from the new state,
                            // and cycle through all heuristics again later.
                            applied = true;
                            made_progress = true;
                            steps += 1;
                            if self.max_steps != 0 && steps >= self.max_steps {
                                return current;
                            }
                            break;
                        }
                    }
                }
            }
        }
        current
    }
}
