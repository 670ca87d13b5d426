//! Confluence analysis: critical pairs and grammar-wide joinability.
//!
//! Canonicalization applies rules in an arbitrary order. The analysis here
//! certifies when that order cannot matter: it enumerates every *critical
//! pair*, a joint graph built from two overlapping rule applications, then
//! applies both rules, canonicalizes both results, and compares them.
//!
//! A pair is **strongly joinable** when the two canonical results are
//! isomorphic via the track morphism (the isomorphism fixes every node that
//! survived in both), **weakly joinable** when they are isomorphic at all,
//! and **not joinable** otherwise. The grammar-wide verdict is the minimum
//! over all critical pairs.
//!
//! The enumeration follows Lambers, Ehrig and Orejas, "Efficient Detection
//! of Conflicts in Graph-based Model Transformation".

pub mod completion;
pub mod joint;
pub mod overlapping;

use std::collections::BTreeSet;

use log::{debug, info};

use crate::canonicalize::{AbstractionCache, CanonicalizationStrategy};
use crate::grammar::{NamedGrammar, RuleId};
use crate::heap::Heap;
use crate::index::MaterializationRuleProvider;
use crate::morphism::isomorphic;
use crate::types::NodeId;
use joint::JointHeap;
use overlapping::{EdgeOverlapping, NodeOverlapping, OverlapContext};

/// How well two overlapping rule applications rejoin, worst first.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Joinability {
    NotJoinable,
    WeaklyJoinable,
    StronglyJoinable,
}

impl Joinability {
    /// The collective verdict of two results (the worse of the two).
    pub fn combine(self, other: Joinability) -> Joinability {
        self.min(other)
    }
}

/// A joint graph together with the two rules that produced it, both
/// canonicalization results, and the joinability verdict.
#[derive(Debug, Clone)]
pub struct CriticalPair {
    pub rule1: RuleId,
    pub rule2: RuleId,
    pub joint: JointHeap,
    pub canonical1: Heap,
    pub canonical2: Heap,
    pub joinability: Joinability,
}

/// Computes the critical pairs of a grammar on construction.
pub struct CriticalPairFinder {
    critical_pairs: Vec<CriticalPair>,
    joinability: Joinability,
}

impl CriticalPairFinder {
    pub fn new(grammar: &NamedGrammar, provider: &dyn MaterializationRuleProvider) -> Self {
        let strategy = CanonicalizationStrategy::new(grammar, provider);
        let mut cache = AbstractionCache::new();
        let mut critical_pairs = Vec::new();

        let ids = grammar.all_rule_ids();
        for (i, &rule1) in ids.iter().enumerate() {
            for &rule2 in &ids[i..] {
                collect_critical_pairs(
                    grammar,
                    &strategy,
                    &mut cache,
                    rule1,
                    rule2,
                    &mut critical_pairs,
                );
            }
        }

        let joinability = critical_pairs
            .iter()
            .fold(Joinability::StronglyJoinable, |acc, pair| {
                acc.combine(pair.joinability)
            });
        info!(
            "grammar `{}`: {} critical pairs, joinability {:?}",
            grammar.name(),
            critical_pairs.len(),
            joinability
        );
        CriticalPairFinder {
            critical_pairs,
            joinability,
        }
    }

    pub fn critical_pairs(&self) -> &[CriticalPair] {
        &self.critical_pairs
    }

    /// The grammar-wide verdict: the minimum over all critical pairs
    /// (strongly joinable when there are none).
    pub fn joinability(&self) -> Joinability {
        self.joinability
    }

    /// The critical pairs that are at most as joinable as `max`; with
    /// `Joinability::WeaklyJoinable` this is the set of problematic pairs.
    pub fn pairs_with_max_joinability(&self, max: Joinability) -> Vec<&CriticalPair> {
        self.critical_pairs
            .iter()
            .filter(|pair| pair.joinability <= max)
            .collect()
    }
}

fn collect_critical_pairs(
    grammar: &NamedGrammar,
    strategy: &CanonicalizationStrategy<'_>,
    cache: &mut AbstractionCache,
    rule1: RuleId,
    rule2: RuleId,
    critical_pairs: &mut Vec<CriticalPair>,
) {
    let r1 = grammar.rule(rule1);
    let r2 = grammar.rule(rule2);
    let ctx = OverlapContext::new(r1.rhs, r2.rhs);

    for edges in EdgeOverlapping::enumerate(&ctx) {
        if !edges.is_valid() {
            continue;
        }
        for nodes in NodeOverlapping::enumerate(&edges) {
            if nodes.is_independent() || !nodes.selectors_functional() {
                continue;
            }
            let joint = JointHeap::new(&nodes);
            let applied1 =
                joint
                    .heap
                    .replace_matching(r1.rhs, &joint.embedding1, r1.nonterminal, r1.ext_map);
            let applied2 =
                joint
                    .heap
                    .replace_matching(r2.rhs, &joint.embedding2, r2.nonterminal, r2.ext_map);
            let canonical1 = strategy.canonicalize_with_cache(&applied1, cache);
            let canonical2 = strategy.canonicalize_with_cache(&applied2, cache);
            let joinability = classify(&canonical1, &canonical2);
            debug!(
                "critical pair ({}, {}): {:?}",
                grammar.rule_identifier(rule1),
                grammar.rule_identifier(rule2),
                joinability
            );
            critical_pairs.push(CriticalPair {
                rule1,
                rule2,
                joint,
                canonical1,
                canonical2,
                joinability,
            });
        }
    }
}

/// Classify how the two canonical results rejoin.
///
/// The track morphism fixes the nodes that survived in both results: those
/// shared public ids are marked external, in ascending id order, in copies
/// of both graphs. An isomorphism between the marked copies must then map
/// every shared node onto itself, certifying strong joinability. Otherwise
/// any isomorphism between the unmarked graphs is weak joinability.
fn classify(canonical1: &Heap, canonical2: &Heap) -> Joinability {
    let ids1: BTreeSet<NodeId> = canonical1.node_ids().collect();
    let ids2: BTreeSet<NodeId> = canonical2.node_ids().collect();

    let mut track1 = canonical1.clone();
    let mut track2 = canonical2.clone();
    for &node in ids1.intersection(&ids2) {
        track1.set_external(node);
        track2.set_external(node);
    }

    if isomorphic(&track1, &track2) {
        Joinability::StronglyJoinable
    } else if isomorphic(canonical1, canonical2) {
        Joinability::WeaklyJoinable
    } else {
        Joinability::NotJoinable
    }
}
