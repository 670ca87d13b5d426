//! Grammars with stable, numbered rules.
//!
//! A grammar maps nonterminals to right-hand-side configuration graphs. On
//! ingestion every declared rule becomes an *original* rule, numbered in
//! iteration order, and each original rule derives its *collapsed* variants:
//! copies of the right-hand side in which a legal subset of external nodes
//! has been merged. Collapsed rules let the embedding search find foldings
//! in which several tentacles of the new nonterminal edge attach to the same
//! node.
//!
//! Rule numbering must be reproducible across runs because [`RuleId`]s are
//! used as map keys by the confluence analysis; ingestion therefore takes an
//! ordered collection, not a hash map.

use log::info;

use crate::heap::Heap;
use crate::nonterminal::Nonterminal;

/// Stable identifier of an individual rule: an original rule, or one of its
/// collapsed variants.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RuleId {
    pub original: usize,
    pub collapsed: Option<usize>,
}

impl RuleId {
    pub fn original(index: usize) -> Self {
        RuleId {
            original: index,
            collapsed: None,
        }
    }

    pub fn collapsed(original: usize, collapsed: usize) -> Self {
        RuleId {
            original,
            collapsed: Some(collapsed),
        }
    }
}

/// Borrowed view of one rule.
#[derive(Debug, Copy, Clone)]
pub struct RuleRef<'a> {
    pub nonterminal: &'a Nonterminal,
    pub rhs: &'a Heap,
    /// For a collapsed rule: maps each original external rank to the
    /// collapsed external rank it was merged into.
    pub ext_map: Option<&'a [usize]>,
}

#[derive(Debug, Clone)]
struct CollapsedRule {
    rhs: Heap,
    ext_map: Vec<usize>,
}

#[derive(Debug, Clone)]
struct OriginalRule {
    nonterminal: Nonterminal,
    rhs: Heap,
    collapsed: Vec<CollapsedRule>,
}

/// A named grammar with numbered original and collapsed rules. Immutable
/// once constructed; completion produces new grammars instead of mutating.
#[derive(Debug, Clone)]
pub struct NamedGrammar {
    name: String,
    original_rules: Vec<OriginalRule>,
}

impl NamedGrammar {
    /// Ingest a grammar. Original-rule indices follow the iteration order of
    /// `rules`; collapsed-rule indices follow the order external-node
    /// partitions are produced (lexicographic).
    pub fn new(name: impl Into<String>, rules: Vec<(Nonterminal, Vec<Heap>)>) -> Self {
        let mut original_rules = Vec::new();
        for (nonterminal, right_hand_sides) in rules {
            for rhs in right_hand_sides {
                original_rules.push(derive_rule(nonterminal.clone(), rhs));
            }
        }
        let grammar = NamedGrammar {
            name: name.into(),
            original_rules,
        };
        info!(
            "grammar `{}`: {} original rules, {} rules total",
            grammar.name,
            grammar.original_rule_count(),
            grammar.all_rule_ids().len()
        );
        grammar
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn original_rule_count(&self) -> usize {
        self.original_rules.len()
    }

    pub fn collapsed_rule_count(&self, original: usize) -> usize {
        self.original_rules[original].collapsed.len()
    }

    pub fn rule(&self, id: RuleId) -> RuleRef<'_> {
        let original = &self.original_rules[id.original];
        match id.collapsed {
            None => RuleRef {
                nonterminal: &original.nonterminal,
                rhs: &original.rhs,
                ext_map: None,
            },
            Some(collapsed) => {
                let rule = &original.collapsed[collapsed];
                RuleRef {
                    nonterminal: &original.nonterminal,
                    rhs: &rule.rhs,
                    ext_map: Some(&rule.ext_map),
                }
            }
        }
    }

    /// Every individual rule: each original rule followed by its collapsed
    /// variants, in index order.
    pub fn all_rule_ids(&self) -> Vec<RuleId> {
        let mut ids = Vec::new();
        for (original, rule) in self.original_rules.iter().enumerate() {
            ids.push(RuleId::original(original));
            for collapsed in 0..rule.collapsed.len() {
                ids.push(RuleId::collapsed(original, collapsed));
            }
        }
        ids
    }

    /// Human-readable rule identifier, 1-based: `"3"` or `"3.1"`.
    pub fn rule_identifier(&self, id: RuleId) -> String {
        match id.collapsed {
            None => format!("{}", id.original + 1),
            Some(collapsed) => format!("{}.{}", id.original + 1, collapsed + 1),
        }
    }

    /// A new grammar with one more original rule, appended at the end so
    /// existing rule ids stay valid.
    pub fn with_added_rule(&self, nonterminal: Nonterminal, rhs: Heap) -> NamedGrammar {
        let mut result = self.clone();
        result.original_rules.push(derive_rule(nonterminal, rhs));
        result
    }

    /// A new grammar without the given original rule (and its collapsed
    /// variants). Later original rules shift down by one.
    pub fn without_original_rule(&self, original: usize) -> NamedGrammar {
        let mut result = self.clone();
        result.original_rules.remove(original);
        result
    }

    /// The ingestion view: every original rule as a (nonterminal, rhs) pair.
    pub fn original_rules(&self) -> impl Iterator<Item = (&Nonterminal, &Heap)> + '_ {
        self.original_rules
            .iter()
            .map(|rule| (&rule.nonterminal, &rule.rhs))
    }
}

fn derive_rule(nonterminal: Nonterminal, rhs: Heap) -> OriginalRule {
    assert_eq!(
        rhs.external_count(),
        nonterminal.rank(),
        "external node count of a right-hand side must equal the rank of `{}`",
        nonterminal
    );
    let collapsed = external_merge_partitions(&rhs, &nonterminal)
        .into_iter()
        .map(|ext_map| CollapsedRule {
            rhs: rhs.merge_externals(&ext_map),
            ext_map,
        })
        .collect();
    OriginalRule {
        nonterminal,
        rhs,
        collapsed,
    }
}

/// Enumerate the legal ways to merge external nodes of a right-hand side,
/// in lexicographic order.
///
/// A partition is encoded as a restricted growth string mapping each
/// external rank to a block; all members of a block are identified. A block
/// may only merge externals of equal node type, and at most one member of a
/// block may sit on a non-reduction tentacle (a reduction tentacle can never
/// grow an outgoing selector, so identifying it with another attachment
/// point is harmless). The identity partition is skipped: it is the original
/// rule itself.
fn external_merge_partitions(rhs: &Heap, nonterminal: &Nonterminal) -> Vec<Vec<usize>> {
    let rank = nonterminal.rank();
    let mut result = Vec::new();
    let mut partition = Vec::with_capacity(rank);
    assign_blocks(rhs, nonterminal, rank, &mut partition, &mut result);
    result
}

fn assign_blocks(
    rhs: &Heap,
    nonterminal: &Nonterminal,
    rank: usize,
    partition: &mut Vec<usize>,
    result: &mut Vec<Vec<usize>>,
) {
    let position = partition.len();
    if position == rank {
        let blocks = partition.iter().copied().max().map_or(0, |m| m + 1);
        if blocks < rank {
            result.push(partition.clone());
        }
        return;
    }
    let first_fresh = partition.iter().copied().max().map_or(0, |m| m + 1);
    for block in 0..=first_fresh {
        if block_admits(rhs, nonterminal, partition, block, position) {
            partition.push(block);
            assign_blocks(rhs, nonterminal, rank, partition, result);
            partition.pop();
        }
    }
}

fn block_admits(
    rhs: &Heap,
    nonterminal: &Nonterminal,
    partition: &[usize],
    block: usize,
    position: usize,
) -> bool {
    let ty = rhs.node_type(rhs.externals()[position]);
    let mut non_reduction = usize::from(!nonterminal.is_reduction_tentacle(position));
    for (rank, &assigned) in partition.iter().enumerate() {
        if assigned != block {
            continue;
        }
        if rhs.node_type(rhs.externals()[rank]) != ty {
            return false;
        }
        if !nonterminal.is_reduction_tentacle(rank) {
            non_reduction += 1;
        }
    }
    non_reduction <= 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonterminal::{NodeType, SelectorLabel};

    fn ty() -> NodeType {
        NodeType::new("node")
    }

    /// Rule rhs with `rank` external nodes and no structure between them.
    fn bare_rhs(rank: usize) -> Heap {
        let mut rhs = Heap::new();
        for node in rhs.add_nodes(&ty(), rank) {
            rhs.set_external(node);
        }
        rhs
    }

    #[test]
    fn test_partitions_respect_reduction_flags() {
        let rhs = bare_rhs(2);
        let both_reduction = Nonterminal::plain("L", 2, vec![true, true]);
        assert_eq!(
            external_merge_partitions(&rhs, &both_reduction),
            vec![vec![0, 0]]
        );

        let no_reduction = Nonterminal::plain("L", 2, vec![false, false]);
        assert!(external_merge_partitions(&rhs, &no_reduction).is_empty());

        let one_reduction = Nonterminal::plain("L", 2, vec![false, true]);
        assert_eq!(
            external_merge_partitions(&rhs, &one_reduction),
            vec![vec![0, 0]]
        );
    }

    #[test]
    fn test_partitions_lexicographic_order() {
        let rhs = bare_rhs(3);
        let nonterminal = Nonterminal::plain("T", 3, vec![false, true, true]);
        assert_eq!(
            external_merge_partitions(&rhs, &nonterminal),
            vec![vec![0, 0, 0], vec![0, 0, 1], vec![0, 1, 0], vec![0, 1, 1]]
        );
    }

    #[test]
    fn test_partitions_respect_types() {
        let mut rhs = Heap::new();
        let a = rhs.add_node(NodeType::new("a"));
        let b = rhs.add_node(NodeType::new("b"));
        rhs.set_external(a);
        rhs.set_external(b);
        let nonterminal = Nonterminal::plain("L", 2, vec![true, true]);
        assert!(external_merge_partitions(&rhs, &nonterminal).is_empty());
    }

    #[test]
    fn test_rule_numbering_and_identifiers() {
        let list = Nonterminal::plain("L", 2, vec![false, true]);
        let mut rhs1 = bare_rhs(2);
        let externals: Vec<_> = rhs1.externals().to_vec();
        rhs1.add_selector(externals[0], SelectorLabel::new("next"), externals[1]);
        let rhs2 = {
            let mut rhs = Heap::new();
            let nodes = rhs.add_nodes(&ty(), 3);
            rhs.add_selector(nodes[0], SelectorLabel::new("next"), nodes[1]);
            rhs.set_external(nodes[0]);
            rhs.set_external(nodes[2]);
            rhs.add_edge(list.clone(), vec![nodes[1], nodes[2]]);
            rhs
        };

        let grammar = NamedGrammar::new("list", vec![(list, vec![rhs1, rhs2])]);
        assert_eq!(grammar.original_rule_count(), 2);
        assert_eq!(grammar.collapsed_rule_count(0), 1);
        let ids = grammar.all_rule_ids();
        assert_eq!(ids[0], RuleId::original(0));
        assert_eq!(ids[1], RuleId::collapsed(0, 0));
        assert_eq!(grammar.rule_identifier(ids[1]), "1.1");

        let collapsed = grammar.rule(RuleId::collapsed(0, 0));
        assert_eq!(collapsed.rhs.external_count(), 1);
        assert_eq!(collapsed.ext_map, Some(&[0, 0][..]));
        // The collapsed rhs has a `next` self-loop.
        let external = collapsed.rhs.externals()[0];
        assert_eq!(
            collapsed.rhs.selector_target(external, &SelectorLabel::new("next")),
            Some(external)
        );
    }

    #[test]
    #[should_panic(expected = "external node count")]
    fn test_rank_mismatch_aborts() {
        let nonterminal = Nonterminal::plain("L", 2, vec![false, false]);
        NamedGrammar::new("bad", vec![(nonterminal, vec![bare_rhs(1)])]);
    }
}
