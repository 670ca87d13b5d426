//! Partial morphism state for the backtracking search.

use super::graph::ElementGraph;
use super::Morphism;

/// A partial injective map from pattern elements to target elements, plus
/// the candidate computation the search tree is built from.
///
/// Pairs are added and removed in stack discipline by the search; the state
/// itself is a flat structure so that entering and leaving a search-tree
/// branch is O(1).
pub struct State<'g> {
    pattern: &'g ElementGraph,
    target: &'g ElementGraph,
    core_pattern: Vec<Option<usize>>,
    core_target: Vec<Option<usize>>,
    matched: usize,
}

impl<'g> State<'g> {
    pub fn new(pattern: &'g ElementGraph, target: &'g ElementGraph) -> Self {
        State {
            pattern,
            target,
            core_pattern: vec![None; pattern.size()],
            core_target: vec![None; target.size()],
            matched: 0,
        }
    }

    pub fn pattern(&self) -> &'g ElementGraph {
        self.pattern
    }

    pub fn target(&self) -> &'g ElementGraph {
        self.target
    }

    pub fn pattern_image(&self, p: usize) -> Option<usize> {
        self.core_pattern[p]
    }

    pub fn target_preimage(&self, t: usize) -> Option<usize> {
        self.core_target[t]
    }

    pub fn pair(&mut self, p: usize, t: usize) {
        assert!(self.core_pattern[p].is_none(), "pattern element already matched");
        assert!(self.core_target[t].is_none(), "target element already matched");
        self.core_pattern[p] = Some(t);
        self.core_target[t] = Some(p);
        self.matched += 1;
    }

    pub fn unpair(&mut self, p: usize, t: usize) {
        assert_eq!(self.core_pattern[p], Some(t), "unpairing a pair that was never added");
        self.core_pattern[p] = None;
        self.core_target[t] = None;
        self.matched -= 1;
    }

    pub fn is_complete(&self) -> bool {
        self.matched == self.pattern.size()
    }

    /// Candidate pairs for extending the partial morphism.
    ///
    /// One pattern element is selected per search level: the smallest
    /// unmatched element adjacent to the matched part, so consecutive levels
    /// grow a connected region and every morphism is produced exactly once.
    /// Its candidate targets are the unmatched target elements adjacent to
    /// the matched image. When no unmatched pattern element touches the
    /// matched part (initially, or for a disconnected pattern), the smallest
    /// unmatched pattern element is paired with every unmatched target
    /// element.
    ///
    /// Returns `None` when the morphism is complete.
    pub fn candidates(&self) -> Option<(usize, Vec<usize>)> {
        if self.is_complete() {
            return None;
        }

        let frontier = (0..self.pattern.size())
            .filter(|&p| self.core_pattern[p].is_none())
            .find(|&p| self.touches_matched_pattern(p));

        if let Some(p) = frontier {
            let targets = (0..self.target.size())
                .filter(|&t| self.core_target[t].is_none())
                .filter(|&t| self.touches_matched_target(t))
                .collect();
            Some((p, targets))
        } else {
            let p = (0..self.pattern.size())
                .find(|&p| self.core_pattern[p].is_none())
                .expect("incomplete state has an unmatched pattern element");
            let targets = (0..self.target.size())
                .filter(|&t| self.core_target[t].is_none())
                .collect();
            Some((p, targets))
        }
    }

    fn touches_matched_pattern(&self, p: usize) -> bool {
        self.pattern
            .successors(p)
            .iter()
            .chain(self.pattern.predecessors(p))
            .any(|(other, _)| self.core_pattern[*other].is_some())
    }

    fn touches_matched_target(&self, t: usize) -> bool {
        self.target
            .successors(t)
            .iter()
            .chain(self.target.predecessors(t))
            .any(|(other, _)| self.core_target[*other].is_some())
    }

    /// Extract the completed morphism.
    pub fn morphism(&self) -> Morphism {
        assert!(self.is_complete(), "morphism extracted from an incomplete state");
        Morphism::new(
            self.core_pattern
                .iter()
                .map(|image| image.expect("complete state maps every element"))
                .collect(),
        )
    }
}
