//! The backtracking morphism search.
//!
//! The search tree is traversed iteratively with an explicit frame stack: a
//! frame owns the candidate targets for one pattern element and remembers
//! which pair it was entered through, so leaving a branch is a pop plus one
//! `unpair`. The iterator is lazy and restartable: each call to `next`
//! resumes the traversal where the previous morphism was yielded and runs
//! until the next complete morphism or exhaustion.
//!
//! The search space is finite (partial morphisms only grow, bounded by the
//! target size); the worst case is exponential, which is acceptable for the
//! bounded configuration graphs this crate operates on.

use log::trace;

use super::feasibility::FeasibilityPredicate;
use super::state::State;
use super::Morphism;

struct Frame {
    /// The pair that was applied to enter this frame; `None` for the root.
    entered_via: Option<(usize, usize)>,
    /// The pattern element this frame extends the morphism with.
    p: usize,
    targets: Vec<usize>,
    next: usize,
}

pub struct MorphismSearch<'g> {
    state: State<'g>,
    predicates: Vec<Box<dyn FeasibilityPredicate>>,
    require_equal_size: bool,
    stack: Vec<Frame>,
    started: bool,
    exhausted: bool,
}

impl<'g> MorphismSearch<'g> {
    pub(super) fn new(
        state: State<'g>,
        predicates: Vec<Box<dyn FeasibilityPredicate>>,
        require_equal_size: bool,
    ) -> Self {
        MorphismSearch {
            state,
            predicates,
            require_equal_size,
            stack: Vec::new(),
            started: false,
            exhausted: false,
        }
    }

    fn is_feasible(&self, p: usize, t: usize) -> bool {
        self.predicates.iter().all(|f| f.eval(&self.state, p, t))
    }

    /// Push a frame for the next pattern element; `false` when the new level
    /// has no candidate targets (a dead end).
    fn push_frame(&mut self, entered_via: Option<(usize, usize)>) -> bool {
        let (p, targets) = self
            .state
            .candidates()
            .expect("complete states are handled before descending");
        if targets.is_empty() {
            return false;
        }
        trace!("descend: element {} with {} candidate targets", p, targets.len());
        self.stack.push(Frame {
            entered_via,
            p,
            targets,
            next: 0,
        });
        true
    }
}

impl Iterator for MorphismSearch<'_> {
    type Item = Morphism;

    fn next(&mut self) -> Option<Morphism> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            let pattern_size = self.state.pattern().size();
            let target_size = self.state.target().size();
            if target_size < pattern_size
                || (self.require_equal_size && pattern_size != target_size)
            {
                self.exhausted = true;
                return None;
            }
            if pattern_size == 0 {
                self.exhausted = true;
                return Some(Morphism::empty());
            }
            if !self.push_frame(None) {
                self.exhausted = true;
                return None;
            }
        }

        loop {
            let Some(frame) = self.stack.last_mut() else {
                self.exhausted = true;
                return None;
            };
            let p = frame.p;
            match frame.targets.get(frame.next).copied() {
                None => {
                    // All candidates tried: backtrack one level.
                    let frame = self.stack.pop().expect("frame is present");
                    if let Some((p, t)) = frame.entered_via {
                        self.state.unpair(p, t);
                    }
                }
                Some(t) => {
                    frame.next += 1;
                    if !self.is_feasible(p, t) {
                        continue;
                    }
                    self.state.pair(p, t);
                    if self.state.is_complete() {
                        let morphism = self.state.morphism();
                        self.state.unpair(p, t);
                        return Some(morphism);
                    }
                    if !self.push_frame(Some((p, t))) {
                        self.state.unpair(p, t);
                    }
                }
            }
        }
    }
}
