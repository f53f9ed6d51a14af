//! Per-state narrowing of candidate paths.

use crate::address::Address;
use crate::path::{PathId, PathSet};
use log::trace;

/// Outcome of feeding one retired instruction to a `PathTracker`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// At least one path still matches. `completed` holds the paths whose
    /// final instruction was just retired.
    Continue { completed: Vec<PathId> },
    /// No candidate matches anymore; the state has to be dropped.
    Abandon,
}

#[derive(Clone, Debug)]
pub struct PathTracker {
    counter: Option<usize>, // index of the last retired instruction
    candidates: Vec<PathId>,
    completed: Vec<PathId>,
    abandoned: bool,
}

impl PathTracker {
    /// Every path starts at the same entry instruction, so all of them are
    /// candidates initially.
    pub fn new(paths: &PathSet) -> Self {
        PathTracker {
            counter: None,
            candidates: paths.ids().collect(),
            completed: Vec::new(),
            abandoned: false,
        }
    }

    pub fn step_counter(&self) -> Option<usize> {
        self.counter
    }

    pub fn candidates(&self) -> &[PathId] {
        &self.candidates
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Advance by one instruction whose pre-execution address is `pc`.
    pub fn step(&mut self, paths: &PathSet, pc: Address) -> Step {
        if self.abandoned {
            return Step::Abandon;
        }
        let index = self.counter.map_or(0, |c| c + 1);
        self.counter = Some(index);

        let mut kept = Vec::with_capacity(self.candidates.len());
        for &id in &self.candidates {
            let Some(path) = paths.get(id) else {
                continue;
            };
            match path.get(index) {
                Some(expected) if expected == pc => kept.push(id),
                Some(_) => {}
                // ran past its end: expected termination, not divergence
                None => trace!("path {} exhausted at step {}", id, index),
            }
        }
        self.candidates = kept;

        if self.candidates.is_empty() {
            self.abandoned = true;
            self.completed.clear();
            return Step::Abandon;
        }
        self.completed = self
            .candidates
            .iter()
            .copied()
            .filter(|&id| paths.get(id).is_some_and(|p| p.len() == index + 1))
            .collect();
        Step::Continue {
            completed: self.completed.clone(),
        }
    }

    /// Paths completed by the latest step; cleared by this call.
    pub fn take_completed(&mut self) -> Vec<PathId> {
        std::mem::take(&mut self.completed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const A: u64 = 0x1000;
    const B: u64 = 0x1002;
    const C: u64 = 0x1004;
    const D: u64 = 0x1006;
    const E: u64 = 0x1008;

    fn run(tracker: &mut PathTracker, paths: &PathSet, trace: &[u64]) -> Vec<Step> {
        trace
            .iter()
            .map(|&pc| tracker.step(paths, Address(pc)))
            .collect()
    }

    #[test]
    fn divergence_abandons_at_third_step() {
        let paths = PathSet::from_raw(vec![vec![A, B, C], vec![A, B, D]]).unwrap();
        let mut tracker = PathTracker::new(&paths);
        assert_eq!(tracker.step_counter(), None);

        tracker.step(&paths, Address(A));
        assert_eq!(tracker.candidates(), &[0, 1]);
        tracker.step(&paths, Address(B));
        assert_eq!(tracker.candidates(), &[0, 1]);
        assert!(!tracker.is_abandoned());

        assert_eq!(tracker.step(&paths, Address(E)), Step::Abandon);
        assert!(tracker.candidates().is_empty());
        assert!(tracker.is_abandoned());
        assert_eq!(tracker.step_counter(), Some(2));
    }

    #[test]
    fn completion_is_signalled_only_for_matching_path() {
        let paths = PathSet::from_raw(vec![vec![A, B, C], vec![A, B, D]]).unwrap();
        let mut tracker = PathTracker::new(&paths);
        let steps = run(&mut tracker, &paths, &[A, B, C]);
        assert_eq!(
            steps,
            vec![
                Step::Continue { completed: vec![] },
                Step::Continue { completed: vec![] },
                Step::Continue { completed: vec![0] },
            ]
        );
        assert!(!tracker.is_abandoned());
        assert_eq!(tracker.take_completed(), vec![0]);
        assert!(tracker.take_completed().is_empty());
    }

    #[test]
    fn exhausted_path_is_dropped_without_abandoning() {
        let paths = PathSet::from_raw(vec![vec![A, B], vec![A, B, C, D]]).unwrap();
        let mut tracker = PathTracker::new(&paths);
        let steps = run(&mut tracker, &paths, &[A, B, C, D]);
        assert_eq!(steps[1], Step::Continue { completed: vec![0] });
        assert_eq!(steps[2], Step::Continue { completed: vec![] });
        assert_eq!(tracker.candidates(), &[1]);
        assert_eq!(steps[3], Step::Continue { completed: vec![1] });
        assert!(!tracker.is_abandoned());
    }

    #[test]
    fn running_past_every_path_abandons() {
        let paths = PathSet::from_raw(vec![vec![A]]).unwrap();
        let mut tracker = PathTracker::new(&paths);
        assert_eq!(
            tracker.step(&paths, Address(A)),
            Step::Continue { completed: vec![0] }
        );
        assert_eq!(tracker.step(&paths, Address(B)), Step::Abandon);
        assert_eq!(tracker.step(&paths, Address(C)), Step::Abandon);
    }

    #[test]
    fn same_path_twice_completes_both() {
        let paths = PathSet::from_raw(vec![vec![A, B], vec![A, B]]).unwrap();
        let mut tracker = PathTracker::new(&paths);
        let steps = run(&mut tracker, &paths, &[A, B]);
        assert_eq!(steps[1], Step::Continue { completed: vec![0, 1] });
    }

    #[test]
    fn clones_are_independent() {
        let paths = PathSet::from_raw(vec![vec![A, B], vec![A, C]]).unwrap();
        let mut parent = PathTracker::new(&paths);
        parent.step(&paths, Address(A));
        let mut child = parent.clone();
        parent.step(&paths, Address(B));
        child.step(&paths, Address(C));
        assert_eq!(parent.candidates(), &[0]);
        assert_eq!(child.candidates(), &[1]);
    }
}
