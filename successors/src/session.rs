//! State shared by every plugin callback of one run.

use crate::address::Address;
use crate::aggregator::TargetAggregator;
use crate::engine::StateId;
use crate::path::{PathId, PathSet};
use crate::tracker::{PathTracker, Step};
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Owns the candidate paths, the discovered targets and one `PathTracker`
/// per live execution state.
#[derive(Debug, Default)]
pub struct RunSession {
    paths: PathSet,
    targets: TargetAggregator,
    trackers: Mutex<HashMap<StateId, PathTracker>>,
}

impl RunSession {
    pub fn new(paths: PathSet) -> Self {
        RunSession {
            paths,
            targets: TargetAggregator::new(),
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// A session without candidate paths.
    pub fn undirected() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    pub fn targets(&self) -> &TargetAggregator {
        &self.targets
    }

    /// Feed the instruction about to execute at `pc` to the tracker of
    /// `state`, creating the tracker on first use. Abandoned states lose
    /// their tracker.
    pub fn advance(&self, state: StateId, pc: Address) -> Step {
        let mut trackers = self.trackers();
        let tracker = trackers
            .entry(state)
            .or_insert_with(|| PathTracker::new(&self.paths));
        let step = tracker.step(&self.paths, pc);
        match &step {
            Step::Continue { .. } => {
                trace!(
                    "state {} at {}: keeping {}",
                    state,
                    pc,
                    tracker
                        .candidates()
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                );
            }
            Step::Abandon => {
                debug!(
                    "abandoning state {} with RIP={} step={}",
                    state,
                    pc,
                    tracker.step_counter().unwrap_or_default()
                );
                trackers.remove(&state);
            }
        }
        step
    }

    /// Paths `state` completed with its latest instruction.
    pub fn take_completed(&self, state: StateId) -> Vec<PathId> {
        self.trackers()
            .get_mut(&state)
            .map(PathTracker::take_completed)
            .unwrap_or_default()
    }

    /// A forked state continues with a copy of its parent's progress.
    pub fn fork(&self, parent: StateId, child: StateId) {
        let mut trackers = self.trackers();
        if let Some(tracker) = trackers.get(&parent).cloned() {
            trackers.insert(child, tracker);
        }
    }

    pub fn release(&self, state: StateId) {
        self.trackers().remove(&state);
    }

    /// Number of states currently holding a tracker.
    pub fn tracked_states(&self) -> usize {
        self.trackers().len()
    }

    fn trackers(&self) -> MutexGuard<'_, HashMap<StateId, PathTracker>> {
        self.trackers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn session() -> RunSession {
        RunSession::new(PathSet::from_raw(vec![vec![0x10, 0x11], vec![0x10, 0x12]]).unwrap())
    }

    #[test]
    fn lazy_tracker_and_release() {
        let session = session();
        assert_eq!(session.tracked_states(), 0);
        assert_eq!(
            session.advance(0, Address(0x10)),
            Step::Continue { completed: vec![] }
        );
        assert_eq!(session.tracked_states(), 1);
        session.release(0);
        assert_eq!(session.tracked_states(), 0);
    }

    #[test]
    fn abandon_drops_tracker() {
        let session = session();
        session.advance(0, Address(0x10));
        assert_eq!(session.advance(0, Address(0x99)), Step::Abandon);
        assert_eq!(session.tracked_states(), 0);
    }

    #[test]
    fn fork_copies_progress() {
        let session = session();
        session.advance(0, Address(0x10));
        session.fork(0, 1);
        assert_eq!(
            session.advance(0, Address(0x11)),
            Step::Continue { completed: vec![0] }
        );
        assert_eq!(
            session.advance(1, Address(0x12)),
            Step::Continue { completed: vec![1] }
        );
        assert_eq!(session.take_completed(0), vec![0]);
        assert_eq!(session.take_completed(1), vec![1]);
        assert!(session.take_completed(1).is_empty());
        assert!(session.take_completed(7).is_empty());
    }
}
