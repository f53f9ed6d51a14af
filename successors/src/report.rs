use crate::address::{self, Address};
use crate::aggregator::{TargetKey, Targets};
use crate::path::{PathId, PathSet};
use std::collections::BTreeSet;
use std::fmt;

/// Successors of a single instruction over every explored state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndirectedReport {
    pub address: Address,
    pub targets: BTreeSet<Address>,
}

impl fmt::Display for UndirectedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.targets.is_empty() {
            write!(f, "No successors found for the instruction at {}", self.address)
        } else {
            write!(
                f,
                "Determined that the instruction at {} can jump to the following addresses: {}",
                self.address,
                address::join(&self.targets)
            )
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathOutcome {
    Feasible(BTreeSet<Address>),
    /// No state ever retired the whole path.
    Infeasible,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathReport {
    pub id: PathId,
    pub len: usize,
    pub last_address: Address,
    pub outcome: PathOutcome,
}

impl fmt::Display for PathReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PathOutcome::Feasible(targets) => write!(
                f,
                "Path {}[len={}] ending with {} has the following successors {}",
                self.id,
                self.len,
                self.last_address,
                address::join(targets)
            ),
            PathOutcome::Infeasible => write!(f, "Path {}[len={}] is infeasible", self.id, self.len),
        }
    }
}

/// Per-path successors, shortest path first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectedReport {
    pub paths: Vec<PathReport>,
}

impl DirectedReport {
    pub fn new(paths: &PathSet, targets: &Targets) -> Self {
        let paths = paths
            .sorted_by_len()
            .into_iter()
            .map(|path| PathReport {
                id: path.id(),
                len: path.len(),
                last_address: path.last_address(),
                outcome: match targets.get(&TargetKey::Path(path.id())) {
                    Some(found) => PathOutcome::Feasible(found.clone()),
                    None => PathOutcome::Infeasible,
                },
            })
            .collect();
        DirectedReport { paths }
    }

    pub fn get(&self, id: PathId) -> Option<&PathReport> {
        self.paths.iter().find(|p| p.id == id)
    }
}

impl fmt::Display for DirectedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--Results Sorted by Pathlen--")?;
        for path in &self.paths {
            writeln!(f, "{}", path)?;
        }
        Ok(())
    }
}
