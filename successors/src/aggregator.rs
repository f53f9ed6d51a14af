//! Deduplicated successor addresses, shared by every execution state.

use crate::address::Address;
use crate::path::PathId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Bucket a successor is recorded under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetKey {
    /// The single bucket used when execution is not directed.
    Global,
    Path(PathId),
}

pub type Targets = BTreeMap<TargetKey, BTreeSet<Address>>;

#[derive(Debug, Default)]
pub struct TargetAggregator {
    targets: Mutex<Targets>,
}

impl TargetAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `values` into the set of `key` and return the resulting set.
    /// No bucket is created for an empty `values`.
    /// The lock is held only for the insertion.
    pub fn record<I>(&self, key: TargetKey, values: I) -> BTreeSet<Address>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut values = values.into_iter().map(Address).peekable();
        let mut targets = self.lock();
        if values.peek().is_none() {
            return targets.get(&key).cloned().unwrap_or_default();
        }
        let set = targets.entry(key).or_default();
        set.extend(values);
        set.clone()
    }

    pub fn get(&self, key: TargetKey) -> Option<BTreeSet<Address>> {
        self.lock().get(&key).cloned()
    }

    /// A copy of every bucket.
    pub fn snapshot(&self) -> Targets {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Targets> {
        // a panicking recorder cannot leave a half-inserted set behind
        self.targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
