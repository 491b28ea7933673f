use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, PoisonError};

/// Receives the branch identifiers reached by each replay.
///
/// Adding an identifier that is already known must be a no-op, so workers can
/// forward every delta without deduplicating first.
pub trait CoverageSink: Send + Sync {
    /// Records `branches` and returns the total number of distinct branches covered.
    fn add_all(&self, branches: BTreeSet<String>) -> usize;

    fn size(&self) -> usize;

    fn covers(&self, branch: &str) -> bool;
}

/// In-memory coverage record shared by every worker.
#[derive(Debug, Default)]
pub struct CoverageSet {
    branches: Mutex<HashSet<String>>,
}

impl CoverageSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CoverageSink for CoverageSet {
    fn add_all(&self, branches: BTreeSet<String>) -> usize {
        let mut covered = self.branches.lock().unwrap_or_else(PoisonError::into_inner);
        covered.extend(branches);
        covered.len()
    }

    fn size(&self) -> usize {
        self.branches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn covers(&self, branch: &str) -> bool {
        self.branches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(branch)
    }
}
