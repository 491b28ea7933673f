use crate::clause::Clause;
use crate::path_condition::PathCondition;
use crate::path_tree::PathTree;
use std::sync::Arc;

/// Decides whether a freshly derived path condition is worth emitting.
///
/// Filters are chained by the worker; a candidate is emitted only if every filter
/// admits it, and later filters only see candidates admitted by earlier ones.
pub trait NoveltyFilter<C: Clause>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `true` if `candidate` should be emitted. `base` is the final path
    /// condition of the task's own replay. A filter may record `candidate` as seen.
    fn admit(&self, candidate: &PathCondition<C>, base: &PathCondition<C>) -> bool;

    /// Forgets `candidate` after it was admitted but could not be emitted.
    fn retract(&self, _candidate: &PathCondition<C>) {}
}

/// Discards successors that only re-derive a prefix of the task's own path.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrefixReplayFilter;

impl<C: Clause> NoveltyFilter<C> for PrefixReplayFilter {
    fn name(&self) -> &'static str {
        "PrefixReplayFilter"
    }

    fn admit(&self, candidate: &PathCondition<C>, base: &PathCondition<C>) -> bool {
        !base.replays_prefix_of(candidate)
    }
}

/// Discards path conditions any worker has already emitted during this run.
#[derive(Debug)]
pub struct PathTreeFilter<C: Clause> {
    tree: Arc<PathTree<C>>,
}

impl<C: Clause> PathTreeFilter<C> {
    pub fn new(tree: Arc<PathTree<C>>) -> Self {
        Self { tree }
    }
}

impl<C: Clause> NoveltyFilter<C> for PathTreeFilter<C> {
    fn name(&self) -> &'static str {
        "PathTreeFilter"
    }

    fn admit(&self, candidate: &PathCondition<C>, _base: &PathCondition<C>) -> bool {
        self.tree.insert_if_absent(candidate.clauses())
    }

    fn retract(&self, candidate: &PathCondition<C>) {
        self.tree.remove_path(candidate.clauses());
    }
}
