//! The exploration worker.
//!
//! For one task the worker replays the concrete test case symbolically, forwards
//! the coverage it reached, and then re-runs the program diverging at every depth
//! from the task's start depth up to `min(max_depth, final_depth)`. Each successor
//! that survives the novelty filters becomes one [`ExplorationResult`].

use crate::backend::{
    BackendError, DepthExpansion, ExplorationSession, Replay, SymbolicBackend, SymbolicState,
};
use crate::cache::InitialStateCache;
use crate::cancel::CancellationToken;
use crate::coverage::{CoverageSet, CoverageSink};
use crate::novelty::{NoveltyFilter, PathTreeFilter, PrefixReplayFilter};
use crate::path_tree::PathTree;
use crate::result::ExplorationResult;
use crate::task::ExplorationTask;
use crossbeam_channel::Sender;
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

/// Clause type of a backend's states.
pub type ClauseOf<B> = <<B as SymbolicBackend>::State as SymbolicState>::Clause;

#[derive(Error, Debug)]
pub enum ExploreError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The consumer of the result queue went away.
    #[error("result queue is disconnected")]
    ResultQueueClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExploreStatus {
    #[default]
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExploreOutcome {
    pub status: ExploreStatus,
    /// Results pushed to the result queue.
    pub emitted: usize,
    /// Depths whose successors were processed.
    pub depths_explored: usize,
}

pub struct Explorer<B: SymbolicBackend> {
    backend: B,
    max_depth: i64,
    cache: Arc<InitialStateCache<B::State>>,
    coverage: Arc<dyn CoverageSink>,
    filters: Vec<Box<dyn NoveltyFilter<ClauseOf<B>>>>,
    results: Sender<ExplorationResult<B::State>>,
}

impl<B: SymbolicBackend> Explorer<B> {
    /// Creates a worker with a private cache and coverage set and only the local
    /// prefix replay filter.
    pub fn new(backend: B, max_depth: i64, results: Sender<ExplorationResult<B::State>>) -> Self {
        Self {
            backend,
            max_depth,
            cache: Arc::new(InitialStateCache::new()),
            coverage: Arc::new(CoverageSet::new()),
            filters: vec![Box::new(PrefixReplayFilter) as Box<dyn NoveltyFilter<ClauseOf<B>>>],
            results,
        }
    }

    pub fn with_cache(mut self, cache: Arc<InitialStateCache<B::State>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_coverage(mut self, coverage: Arc<dyn CoverageSink>) -> Self {
        self.coverage = coverage;
        self
    }

    /// Skips path conditions already recorded in `tree` by any worker, recording
    /// the ones that get emitted.
    pub fn with_global_dedup(self, tree: Arc<PathTree<ClauseOf<B>>>) -> Self {
        self.with_filter(Box::new(PathTreeFilter::new(tree)))
    }

    /// Appends a filter, applied after the ones already installed.
    pub fn with_filter(mut self, filter: Box<dyn NoveltyFilter<ClauseOf<B>>>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn cache(&self) -> &Arc<InitialStateCache<B::State>> {
        &self.cache
    }

    pub fn coverage(&self) -> &Arc<dyn CoverageSink> {
        &self.coverage
    }

    /// Explores one task, re-running from `start_depth` onwards.
    ///
    /// Returns early with [`ExploreStatus::Cancelled`] if `cancel` is raised; results
    /// already pushed stay in the queue. The backend session is released on
    /// every return path.
    pub fn explore(
        &self,
        task: Arc<ExplorationTask>,
        start_depth: usize,
        cancel: &CancellationToken,
    ) -> Result<ExploreOutcome, ExploreError> {
        let test_case = &task.test_case;
        info!(
            "Exploring test case {} (target {}, start depth {})",
            test_case, task.target, start_depth
        );

        let cached = self.cache.get(&task.target);
        let mut session = self.backend.open(&task, cached)?;

        let Replay {
            final_state,
            initial_state,
        } = session.replay_to_completion()?;
        self.cache.offer(&task.target, &initial_state);
        let final_pc = final_state.path_condition();
        let final_depth = final_state.depth();

        let covered = self.coverage.add_all(session.coverage_delta());
        info!(
            "Run test case {}, path condition {}",
            test_case,
            final_pc.compact()
        );
        info!(
            "Current coverage: {} branch{}",
            covered,
            if covered == 1 { "" } else { "es" }
        );

        let mut outcome = ExploreOutcome::default();
        if self.max_depth <= 0 {
            debug!("Re-exploration disabled (max depth {})", self.max_depth);
            return Ok(outcome);
        }
        let bound = usize::try_from(self.max_depth)
            .unwrap_or(usize::MAX)
            .min(final_depth);

        for depth in start_depth..bound {
            if cancel.is_cancelled() {
                debug!(
                    "Cancelled before re-running test case {} at depth {}",
                    test_case, depth
                );
                outcome.status = ExploreStatus::Cancelled;
                return Ok(outcome);
            }

            let expansion = session.replay_to_depth(depth)?;

            if cancel.is_cancelled() {
                debug!(
                    "Cancelled while exploring test case {} at depth {}",
                    test_case, depth
                );
                outcome.status = ExploreStatus::Cancelled;
                return Ok(outcome);
            }
            outcome.depths_explored += 1;

            let DepthExpansion {
                successors,
                pre_state,
                at_jump,
                target_branches,
                string_literals,
            } = expansion;
            debug!(
                "Depth {}: {} successor(s), at jump: {}",
                depth,
                successors.len(),
                at_jump
            );

            for (index, new_state) in successors.into_iter().enumerate() {
                let candidate = new_state.path_condition();
                if let Some(filter) = self
                    .filters
                    .iter()
                    .find(|filter| !filter.admit(&candidate, &final_pc))
                {
                    debug!(
                        "Depth {}: {} discarded {}",
                        depth,
                        filter.name(),
                        candidate.compact()
                    );
                    continue;
                }

                let target_branch = if at_jump {
                    target_branches.get(index).cloned()
                } else {
                    None
                };
                info!(
                    "From test case {} generated path condition {}{}",
                    test_case,
                    candidate.compact(),
                    target_branch
                        .as_ref()
                        .map(|branch| format!(" aimed at branch {branch}"))
                        .unwrap_or_default()
                );

                let result = ExplorationResult {
                    task: Arc::clone(&task),
                    initial_state: initial_state.clone(),
                    pre_state: pre_state.clone(),
                    new_state,
                    at_jump,
                    target_branch,
                    string_literals: string_literals.clone(),
                    depth,
                };
                if self.results.send(result).is_err() {
                    for filter in &self.filters {
                        filter.retract(&candidate);
                    }
                    return Err(ExploreError::ResultQueueClosed);
                }
                outcome.emitted += 1;
            }
        }

        if outcome.emitted == 0 {
            info!("From test case {} no path condition generated", test_case);
        }
        Ok(outcome)
    }
}
