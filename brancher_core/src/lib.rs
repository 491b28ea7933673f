pub mod backend;
pub mod cache;
pub mod cancel;
pub mod clause;
pub mod config;
pub mod coverage;
pub mod novelty;
pub mod path_condition;
pub mod path_tree;
pub mod pool;
pub mod result;
pub mod scripted;
pub mod task;
pub mod worker;

#[cfg(test)]
mod testing;

pub use backend::{
    BackendError, DepthExpansion, ExplorationSession, LiteralTable, Replay, SymbolicBackend,
    SymbolicState,
};
pub use cache::InitialStateCache;
pub use cancel::CancellationToken;
pub use clause::Clause;
pub use config::{BrancherConfig, DedupMode};
pub use coverage::{CoverageSet, CoverageSink};
pub use novelty::{NoveltyFilter, PathTreeFilter, PrefixReplayFilter};
pub use path_condition::PathCondition;
pub use path_tree::PathTree;
pub use pool::{PoolReport, WorkerPool};
pub use result::{ExplorationResult, ResultSummary};
pub use scripted::{ScriptedBackend, ScriptedProgram, ScriptedState};
pub use task::{ExplorationTask, TargetCallable, TestCase};
pub use worker::{ExploreError, ExploreOutcome, ExploreStatus, Explorer};
