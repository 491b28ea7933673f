use crate::clause::Clause;
use crate::path_condition::PathCondition;
use crate::task::ExplorationTask;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use thiserror::Error;

/// String literals observed along a run, keyed by the backend's object identifier.
pub type LiteralTable = BTreeMap<u64, String>;

/// Any unrecoverable failure of the symbolic backend.
///
/// The worker gives up on the current task for every variant alike.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend fault: {0}")]
    Fault(String),
    #[error("backend panicked: {0}")]
    Panicked(String),
}

impl BackendError {
    pub fn fault(message: impl Into<String>) -> Self {
        BackendError::Fault(message.into())
    }
}

/// An execution snapshot produced by the backend.
///
/// `Clone` is the deep copy: the backend mutates states in place, so a clone must
/// never alias the original.
pub trait SymbolicState: Clone + Debug + Send + Sync + 'static {
    type Clause: Clause;

    fn path_condition(&self) -> PathCondition<Self::Clause>;

    /// Number of decision points resolved so far.
    fn depth(&self) -> usize;
}

/// Outcome of replaying a test case to completion.
#[derive(Debug, Clone)]
pub struct Replay<S: SymbolicState> {
    pub final_state: S,
    /// State at entry of the target callable, reusable by later tasks on the same target.
    pub initial_state: S,
}

/// Outcome of a re-run that diverges at one depth.
#[derive(Debug, Clone)]
pub struct DepthExpansion<S: SymbolicState> {
    pub successors: Vec<S>,
    /// State immediately preceding the decision point.
    pub pre_state: S,
    /// Whether the decision is a genuine branch rather than straight-line continuation.
    pub at_jump: bool,
    /// One label per successor when `at_jump` holds, empty otherwise.
    pub target_branches: Vec<String>,
    pub string_literals: LiteralTable,
}

/// Per-task execution context. Dropping it releases every backend resource held
/// for the task.
pub trait ExplorationSession {
    type State: SymbolicState;

    fn replay_to_completion(&mut self) -> Result<Replay<Self::State>, BackendError>;

    /// Re-runs the program, diverging at `depth`. May be called repeatedly with
    /// increasing depths.
    fn replay_to_depth(&mut self, depth: usize)
    -> Result<DepthExpansion<Self::State>, BackendError>;

    /// Branch identifiers reached by the most recent completion run.
    fn coverage_delta(&self) -> BTreeSet<String>;
}

/// Factory for per-task sessions.
pub trait SymbolicBackend: Send + Sync {
    type State: SymbolicState;
    type Session: ExplorationSession<State = Self::State>;

    /// Opens a session for `task`. When `initial_state` is supplied the backend
    /// may start from it instead of recomputing the setup prefix.
    fn open(
        &self,
        task: &ExplorationTask,
        initial_state: Option<Self::State>,
    ) -> Result<Self::Session, BackendError>;
}
