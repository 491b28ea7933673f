//! Recording backend shared by the worker and pool tests.
//!
//! The replayed path of test case `t` is `c0 && c1 && ... && c{n-1}`. Diverging at
//! depth `d` yields the replayed clause `c{d}` and its negation `!c{d}`, or a single
//! `alt{d}` continuation when `d` is configured as straight-line.

use crate::backend::{
    BackendError, DepthExpansion, ExplorationSession, LiteralTable, Replay, SymbolicBackend,
    SymbolicState,
};
use crate::cancel::CancellationToken;
use crate::path_condition::PathCondition;
use crate::task::{ExplorationTask, TargetCallable, TestCase};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockState {
    pub clauses: Vec<String>,
    pub depth: usize,
}

impl SymbolicState for MockState {
    type Clause = String;

    fn path_condition(&self) -> PathCondition<String> {
        self.clauses.clone().into()
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Default)]
pub struct MockLog {
    pub opened: usize,
    pub released: usize,
    /// (test case, depth) for every re-run, in call order.
    pub reruns: Vec<(String, usize)>,
    /// Whether each session was opened with a cached initial state.
    pub cached_initial: Vec<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    pub default_final_depth: usize,
    pub final_depths: HashMap<String, usize>,
    pub straight_line: BTreeSet<usize>,
    pub faulty: HashSet<String>,
    pub panicking: HashSet<String>,
    pub cancel_at: Option<(usize, CancellationToken)>,
    pub rerun_delay: Option<Duration>,
    pub log: Arc<Mutex<MockLog>>,
}

impl MockBackend {
    pub fn new(default_final_depth: usize) -> Self {
        Self {
            default_final_depth,
            ..Default::default()
        }
    }

    pub fn with_final_depth(mut self, test_case: &str, depth: usize) -> Self {
        self.final_depths.insert(test_case.to_string(), depth);
        self
    }

    pub fn with_straight_line(mut self, depth: usize) -> Self {
        self.straight_line.insert(depth);
        self
    }

    pub fn with_fault(mut self, test_case: &str) -> Self {
        self.faulty.insert(test_case.to_string());
        self
    }

    pub fn with_panic(mut self, test_case: &str) -> Self {
        self.panicking.insert(test_case.to_string());
        self
    }

    pub fn cancelling_at(mut self, depth: usize, token: CancellationToken) -> Self {
        self.cancel_at = Some((depth, token));
        self
    }

    pub fn with_rerun_delay(mut self, delay: Duration) -> Self {
        self.rerun_delay = Some(delay);
        self
    }

    pub fn reruns(&self) -> Vec<(String, usize)> {
        self.log.lock().unwrap().reruns.clone()
    }

    pub fn rerun_depths(&self, test_case: &str) -> Vec<usize> {
        self.reruns()
            .into_iter()
            .filter(|(name, _)| name == test_case)
            .map(|(_, depth)| depth)
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn released(&self) -> usize {
        self.log.lock().unwrap().released
    }

    pub fn cached_initial(&self) -> Vec<bool> {
        self.log.lock().unwrap().cached_initial.clone()
    }
}

pub struct MockSession {
    backend: MockBackend,
    test_case: String,
    final_depth: usize,
}

fn state(clauses: Vec<String>) -> MockState {
    let depth = clauses.len();
    MockState { clauses, depth }
}

fn replayed(depth: usize) -> Vec<String> {
    (0..depth).map(|d| format!("c{d}")).collect()
}

impl ExplorationSession for MockSession {
    type State = MockState;

    fn replay_to_completion(&mut self) -> Result<Replay<MockState>, BackendError> {
        if self.backend.panicking.contains(&self.test_case) {
            panic!("engine exploded on {}", self.test_case);
        }
        if self.backend.faulty.contains(&self.test_case) {
            return Err(BackendError::fault(format!(
                "contradictory constraints in {}",
                self.test_case
            )));
        }
        Ok(Replay {
            final_state: state(replayed(self.final_depth)),
            initial_state: state(Vec::new()),
        })
    }

    fn replay_to_depth(&mut self, depth: usize) -> Result<DepthExpansion<MockState>, BackendError> {
        self.backend
            .log
            .lock()
            .unwrap()
            .reruns
            .push((self.test_case.clone(), depth));
        if let Some(delay) = self.backend.rerun_delay {
            std::thread::sleep(delay);
        }
        if let Some((at, token)) = &self.backend.cancel_at {
            if *at == depth {
                token.cancel();
            }
        }

        let prefix = replayed(depth);
        let with = |clause: String| {
            let mut clauses = prefix.clone();
            clauses.push(clause);
            state(clauses)
        };
        let mut literals = LiteralTable::new();
        literals.insert(depth as u64, format!("lit{depth}"));

        if self.backend.straight_line.contains(&depth) {
            return Ok(DepthExpansion {
                successors: vec![with(format!("alt{depth}"))],
                pre_state: state(prefix.clone()),
                at_jump: false,
                target_branches: Vec::new(),
                string_literals: literals,
            });
        }
        Ok(DepthExpansion {
            successors: vec![with(format!("c{depth}")), with(format!("!c{depth}"))],
            pre_state: state(prefix.clone()),
            at_jump: true,
            target_branches: vec![format!("b{depth}#T"), format!("b{depth}#F")],
            string_literals: literals,
        })
    }

    fn coverage_delta(&self) -> BTreeSet<String> {
        (0..self.final_depth).map(|d| format!("b{d}#T")).collect()
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.backend.log.lock().unwrap().released += 1;
    }
}

impl SymbolicBackend for MockBackend {
    type State = MockState;
    type Session = MockSession;

    fn open(
        &self,
        task: &ExplorationTask,
        initial_state: Option<MockState>,
    ) -> Result<MockSession, BackendError> {
        {
            let mut log = self.log.lock().unwrap();
            log.opened += 1;
            log.cached_initial.push(initial_state.is_some());
        }
        let name = task.test_case.class_name.clone();
        let final_depth = self
            .final_depths
            .get(&name)
            .copied()
            .unwrap_or(self.default_final_depth);
        Ok(MockSession {
            backend: self.clone(),
            test_case: name,
            final_depth,
        })
    }
}

pub fn task(test_case: &str, start_depth: usize) -> Arc<ExplorationTask> {
    Arc::new(ExplorationTask::new(
        TestCase::new(test_case),
        TargetCallable::new("demo/Account", "(I)Z", "withdraw"),
        start_depth,
    ))
}
