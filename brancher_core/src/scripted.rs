//! A deterministic in-process backend driven by a TOML program description.
//!
//! A program is a straight sequence of decisions. A test case resolves them in
//! order with one boolean choice each, so its path condition is the preamble
//! followed by one clause per choice. Genuine branches (`jump = true`) contribute
//! `condition` or `!(condition)`; straight-line decisions always contribute
//! `condition`.

use crate::backend::{
    BackendError, DepthExpansion, ExplorationSession, LiteralTable, Replay, SymbolicBackend,
    SymbolicState,
};
use crate::path_condition::PathCondition;
use crate::task::{ExplorationTask, TargetCallable, TestCase};
use log::debug;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct Decision {
    pub label: String,
    pub condition: String,
    #[serde(default = "default_jump")]
    pub jump: bool,
}

fn default_jump() -> bool {
    true
}

impl Decision {
    fn clause(&self, choice: bool) -> String {
        if !self.jump || choice {
            self.condition.clone()
        } else {
            format!("!({})", self.condition)
        }
    }

    fn branch_id(&self, choice: bool) -> String {
        format!("{}#{}", self.label, if choice { "T" } else { "F" })
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct Literal {
    pub id: u64,
    pub value: String,
    /// First depth at which the literal is observable.
    #[serde(default)]
    pub after: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ScriptedTest {
    pub class_name: String,
    pub choices: Vec<bool>,
    #[serde(default)]
    pub start_depth: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ScriptedProgram {
    pub target: TargetCallable,
    #[serde(default)]
    pub preamble: Vec<String>,
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub literals: Vec<Literal>,
    #[serde(default)]
    pub tests: Vec<ScriptedTest>,
}

impl ScriptedProgram {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read program file at {:?}: {}", path, e))?;
        Self::from_toml_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from program file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// One exploration task per scripted test case.
    pub fn tasks(&self) -> Vec<ExplorationTask> {
        self.tests
            .iter()
            .map(|test| {
                ExplorationTask::new(
                    TestCase::new(test.class_name.clone()),
                    self.target.clone(),
                    test.start_depth,
                )
            })
            .collect()
    }

    fn test(&self, class_name: &str) -> Option<&ScriptedTest> {
        self.tests.iter().find(|test| test.class_name == class_name)
    }

    fn literals_at(&self, depth: usize) -> LiteralTable {
        self.literals
            .iter()
            .filter(|literal| literal.after <= depth)
            .map(|literal| (literal.id, literal.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedState {
    clauses: PathCondition<String>,
    depth: usize,
}

impl ScriptedState {
    fn extended(&self, clause: String) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.push(clause);
        Self {
            clauses,
            depth: self.depth + 1,
        }
    }
}

impl SymbolicState for ScriptedState {
    type Clause = String;

    fn path_condition(&self) -> PathCondition<String> {
        self.clauses.clone()
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    program: Arc<ScriptedProgram>,
    initial_computations: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(program: ScriptedProgram) -> Self {
        Self {
            program: Arc::new(program),
            initial_computations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn program(&self) -> &ScriptedProgram {
        &self.program
    }

    /// How many sessions had to compute the initial state themselves.
    pub fn initial_computations(&self) -> usize {
        self.initial_computations.load(Ordering::SeqCst)
    }
}

impl SymbolicBackend for ScriptedBackend {
    type State = ScriptedState;
    type Session = ScriptedSession;

    fn open(
        &self,
        task: &ExplorationTask,
        initial_state: Option<ScriptedState>,
    ) -> Result<ScriptedSession, BackendError> {
        if task.target != self.program.target {
            return Err(BackendError::fault(format!(
                "program has no callable {}",
                task.target
            )));
        }
        let test = self
            .program
            .test(&task.test_case.class_name)
            .ok_or_else(|| {
                BackendError::fault(format!("unknown test case {}", task.test_case))
            })?;
        if test.choices.len() > self.program.decisions.len() {
            return Err(BackendError::fault(format!(
                "test case {} resolves {} decisions but the program has {}",
                test.class_name,
                test.choices.len(),
                self.program.decisions.len()
            )));
        }
        Ok(ScriptedSession {
            program: Arc::clone(&self.program),
            choices: test.choices.clone(),
            initial_state,
            initial_computations: Arc::clone(&self.initial_computations),
            coverage: BTreeSet::new(),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedSession {
    program: Arc<ScriptedProgram>,
    choices: Vec<bool>,
    initial_state: Option<ScriptedState>,
    initial_computations: Arc<AtomicUsize>,
    coverage: BTreeSet<String>,
}

impl ScriptedSession {
    fn initial_state(&mut self) -> ScriptedState {
        if let Some(state) = &self.initial_state {
            return state.clone();
        }
        self.initial_computations.fetch_add(1, Ordering::SeqCst);
        let state = ScriptedState {
            clauses: self.program.preamble.iter().cloned().collect(),
            depth: 0,
        };
        self.initial_state = Some(state.clone());
        state
    }

    /// State after resolving the first `depth` decisions of the test case.
    fn state_at(&mut self, depth: usize) -> ScriptedState {
        let mut state = self.initial_state();
        for (decision, &choice) in self.program.decisions.iter().zip(&self.choices).take(depth) {
            state = state.extended(decision.clause(choice));
        }
        state
    }
}

impl ExplorationSession for ScriptedSession {
    type State = ScriptedState;

    fn replay_to_completion(&mut self) -> Result<Replay<ScriptedState>, BackendError> {
        let initial_state = self.initial_state();
        let final_state = self.state_at(self.choices.len());
        self.coverage = self
            .program
            .decisions
            .iter()
            .zip(&self.choices)
            .filter(|(decision, _)| decision.jump)
            .map(|(decision, &choice)| decision.branch_id(choice))
            .collect();
        Ok(Replay {
            final_state,
            initial_state,
        })
    }

    fn replay_to_depth(
        &mut self,
        depth: usize,
    ) -> Result<DepthExpansion<ScriptedState>, BackendError> {
        if depth >= self.choices.len() {
            return Err(BackendError::fault(format!(
                "depth {} is beyond the replayed path of {} decisions",
                depth,
                self.choices.len()
            )));
        }
        let pre_state = self.state_at(depth);
        let decision = &self.program.decisions[depth];
        debug!("Scripted re-run diverging at {}", decision.label);

        let (successors, at_jump, target_branches) = if decision.jump {
            (
                vec![
                    pre_state.extended(decision.clause(true)),
                    pre_state.extended(decision.clause(false)),
                ],
                true,
                vec![decision.branch_id(true), decision.branch_id(false)],
            )
        } else {
            (
                vec![pre_state.extended(decision.clause(true))],
                false,
                Vec::new(),
            )
        };
        Ok(DepthExpansion {
            successors,
            pre_state,
            at_jump,
            target_branches,
            string_literals: self.program.literals_at(depth),
        })
    }

    fn coverage_delta(&self) -> BTreeSet<String> {
        self.coverage.clone()
    }
}
