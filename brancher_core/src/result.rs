use crate::backend::{LiteralTable, SymbolicState};
use crate::path_condition::PathCondition;
use crate::task::ExplorationTask;
use serde::Serialize;
use std::sync::Arc;

/// One genuinely new path condition, ready for test synthesis.
#[derive(Debug, Clone)]
pub struct ExplorationResult<S: SymbolicState> {
    pub task: Arc<ExplorationTask>,
    pub initial_state: S,
    /// State immediately preceding the decision point.
    pub pre_state: S,
    pub new_state: S,
    /// Whether `new_state` comes from a genuine branch.
    pub at_jump: bool,
    /// Only set when `at_jump` holds.
    pub target_branch: Option<String>,
    pub string_literals: LiteralTable,
    pub depth: usize,
}

impl<S: SymbolicState> ExplorationResult<S> {
    pub fn path_condition(&self) -> PathCondition<S::Clause> {
        self.new_state.path_condition()
    }

    /// Flattens the result into a serializable record for reporting.
    pub fn summary(&self) -> ResultSummary {
        let path_condition = self.path_condition().compact();
        let digest = md5::compute(path_condition.as_bytes());
        ResultSummary {
            test_case: self.task.test_case.class_name.clone(),
            target: self.task.target.to_string(),
            depth: self.depth,
            at_jump: self.at_jump,
            target_branch: self.target_branch.clone(),
            path_condition_hash: format!("{:x}", digest),
            path_condition,
        }
    }
}

/// Flat, serializable view of an [`ExplorationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResultSummary {
    pub test_case: String,
    pub target: String,
    pub depth: usize,
    pub at_jump: bool,
    pub target_branch: Option<String>,
    pub path_condition: String,
    pub path_condition_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TargetCallable, TestCase};

    #[derive(Debug, Clone)]
    struct Snapshot(Vec<String>);

    impl SymbolicState for Snapshot {
        type Clause = String;

        fn path_condition(&self) -> PathCondition<String> {
            self.0.clone().into()
        }

        fn depth(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn summary_flattens_result() {
        let task = Arc::new(ExplorationTask::new(
            TestCase::new("AccountTest_0"),
            TargetCallable::new("demo/Account", "(I)Z", "withdraw"),
            0,
        ));
        let result = ExplorationResult {
            task,
            initial_state: Snapshot(vec![]),
            pre_state: Snapshot(vec!["a".into()]),
            new_state: Snapshot(vec!["a".into(), "!(b)".into()]),
            at_jump: true,
            target_branch: Some("Account.java:14#F".into()),
            string_literals: LiteralTable::new(),
            depth: 1,
        };

        let summary = result.summary();
        assert_eq!(summary.test_case, "AccountTest_0");
        assert_eq!(summary.target, "demo/Account:(I)Z:withdraw");
        assert_eq!(summary.path_condition, "a && !(b)");
        assert_eq!(
            summary.path_condition_hash,
            format!("{:x}", md5::compute("a && !(b)".as_bytes()))
        );
        assert_eq!(summary.target_branch.as_deref(), Some("Account.java:14#F"));
        assert_eq!(summary.depth, 1);
    }
}
