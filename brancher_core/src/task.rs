use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity of the callable under analysis.
///
/// Two callables are the same only if owner type, signature and name all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetCallable {
    pub class_name: String,
    pub descriptor: String,
    pub name: String,
}

impl TargetCallable {
    pub fn new(
        class_name: impl Into<String>,
        descriptor: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            descriptor: descriptor.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TargetCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.class_name, self.descriptor, self.name)
    }
}

/// A concrete test case, as produced by the upstream test generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestCase {
    pub class_name: String,
    #[serde(default)]
    pub source_path: Option<PathBuf>,
}

impl TestCase {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            source_path: None,
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name)
    }
}

/// One unit of work for an exploration worker.
///
/// `start_depth` is the shallowest depth worth re-exploring; shallower
/// alternatives were covered by an earlier pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationTask {
    pub test_case: TestCase,
    pub target: TargetCallable,
    pub start_depth: usize,
}

impl ExplorationTask {
    pub fn new(test_case: TestCase, target: TargetCallable, start_depth: usize) -> Self {
        Self {
            test_case,
            target,
            start_depth,
        }
    }
}
