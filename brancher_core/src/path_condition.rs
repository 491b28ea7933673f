use crate::clause::Clause;
use std::fmt;

/// Ordered sequence of clauses from the root of execution to a point of interest.
///
/// Order is significant: the same clauses in a different order form a distinct
/// path condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathCondition<C: Clause> {
    clauses: Vec<C>,
}

impl<C: Clause> PathCondition<C> {
    /// Creates an empty path condition.
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    pub fn push(&mut self, clause: C) {
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[C] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns `true` if `candidate` merely re-derives a prefix of this path condition.
    ///
    /// The first `candidate.len()` clauses of `self` are compared pairwise against
    /// `candidate`. A candidate longer than `self` goes past the known path and is
    /// never a replay.
    pub fn replays_prefix_of(&self, candidate: &PathCondition<C>) -> bool {
        candidate.len() <= self.len() && self.clauses[..candidate.len()] == candidate.clauses[..]
    }

    /// Compact single-line rendering used in diagnostics.
    pub fn compact(&self) -> String {
        if self.clauses.is_empty() {
            return "true".to_string();
        }
        self.clauses
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

impl<C: Clause> Default for PathCondition<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clause> From<Vec<C>> for PathCondition<C> {
    fn from(clauses: Vec<C>) -> Self {
        Self { clauses }
    }
}

impl<C: Clause> FromIterator<C> for PathCondition<C> {
    fn from_iter<T: IntoIterator<Item = C>>(iter: T) -> Self {
        Self {
            clauses: iter.into_iter().collect(),
        }
    }
}

impl<'a, C: Clause> IntoIterator for &'a PathCondition<C> {
    type Item = &'a C;
    type IntoIter = std::slice::Iter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.iter()
    }
}

impl<C: Clause> fmt::Display for PathCondition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compact())
    }
}
