//! A prefix trie over clause sequences.
//!
//! The tree records every path condition handed to [`PathTree::insert_path`] and
//! answers whether a given sequence was already recorded. Shared prefixes are
//! stored once. Nodes are only removed by [`PathTree::remove_path`] and
//! [`PathTree::reset`].
//!
//! All operations take a single mutex around the whole structure. Lookups and
//! insertions are cheap next to a symbolic re-run, and the lock makes
//! check-then-insert linearizable so two workers can never create sibling nodes
//! for the same clause.

use crate::clause::Clause;
use log::trace;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Node<C: Clause> {
    /// `None` only at the root.
    clause: Option<C>,
    children: Vec<Node<C>>,
    /// Set when a recorded sequence ends at this node.
    terminal: bool,
}

impl<C: Clause> Node<C> {
    fn root() -> Self {
        Self {
            clause: None,
            children: Vec::new(),
            terminal: false,
        }
    }

    fn leaf(clause: C) -> Self {
        Self {
            clause: Some(clause),
            children: Vec::new(),
            terminal: false,
        }
    }

    fn find_child(&self, clause: &C) -> Option<&Node<C>> {
        self.children
            .iter()
            .find(|child| child.clause.as_ref() == Some(clause))
    }

    /// Returns the child storing `clause`, creating it when missing.
    fn child_or_insert(&mut self, clause: &C) -> &mut Node<C> {
        let position = self
            .children
            .iter()
            .position(|child| child.clause.as_ref() == Some(clause));
        let index = match position {
            Some(index) => index,
            None => {
                self.children.push(Node::leaf(clause.clone()));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Unmarks `path` below this node and prunes the nodes left without a purpose.
    fn remove(&mut self, path: &[C]) -> bool {
        let Some((head, rest)) = path.split_first() else {
            let was_recorded = self.terminal;
            self.terminal = false;
            return was_recorded;
        };
        let Some(index) = self
            .children
            .iter()
            .position(|child| child.clause.as_ref() == Some(head))
        else {
            return false;
        };
        let removed = self.children[index].remove(rest);
        let child = &self.children[index];
        if removed && !child.terminal && child.children.is_empty() {
            self.children.remove(index);
        }
        removed
    }

    fn count_nodes(&self) -> usize {
        self.children.iter().map(|c| 1 + c.count_nodes()).sum()
    }

    fn count_terminals(&self) -> usize {
        let own = usize::from(self.terminal);
        own + self.children.iter().map(Node::count_terminals).sum::<usize>()
    }
}

/// Process-wide record of the path conditions produced so far.
#[derive(Debug)]
pub struct PathTree<C: Clause> {
    root: Mutex<Node<C>>,
}

impl<C: Clause> PathTree<C> {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Node::root()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Node<C>> {
        // Every mutation completes before the guard is released, so a poisoned
        // tree is still structurally sound.
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ensures `path` and all of its prefixes exist as a chain from the root.
    ///
    /// Only the missing suffix is created. Inserting the same sequence again is a no-op.
    pub fn insert_path(&self, path: &[C]) {
        let mut root = self.lock();
        Self::insert_locked(&mut root, path);
    }

    /// Records `path` unless it was already recorded.
    ///
    /// Returns `true` if the path was new. The check and the insertion happen under
    /// one lock acquisition.
    pub fn insert_if_absent(&self, path: &[C]) -> bool {
        let mut root = self.lock();
        Self::insert_locked(&mut root, path)
    }

    fn insert_locked(root: &mut Node<C>, path: &[C]) -> bool {
        let mut current = root;
        for clause in path {
            current = current.child_or_insert(clause);
        }
        let newly_recorded = !current.terminal;
        current.terminal = true;
        trace!(
            "path tree insert of {} clauses (new: {})",
            path.len(),
            newly_recorded
        );
        newly_recorded
    }

    /// Forgets the exact sequence `path`, keeping every other recorded path and
    /// the prefixes they share with it.
    ///
    /// Returns `true` if `path` was recorded.
    pub fn remove_path(&self, path: &[C]) -> bool {
        let removed = self.lock().remove(path);
        trace!(
            "path tree removal of {} clauses (removed: {})",
            path.len(),
            removed
        );
        removed
    }

    /// Returns `true` iff exactly `path` was previously inserted.
    ///
    /// A sequence that is only a prefix of some recorded path is not contained.
    pub fn contains_path(&self, path: &[C]) -> bool {
        let root = self.lock();
        Self::walk(&root, path).is_some_and(|node| node.terminal)
    }

    /// Returns `true` if `path` is a prefix of (or equal to) some recorded path.
    pub fn contains_prefix(&self, path: &[C]) -> bool {
        let root = self.lock();
        Self::walk(&root, path).is_some()
    }

    fn walk<'a>(root: &'a Node<C>, path: &[C]) -> Option<&'a Node<C>> {
        let mut current = root;
        for clause in path {
            current = current.find_child(clause)?;
        }
        Some(current)
    }

    /// Clauses stored directly below the node reached by `prefix`, in insertion order.
    /// Returns `None` if `prefix` is not in the tree.
    pub fn child_clauses(&self, prefix: &[C]) -> Option<Vec<C>> {
        let root = self.lock();
        Self::walk(&root, prefix).map(|node| {
            node.children
                .iter()
                .filter_map(|child| child.clause.clone())
                .collect()
        })
    }

    /// Number of non-root nodes.
    pub fn node_count(&self) -> usize {
        self.lock().count_nodes()
    }

    /// Number of distinct sequences recorded.
    pub fn path_count(&self) -> usize {
        self.lock().count_terminals()
    }

    pub fn is_empty(&self) -> bool {
        let root = self.lock();
        root.children.is_empty() && !root.terminal
    }

    /// Drops every recorded path.
    pub fn reset(&self) {
        *self.lock() = Node::root();
    }
}

impl<C: Clause> Default for PathTree<C> {
    fn default() -> Self {
        Self::new()
    }
}
