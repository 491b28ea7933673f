use crate::backend::SymbolicState;
use crate::task::TargetCallable;
use dashmap::DashMap;
use log::debug;

/// Cache of initial symbolic states, one per target callable.
///
/// The first state stored for a key is kept for the lifetime of the cache; later
/// offers for the same key are ignored. Both storing and lookup clone, so the
/// cached original is never handed out.
#[derive(Debug)]
pub struct InitialStateCache<S: SymbolicState> {
    states: DashMap<TargetCallable, S>,
}

impl<S: SymbolicState> InitialStateCache<S> {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Returns a fresh copy of the cached initial state for `target`, if any.
    pub fn get(&self, target: &TargetCallable) -> Option<S> {
        self.states.get(target).map(|entry| entry.value().clone())
    }

    /// Stores a copy of `state` unless `target` already has one.
    ///
    /// Returns `true` if this call populated the entry.
    pub fn offer(&self, target: &TargetCallable, state: &S) -> bool {
        let mut inserted = false;
        self.states.entry(target.clone()).or_insert_with(|| {
            inserted = true;
            state.clone()
        });
        if inserted {
            debug!("Cached initial state for {}", target);
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl<S: SymbolicState> Default for InitialStateCache<S> {
    fn default() -> Self {
        Self::new()
    }
}
