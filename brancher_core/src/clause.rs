use std::fmt::{Debug, Display};
use std::hash::Hash;

/// An atomic symbolic constraint contributed by one resolved decision point.
///
/// Clauses carry no structure beyond equality and a stable `Display` rendering,
/// which is what diagnostics print.
pub trait Clause: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

impl<T> Clause for T where T: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}
