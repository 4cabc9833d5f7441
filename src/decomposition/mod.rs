//! Decomposition-based incremental solving.
//!
//! An explicit, engine-agnostic constraint model plus an iterator that solves
//! it window by window.
//!
//! # Components
//!
//! - [`ConstraintModel`]: index sets, parameters, variables with a
//!   fixed/free flag per entry, constraint groups with an active flag per
//!   instance
//! - [`OptimizationEngine`]: the solver interface each sub-solve goes through
//! - [`DecompositionIterator`]: partitions variables into free and fixed
//!   entries, prunes vacuous constraints, and calls the engine with a warm
//!   start
//!
//! # Reference
//! Pochet & Wolsey (2006), "Production Planning by Mixed Integer Programming", Ch. 3 (relax-and-fix)

mod engine;
mod iterator;
mod model;

pub use engine::{EngineSolution, OptimizationEngine, SolveLimits, SolveStatus, WarmStart};
pub use iterator::{DecompositionIterator, FreedEntries, IterationResult, Partition};
pub use model::{
    display_tuple, split, CheckFn, ConstraintGroup, ConstraintModel, Domain, IndexSet, IndexTuple,
    Key, ObjectiveFn, Parameter, ScopeFn, VarRef, Variable, VariableEntry,
};
