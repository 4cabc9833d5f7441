//! Incremental MRCPSP scheduler.
//!
//! Builds a schedule through a sequence of small sub-solves on one
//! [`DecompositionIterator`](crate::decomposition::DecompositionIterator):
//! mode seeding, windowed horizon growth, consolidation, mode refinement and
//! a final full solve. The result is checked by the
//! [`Verifier`](crate::verifier::Verifier).
//!
//! # Algorithm
//!
//! See [`IncrementalScheduler`]. The step sizes in [`SchedulerConfig`] trade
//! sub-problem size against the number of engine calls.
//!
//! # References
//!
//! - Kolisch & Drexl (1997), "Local search for nonpreemptive multi-mode resource-constrained project scheduling"
//! - Pisinger & Ropke (2010), "Large Neighborhood Search"

mod config;
mod context;
mod incremental;

pub use config::{SchedulerConfig, MIN_ITERATION_SECS};
pub use context::SolveContext;
pub use incremental::{IncrementalScheduler, IterationRecord, Phase, ScheduleOutcome};
