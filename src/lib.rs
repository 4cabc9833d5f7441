//! Decomposition-based incremental solving for multi-mode resource-constrained
//! project scheduling (MRCPSP).
//!
//! A large scheduling model is solved as a sequence of sub-problems: some
//! variable entries stay fixed at their current values, the rest are handed
//! to an optimization engine, and constraint instances that only read fixed
//! entries are switched off. An independent verifier checks the resulting
//! schedule against the instance.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Instance`, `Job`, `Mode`, `Resource`,
//!   `Solution`, `Assignment`
//! - **`validation`**: Input integrity checks (duplicate IDs, unknown
//!   successors, modes and resource references). The precedence relation is
//!   assumed acyclic.
//! - **`decomposition`**: Generic indexed constraint model, partitions,
//!   the engine seam and the `DecompositionIterator`
//! - **`formulation`**: MRCPSP model layouts on top of the decomposition
//!   model, plus a bundled branch-and-bound engine
//! - **`scheduler`**: The incremental construction driver
//! - **`verifier`**: Feasibility checks and the makespan objective
//!
//! # Architecture
//!
//! The decomposition layer knows nothing about scheduling; the engine is a
//! trait so an external MILP/CP solver can stand in for the bundled one.
//!
//! # References
//!
//! - Kolisch & Sprecher (1997), "PSPLIB - A project scheduling problem library"
//! - Hartmann & Briskorn (2010), "A survey of variants and extensions of the resource-constrained project scheduling problem"

pub mod decomposition;
pub mod error;
pub mod formulation;
pub mod models;
pub mod scheduler;
pub mod validation;
pub mod verifier;
