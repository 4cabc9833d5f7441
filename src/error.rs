//! Error types.
//!
//! Only contract violations are errors. A sub-problem that turns out to be
//! infeasible is a regular outcome (see
//! [`ScheduleOutcome`](crate::scheduler::ScheduleOutcome)), and verifier
//! violations are a structured report.

use thiserror::Error;

use crate::validation::ValidationError;

/// Malformed instance, rejected at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("inconsistent instance: {}", join(.0))]
    Inconsistent(Vec<ValidationError>),
}

/// Misuse of the decomposition iterator or constraint model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompositionError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown constraint '{0}'")]
    UnknownConstraint(String),
    #[error("unknown index set '{0}'")]
    UnknownIndexSet(String),
    #[error("variable '{variable}' has {expected} dimensions, {given} were declared")]
    DimensionMismatch {
        variable: String,
        expected: usize,
        given: usize,
    },
    #[error("variable '{0}' is not declared as partitionable")]
    NotDeclared(String),
    #[error("member {member} of set '{set}' is both free and fixed")]
    OverlappingPartition { set: String, member: String },
}

/// Errors surfaced by the incremental scheduler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Decomposition(#[from] DecompositionError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
