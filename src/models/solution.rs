//! Solution model.
//!
//! A solution assigns each job a start period and an execution mode.
//! It says nothing about feasibility; use
//! [`Verifier`](crate::verifier::Verifier) to check it against an instance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{JobId, ModeId};

/// Start period and mode of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Assigned job.
    pub job: JobId,
    /// Start period.
    pub period: u32,
    /// Execution mode.
    pub mode: ModeId,
}

impl Assignment {
    /// Creates a new assignment.
    pub fn new(job: JobId, period: u32, mode: ModeId) -> Self {
        Self { job, period, mode }
    }
}

/// A (possibly partial) schedule: job → (start period, mode).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    assignments: BTreeMap<JobId, Assignment>,
}

/// Interchange format: `{"assignment": [{"job", "period", "mode"}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionData {
    pub assignment: Vec<Assignment>,
}

impl Solution {
    /// Creates an empty solution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns (or reassigns) a job.
    pub fn assign(&mut self, job: JobId, period: u32, mode: ModeId) {
        self.assignments
            .insert(job, Assignment::new(job, period, mode));
    }

    /// Builder form of [`Solution::assign`].
    pub fn with_assignment(mut self, job: JobId, period: u32, mode: ModeId) -> Self {
        self.assign(job, period, mode);
        self
    }

    /// Assignment of a job, if any.
    pub fn get(&self, job: JobId) -> Option<&Assignment> {
        self.assignments.get(&job)
    }

    /// Start period of a job.
    pub fn start(&self, job: JobId) -> Option<u32> {
        self.get(job).map(|a| a.period)
    }

    /// Mode of a job.
    pub fn mode(&self, job: JobId) -> Option<ModeId> {
        self.get(job).map(|a| a.mode)
    }

    /// Whether a job is assigned.
    pub fn contains(&self, job: JobId) -> bool {
        self.assignments.contains_key(&job)
    }

    /// Assignments in job order.
    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.values()
    }

    /// Number of assigned jobs.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether no job is assigned.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Exports the interchange record.
    pub fn to_data(&self) -> SolutionData {
        SolutionData {
            assignment: self.assignments.values().copied().collect(),
        }
    }

    /// Imports the interchange record. Later duplicates win.
    pub fn from_data(data: &SolutionData) -> Self {
        let mut solution = Self::new();
        for a in &data.assignment {
            solution.assign(a.job, a.period, a.mode);
        }
        solution
    }
}

impl FromIterator<Assignment> for Solution {
    fn from_iter<I: IntoIterator<Item = Assignment>>(iter: I) -> Self {
        Self {
            assignments: iter.into_iter().map(|a| (a.job, a)).collect(),
        }
    }
}
