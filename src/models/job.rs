//! Job model.
//!
//! A job is a non-preemptive unit of work. It can be executed in one of
//! several modes; the chosen mode fixes the job's duration and its
//! requirement on every resource for the whole active interval.
//!
//! # Time Representation
//! Time is discrete. A job started at period `s` with duration `d` occupies
//! periods `s, s+1, .., s+d-1` and finishes at `s + d`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ResourceId;

/// Job identifier.
pub type JobId = u32;

/// Mode identifier (1-based in benchmark instances).
pub type ModeId = u32;

/// A job to be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Jobs that cannot start before this one finishes.
    pub successors: Vec<JobId>,
    /// Execution modes, by mode identifier.
    pub modes: BTreeMap<ModeId, Mode>,
}

/// One way of executing a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    /// Number of periods the job occupies.
    pub duration: u32,
    /// Requirement per resource. Missing resources mean zero.
    pub needs: BTreeMap<ResourceId, u32>,
}

impl Mode {
    /// Creates a mode with the given duration and no requirements.
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            needs: BTreeMap::new(),
        }
    }

    /// Adds a resource requirement.
    pub fn with_need(mut self, resource: impl Into<ResourceId>, need: u32) -> Self {
        self.needs.insert(resource.into(), need);
        self
    }

    /// Requirement on a resource (0 when not listed).
    pub fn need(&self, resource: &str) -> u32 {
        self.needs.get(resource).copied().unwrap_or(0)
    }
}

impl Job {
    /// Creates a job without modes or successors.
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            successors: Vec::new(),
            modes: BTreeMap::new(),
        }
    }

    /// Adds a successor job.
    pub fn with_successor(mut self, successor: JobId) -> Self {
        self.successors.push(successor);
        self
    }

    /// Adds (or replaces) an execution mode.
    pub fn with_mode(mut self, mode: ModeId, spec: Mode) -> Self {
        self.modes.insert(mode, spec);
        self
    }

    /// Returns the mode specification, if the job has it.
    pub fn mode(&self, mode: ModeId) -> Option<&Mode> {
        self.modes.get(&mode)
    }

    /// Duration under a mode.
    pub fn duration(&self, mode: ModeId) -> Option<u32> {
        self.modes.get(&mode).map(|m| m.duration)
    }

    /// Requirement on a resource under a mode (0 for unknown modes).
    pub fn need(&self, mode: ModeId, resource: &str) -> u32 {
        self.modes.get(&mode).map(|m| m.need(resource)).unwrap_or(0)
    }

    /// Longest duration across all modes (0 without modes).
    pub fn max_duration(&self) -> u32 {
        self.modes.values().map(|m| m.duration).max().unwrap_or(0)
    }

    /// Shortest duration across all modes (0 without modes).
    pub fn min_duration(&self) -> u32 {
        self.modes.values().map(|m| m.duration).min().unwrap_or(0)
    }

    /// Mode identifiers in ascending order.
    pub fn mode_ids(&self) -> impl Iterator<Item = ModeId> + '_ {
        self.modes.keys().copied()
    }
}
