//! Optimization engine interface.
//!
//! The iterator delegates each sub-solve to an [`OptimizationEngine`]. The
//! engine sees the full [`ConstraintModel`]: fixed entries are constants,
//! free entries are decision variables, inactive constraint instances are
//! ignored. It returns a status and, when feasible, a value for every
//! variable entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::model::{ConstraintModel, IndexTuple, Key};

/// Outcome of one sub-solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Proven optimal for the sub-problem.
    Optimal,
    /// Feasible, stopped by the time limit.
    FeasibleWithinLimit,
    /// Proven infeasible.
    Infeasible,
    /// No solution found within the limit.
    Unknown,
}

impl SolveStatus {
    /// Whether a solution is available.
    pub fn is_feasible(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::FeasibleWithinLimit)
    }

    /// Numeric status code used in logs and interchange.
    pub fn code(self) -> u8 {
        match self {
            SolveStatus::Unknown => 0,
            SolveStatus::FeasibleWithinLimit => 2,
            SolveStatus::Infeasible => 3,
            SolveStatus::Optimal => 4,
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::FeasibleWithinLimit => "feasible (time limit)",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Resource limits of one sub-solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveLimits {
    pub time_limit: Duration,
}

impl SolveLimits {
    pub fn new(time_limit: Duration) -> Self {
        Self { time_limit }
    }
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(10),
        }
    }
}

/// Initial values handed to the engine, rewritten before every solve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmStart {
    /// variable → (index tuple → value)
    pub values: BTreeMap<String, BTreeMap<IndexTuple, i64>>,
}

impl WarmStart {
    /// Snapshot of every entry of the model.
    pub fn from_model(model: &ConstraintModel) -> Self {
        let mut ws = Self::default();
        ws.rewrite_from(model);
        ws
    }

    /// Replaces the content with the current values of `model`.
    pub fn rewrite_from(&mut self, model: &ConstraintModel) {
        self.values = model
            .variables()
            .map(|v| {
                let entries = v.entries.iter().map(|(k, e)| (k.clone(), e.value)).collect();
                (v.name.clone(), entries)
            })
            .collect();
    }

    /// Value of one entry, if present.
    pub fn get(&self, variable: &str, index: &[Key]) -> Option<i64> {
        self.values.get(variable)?.get(index).copied()
    }
}

/// Result of one sub-solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSolution {
    pub status: SolveStatus,
    pub objective: Option<i64>,
    /// variable → (index tuple → value); only meaningful when feasible.
    pub values: BTreeMap<String, BTreeMap<IndexTuple, i64>>,
}

impl EngineSolution {
    /// A solution without values.
    pub fn without_values(status: SolveStatus) -> Self {
        Self {
            status,
            objective: None,
            values: BTreeMap::new(),
        }
    }
}

/// A solver for [`ConstraintModel`]s.
pub trait OptimizationEngine {
    /// Solves the model as currently configured.
    ///
    /// Must honor fixed entries and active constraint instances, and return
    /// within roughly `limits.time_limit`.
    fn solve(
        &self,
        model: &ConstraintModel,
        warm_start: &WarmStart,
        limits: &SolveLimits,
    ) -> EngineSolution;
}

impl<E: OptimizationEngine + ?Sized> OptimizationEngine for &E {
    fn solve(
        &self,
        model: &ConstraintModel,
        warm_start: &WarmStart,
        limits: &SolveLimits,
    ) -> EngineSolution {
        (**self).solve(model, warm_start, limits)
    }
}
