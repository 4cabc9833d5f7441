//! Incremental construction driver.
//!
//! # Algorithm
//!
//! 1. **Mode seeding**: solve the mode-selection model (one mode per job,
//!    non-renewable capacities, shortest critical path).
//! 2. **Windowed horizon growth**: add `window_step` jobs at a time in
//!    [`Instance::construction_order`], so predecessors never arrive after
//!    their successors. Earlier jobs are fixed, the window's jobs are free in their
//!    seeded mode over periods `0..slack + makespan + Σ max_duration(window)`.
//!    Precedence is active only among jobs introduced so far; non-renewable
//!    capacity stays off (the seeded modes already respect it).
//! 3. **Consolidation**: all constraints back on, periods shrunk to
//!    `0..=makespan`, every start and mode re-opened.
//! 4. **Mode refinement**: batches of `mode_batch` jobs get their modes
//!    re-opened while every start stays free.
//! 5. **Final solve**: everything free, every constraint active.
//!
//! A phase ending Infeasible or Unknown stops the construction; the outcome
//! is then Infeasible with an empty solution.
//!
//! # Reference
//! Kolisch & Drexl (1997), "Local search for nonpreemptive multi-mode resource-constrained project scheduling"

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{SchedulerConfig, SolveContext};
use crate::decomposition::{
    DecompositionIterator, IndexTuple, IterationResult, Key, OptimizationEngine, Partition, SolveLimits,
    SolveStatus,
};
use crate::error::SchedulerError;
use crate::formulation::{
    decode_modes, decode_solution, job_mode, MrcpspModelBuilder, JOBS, JOBS_MODES, MODE,
    NON_RENEWABLE_CAPACITY, PERIODS, PRECEDENCE, START,
};
use crate::models::{Instance, JobId, ModeId, Solution};
use crate::verifier::{Report, Verifier};

/// Construction phase of one sub-solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    ModeSeeding,
    Window,
    Consolidation,
    ModeRefinement,
    Final,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::ModeSeeding => "mode seeding",
            Phase::Window => "window",
            Phase::Consolidation => "consolidation",
            Phase::ModeRefinement => "mode refinement",
            Phase::Final => "final",
        };
        f.write_str(s)
    }
}

/// One sub-solve of a construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub phase: Phase,
    /// 1-based within the phase.
    pub iteration: usize,
    pub status: SolveStatus,
    pub objective: Option<i64>,
    /// Period horizon of the sub-problem, when it has one.
    pub horizon: Option<u32>,
}

/// Result of [`IncrementalScheduler::solve`].
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// Status of the final solve, or Infeasible when a phase failed.
    pub status: SolveStatus,
    /// Extracted schedule; empty unless feasible.
    pub solution: Solution,
    /// Makespan of the extracted schedule.
    pub makespan: Option<u32>,
    /// Every sub-solve, in order.
    pub history: Vec<IterationRecord>,
    /// Verifier report of the extracted schedule.
    pub report: Option<Report>,
}

impl ScheduleOutcome {
    fn infeasible(history: Vec<IterationRecord>) -> Self {
        Self {
            status: SolveStatus::Infeasible,
            solution: Solution::new(),
            makespan: None,
            history,
            report: None,
        }
    }

    /// Whether a schedule was produced.
    pub fn is_feasible(&self) -> bool {
        self.status.is_feasible()
    }

    /// Objectives of the sub-solves of one phase.
    pub fn objectives(&self, phase: Phase) -> Vec<i64> {
        self.history
            .iter()
            .filter(|r| r.phase == phase)
            .filter_map(|r| r.objective)
            .collect()
    }
}

/// Decomposition-based MRCPSP heuristic.
///
/// # Example
///
/// ```
/// use u_mrcpsp::formulation::BranchAndBoundEngine;
/// use u_mrcpsp::models::{Instance, Job, Mode, Resource};
/// use u_mrcpsp::scheduler::{IncrementalScheduler, SolveContext};
///
/// let instance = Instance::new(
///     vec![
///         Job::new(1).with_successor(2).with_mode(1, Mode::new(2).with_need("R1", 1)),
///         Job::new(2).with_mode(1, Mode::new(1).with_need("R1", 1)),
///     ],
///     vec![Resource::renewable("R1", 1)],
/// )
/// .unwrap();
///
/// let scheduler = IncrementalScheduler::new(BranchAndBoundEngine::new());
/// let outcome = scheduler.solve(&instance, &SolveContext::new()).unwrap();
/// assert_eq!(outcome.makespan, Some(3));
/// assert_eq!(outcome.solution.start(2), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct IncrementalScheduler<E> {
    engine: E,
    config: SchedulerConfig,
}

impl<E: OptimizationEngine> IncrementalScheduler<E> {
    /// Creates a scheduler with the default configuration.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            config: SchedulerConfig::default(),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Builds a schedule for `instance`.
    ///
    /// # Errors
    /// Invalid configuration, or a model the decomposition rejects.
    /// Infeasibility is reported through [`ScheduleOutcome::status`].
    pub fn solve(&self, instance: &Instance, ctx: &SolveContext) -> Result<ScheduleOutcome, SchedulerError> {
        self.config.validate().map_err(SchedulerError::InvalidConfig)?;
        let builder = MrcpspModelBuilder::new(instance);
        let mut history = Vec::new();
        info!("solving {} jobs, {} resources", instance.job_count(), instance.resources().len());

        // Mode seeding
        let mut seeding = DecompositionIterator::new(builder.build_mode_selection()?, &self.engine)
            .with_limits(self.limits(ctx));
        let result = seeding.solve_once();
        record(&mut history, Phase::ModeSeeding, 1, result, None);
        if !result.is_feasible() {
            warn!("no feasible mode combination");
            return Ok(ScheduleOutcome::infeasible(history));
        }
        let seeded = decode_modes(seeding.model());
        info!("modes seeded, critical path {:?}", result.objective);

        let periods = self
            .config
            .max_period
            .unwrap_or_else(|| instance.horizon_upper_bound() + 1);
        let mut it = DecompositionIterator::new(builder.build_schedule(periods)?, &self.engine);
        it.declare(START, &[JOBS, PERIODS])?;
        it.declare(MODE, &[JOBS_MODES])?;
        it.reset_to_default();

        // Windowed horizon growth
        let Some(mut makespan) = self.grow_windows(instance, &seeded, &mut it, ctx, &mut history)? else {
            return Ok(ScheduleOutcome::infeasible(history));
        };
        it.activate_constraint(PRECEDENCE, None)?;
        it.activate_constraint(NON_RENEWABLE_CAPACITY, None)?;
        shrink_periods(&mut it, makespan)?;

        let all_jobs = instance.construction_order();
        let all_modes: Vec<IndexTuple> = builder
            .eligible_modes()
            .into_iter()
            .map(|(j, m)| job_mode(j, m))
            .collect();

        if self.config.consolidate && !ctx.is_exhausted() {
            info!("consolidating over {} periods", makespan + 1);
            let partition = Partition::new()
                .with_free_keys(JOBS, all_jobs.iter().copied())
                .with_fixed_keys(PERIODS, 0..=makespan)
                .with_free(JOBS_MODES, all_modes.iter().cloned());
            it.set_limits(self.limits(ctx));
            let result = it.iterate(&partition, &[])?;
            record(&mut history, Phase::Consolidation, 1, result, Some(makespan));
            if !result.is_feasible() {
                return Ok(ScheduleOutcome::infeasible(history));
            }
            makespan = objective_u32(result, makespan);
        }

        // Mode refinement
        info!("refining modes in batches of {}", self.config.mode_batch);
        for (i, batch) in all_jobs.chunks(self.config.mode_batch).enumerate() {
            if ctx.is_exhausted() {
                info!("budget exhausted, skipping remaining refinement");
                break;
            }
            let (free, fixed): (Vec<IndexTuple>, Vec<IndexTuple>) = all_modes
                .iter()
                .cloned()
                .partition(|jm| batch.iter().any(|&j| jm[0] == Key::from(j)));
            let partition = Partition::new()
                .with_free_keys(JOBS, all_jobs.iter().copied())
                .with_free_keys(PERIODS, 0..=makespan)
                .with_free(JOBS_MODES, free)
                .with_fixed(JOBS_MODES, fixed);
            it.set_limits(self.limits(ctx));
            let result = it.iterate(&partition, &[])?;
            record(&mut history, Phase::ModeRefinement, i + 1, result, Some(makespan));
            if !result.is_feasible() {
                return Ok(ScheduleOutcome::infeasible(history));
            }
            makespan = objective_u32(result, makespan);
        }
        shrink_periods(&mut it, makespan)?;

        // Final solve
        info!("final solve over {} periods", makespan + 1);
        it.release_all();
        it.set_limits(self.limits(ctx));
        let result = it.solve_once();
        record(&mut history, Phase::Final, 1, result, Some(makespan));
        if !result.is_feasible() {
            return Ok(ScheduleOutcome::infeasible(history));
        }

        let solution = decode_solution(it.model());
        let verifier = Verifier::new(instance, &solution);
        let report = verifier.verify();
        if !report.is_feasible() {
            warn!("extracted schedule fails {:?}", report.failed_checks());
        }
        let makespan = verifier.objective();
        info!(
            "done in {:.1?}: makespan {}, {} sub-solves",
            ctx.elapsed(),
            makespan,
            history.len()
        );
        Ok(ScheduleOutcome {
            status: result.status,
            makespan: u32::try_from(makespan).ok(),
            solution,
            history,
            report: Some(report),
        })
    }

    /// Runs the windows. Returns the makespan, or `None` when a window fails.
    fn grow_windows(
        &self,
        instance: &Instance,
        seeded: &BTreeMap<JobId, ModeId>,
        it: &mut DecompositionIterator<&E>,
        ctx: &SolveContext,
        history: &mut Vec<IterationRecord>,
    ) -> Result<Option<u32>, SchedulerError> {
        it.deactivate_constraint(PRECEDENCE, None)?;
        it.deactivate_constraint(NON_RENEWABLE_CAPACITY, None)?;

        let job_ids = instance.construction_order();
        let edges = instance.precedence_edges();
        let mut known: Vec<JobId> = Vec::new();
        let mut makespan: u32 = 0;

        for (i, window) in job_ids.chunks(self.config.window_step).enumerate() {
            let horizon = self.config.horizon_slack
                + makespan
                + window
                    .iter()
                    .filter_map(|&j| instance.max_duration(j))
                    .sum::<u32>();
            let mode_of = |jobs: &[JobId]| -> Vec<IndexTuple> {
                jobs.iter()
                    .filter_map(|&j| seeded.get(&j).map(|&m| job_mode(j, m)))
                    .collect()
            };
            let partition = Partition::new()
                .with_free_keys(JOBS, window.iter().copied())
                .with_fixed_keys(JOBS, known.iter().copied())
                .with_fixed_keys(PERIODS, 0..horizon)
                .with_free(JOBS_MODES, mode_of(window))
                .with_fixed(JOBS_MODES, mode_of(&known));

            known.extend_from_slice(window);
            let active: Vec<IndexTuple> = edges
                .iter()
                .filter(|(a, b)| known.contains(a) && known.contains(b))
                .map(|&(a, b)| vec![Key::from(a), Key::from(b)])
                .collect();
            it.activate_constraint(PRECEDENCE, Some(&active))?;

            it.set_limits(self.limits(ctx));
            let result = it.iterate(&partition, &[PRECEDENCE, NON_RENEWABLE_CAPACITY])?;
            record(history, Phase::Window, i + 1, result, Some(horizon));
            if !result.is_feasible() {
                warn!("window {} ({} jobs) failed", i + 1, window.len());
                return Ok(None);
            }
            makespan = objective_u32(result, makespan);
            debug!("window {}: jobs {:?}, makespan {}", i + 1, window, makespan);
        }
        Ok(Some(makespan))
    }

    fn limits(&self, ctx: &SolveContext) -> SolveLimits {
        SolveLimits::new(ctx.cap(self.config.limits().time_limit))
    }
}

fn record(
    history: &mut Vec<IterationRecord>,
    phase: Phase,
    iteration: usize,
    result: IterationResult,
    horizon: Option<u32>,
) {
    debug!("{phase} {iteration}: {result}");
    history.push(IterationRecord {
        phase,
        iteration,
        status: result.status,
        objective: result.objective,
        horizon,
    });
}

fn objective_u32(result: IterationResult, fallback: u32) -> u32 {
    result
        .objective
        .and_then(|o| u32::try_from(o).ok())
        .unwrap_or(fallback)
}

/// Shrinks the period set to `0..=makespan`.
fn shrink_periods<E: OptimizationEngine>(
    it: &mut DecompositionIterator<E>,
    makespan: u32,
) -> Result<(), SchedulerError> {
    let keep: Vec<IndexTuple> = (0..=makespan).map(|p| vec![Key::from(p)]).collect();
    it.shrink_index_set(PERIODS, &keep)?;
    Ok(())
}
