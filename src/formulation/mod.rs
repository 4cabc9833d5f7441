//! Time-indexed MRCPSP formulation.
//!
//! Bridges the domain models to the explicit [`ConstraintModel`] of
//! [`crate::decomposition`]. Two layouts are built:
//!
//! - **Schedule model**: binary `start[job, period]`, binary
//!   `mode[job, mode]`, integer `makespan`; minimizes the makespan.
//! - **Mode-selection model**: binary `mode[job, mode]` only; one mode per
//!   job within non-renewable capacities, minimizing the critical path
//!   under the chosen durations.
//!
//! Only modes whose requirements fit every resource capacity are offered.
//!
//! # Reference
//! - Talbot (1982), "Resource-Constrained Project Scheduling with Time-Resource Tradeoffs"
//! - Pritsker et al. (1969), "Multiproject Scheduling with Limited Resources: A Zero-One Programming Approach"

mod search;

pub use search::BranchAndBoundEngine;

use std::collections::BTreeMap;

use crate::decomposition::{ConstraintModel, Domain, IndexSet, IndexTuple, Key, VarRef};
use crate::error::DecompositionError;
use crate::models::{Instance, JobId, ModeId, Solution};

/// Set of job keys.
pub const JOBS: &str = "Jobs";
/// Set of period keys `0..horizon`.
pub const PERIODS: &str = "Periods";
/// Set of eligible `(job, mode)` pairs.
pub const JOBS_MODES: &str = "JobsModes";
/// Set of `(predecessor, successor)` pairs.
pub const PRECEDENCE_EDGES: &str = "PrecedenceEdges";
/// Set of renewable resource keys.
pub const RENEWABLE: &str = "RenewableResources";
/// Set of non-renewable resource keys.
pub const NON_RENEWABLE: &str = "NonRenewableResources";

/// Parameter `duration[job, mode]`.
pub const DURATION: &str = "duration";
/// Parameter `need[job, mode, resource]`.
pub const NEED: &str = "need";
/// Parameter `capacity[resource]`.
pub const CAPACITY: &str = "capacity";

/// Variable `start[job, period]`.
pub const START: &str = "start";
/// Variable `mode[job, mode]`.
pub const MODE: &str = "mode";
/// Scalar variable `makespan`.
pub const MAKESPAN: &str = "makespan";

/// Each job starts exactly once.
pub const ONE_START: &str = "one_start";
/// Each job runs in exactly one mode.
pub const ONE_MODE: &str = "one_mode";
/// Successor starts after predecessor finishes.
pub const PRECEDENCE: &str = "precedence";
/// Per-period renewable capacity.
pub const RENEWABLE_CAPACITY: &str = "renewable_capacity";
/// Cumulative non-renewable capacity.
pub const NON_RENEWABLE_CAPACITY: &str = "non_renewable_capacity";
/// Makespan covers every job's finish.
pub const MAKESPAN_BOUND: &str = "makespan_bound";

/// Builds constraint models from an [`Instance`].
///
/// # Example
/// ```
/// use u_mrcpsp::formulation::{MrcpspModelBuilder, START};
/// use u_mrcpsp::models::{Instance, Job, Mode, Resource};
///
/// let instance = Instance::new(
///     vec![Job::new(1).with_mode(1, Mode::new(2).with_need("R1", 1))],
///     vec![Resource::renewable("R1", 1)],
/// )
/// .unwrap();
/// let model = MrcpspModelBuilder::new(&instance).build_schedule(4).unwrap();
/// assert_eq!(model.variable(START).unwrap().entries.len(), 4);
/// ```
pub struct MrcpspModelBuilder<'a> {
    instance: &'a Instance,
}

impl<'a> MrcpspModelBuilder<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        Self { instance }
    }

    /// Eligible `(job, mode)` pairs: every requirement fits its capacity.
    pub fn eligible_modes(&self) -> Vec<(JobId, ModeId)> {
        self.instance
            .jobs()
            .iter()
            .flat_map(|job| {
                job.mode_ids()
                    .filter(|&m| self.instance.mode_fits_capacity(job, m))
                    .map(move |m| (job.id, m))
            })
            .collect()
    }

    /// Builds the time-indexed schedule model over periods `0..periods`.
    pub fn build_schedule(&self, periods: u32) -> Result<ConstraintModel, DecompositionError> {
        let mut model = ConstraintModel::new("mrcpsp");
        self.add_common(&mut model);
        model.add_set(IndexSet::simple(PERIODS, (0..periods).map(i64::from)));

        model.add_variable(START, &[JOBS, PERIODS], Domain::Binary)?;
        model.add_variable(MODE, &[JOBS_MODES], Domain::Binary)?;
        model.add_variable(MAKESPAN, &[], Domain::NonNegativeInteger)?;

        model.add_constraint(ONE_START, &[JOBS], one_start_scope, one_start_holds)?;
        model.add_constraint(ONE_MODE, &[JOBS], one_mode_scope, one_mode_holds)?;
        model.add_constraint(PRECEDENCE, &[PRECEDENCE_EDGES], precedence_scope, precedence_holds)?;
        model.add_constraint(
            RENEWABLE_CAPACITY,
            &[RENEWABLE, PERIODS],
            renewable_scope,
            renewable_holds,
        )?;
        model.add_constraint(
            NON_RENEWABLE_CAPACITY,
            &[NON_RENEWABLE],
            non_renewable_scope,
            non_renewable_holds,
        )?;
        model.add_constraint(MAKESPAN_BOUND, &[JOBS], makespan_scope, makespan_holds)?;
        model.set_objective(makespan_objective);
        Ok(model)
    }

    /// Builds the mode-selection model.
    pub fn build_mode_selection(&self) -> Result<ConstraintModel, DecompositionError> {
        let mut model = ConstraintModel::new("mode_selection");
        self.add_common(&mut model);

        model.add_variable(MODE, &[JOBS_MODES], Domain::Binary)?;
        model.add_constraint(ONE_MODE, &[JOBS], one_mode_scope, one_mode_holds)?;
        model.add_constraint(
            NON_RENEWABLE_CAPACITY,
            &[NON_RENEWABLE],
            non_renewable_scope,
            non_renewable_holds,
        )?;
        model.set_objective(critical_path_objective);
        Ok(model)
    }

    /// Sets, parameters and resource sets shared by both layouts.
    fn add_common(&self, model: &mut ConstraintModel) {
        let instance = self.instance;
        let eligible = self.eligible_modes();

        model.add_set(IndexSet::simple(JOBS, instance.job_ids()));
        model.add_set(IndexSet::new(
            JOBS_MODES,
            2,
            eligible.iter().map(|&(j, m)| job_mode(j, m)).collect(),
        ));
        model.add_set(IndexSet::new(
            PRECEDENCE_EDGES,
            2,
            instance
                .precedence_edges()
                .into_iter()
                .map(|(a, b)| vec![Key::from(a), Key::from(b)])
                .collect(),
        ));
        model.add_set(IndexSet::simple(
            RENEWABLE,
            instance.renewable_resources().iter().map(|r| r.id.clone()),
        ));
        model.add_set(IndexSet::simple(
            NON_RENEWABLE,
            instance.non_renewable_resources().iter().map(|r| r.id.clone()),
        ));

        let mut durations = BTreeMap::new();
        let mut needs = BTreeMap::new();
        for &(j, m) in &eligible {
            let Some(mode) = instance.job(j).and_then(|job| job.mode(m)) else {
                continue;
            };
            durations.insert(job_mode(j, m), i64::from(mode.duration));
            for (resource, &need) in &mode.needs {
                if need > 0 {
                    let mut idx = job_mode(j, m);
                    idx.push(Key::from(resource.as_str()));
                    needs.insert(idx, i64::from(need));
                }
            }
        }
        let capacities = instance
            .resources()
            .iter()
            .map(|r| (vec![Key::from(r.id.as_str())], i64::from(r.capacity)))
            .collect();

        model.add_param(DURATION, durations, 0);
        model.add_param(NEED, needs, 0);
        model.add_param(CAPACITY, capacities, 0);
    }
}

/// Index tuple of a `(job, mode)` pair.
pub fn job_mode(job: JobId, mode: ModeId) -> IndexTuple {
    vec![Key::from(job), Key::from(mode)]
}

/// Index tuple of a `(job, period)` pair.
pub fn job_period(job: JobId, period: u32) -> IndexTuple {
    vec![Key::from(job), Key::from(period)]
}

/// Eligible modes of a job, as `(job, mode)` tuples.
fn modes_of<'m>(model: &'m ConstraintModel, job: &'m Key) -> impl Iterator<Item = &'m IndexTuple> + 'm {
    model.members(JOBS_MODES).iter().filter(move |jm| &jm[0] == job)
}

/// First period of a job: Σ p·start[j, p].
fn begin(model: &ConstraintModel, job: &Key) -> i64 {
    model
        .members(PERIODS)
        .iter()
        .map(|p| {
            let idx = [std::slice::from_ref(job), p.as_slice()].concat();
            p[0].as_int().unwrap_or(0) * model.value(START, &idx)
        })
        .sum()
}

/// Duration of a job under its selected mode: Σ d·mode[j, m].
fn chosen_duration(model: &ConstraintModel, job: &Key) -> i64 {
    modes_of(model, job)
        .map(|jm| model.param_value(DURATION, jm) * model.value(MODE, jm))
        .sum()
}

fn start_refs(model: &ConstraintModel, job: &Key) -> Vec<VarRef> {
    model
        .members(PERIODS)
        .iter()
        .map(|p| VarRef::new(START, [std::slice::from_ref(job), p.as_slice()].concat()))
        .collect()
}

fn mode_refs(model: &ConstraintModel, job: &Key) -> Vec<VarRef> {
    modes_of(model, job)
        .map(|jm| VarRef::new(MODE, jm.clone()))
        .collect()
}

fn sum_of(model: &ConstraintModel, refs: &[VarRef]) -> i64 {
    refs.iter().map(|r| model.value(&r.variable, &r.index)).sum()
}

fn one_start_scope(model: &ConstraintModel, idx: &[Key]) -> Vec<VarRef> {
    start_refs(model, &idx[0])
}

fn one_start_holds(model: &ConstraintModel, idx: &[Key]) -> bool {
    sum_of(model, &start_refs(model, &idx[0])) == 1
}

fn one_mode_scope(model: &ConstraintModel, idx: &[Key]) -> Vec<VarRef> {
    mode_refs(model, &idx[0])
}

fn one_mode_holds(model: &ConstraintModel, idx: &[Key]) -> bool {
    sum_of(model, &mode_refs(model, &idx[0])) == 1
}

fn precedence_scope(model: &ConstraintModel, idx: &[Key]) -> Vec<VarRef> {
    let mut refs = start_refs(model, &idx[0]);
    refs.extend(mode_refs(model, &idx[0]));
    refs.extend(start_refs(model, &idx[1]));
    refs
}

fn precedence_holds(model: &ConstraintModel, idx: &[Key]) -> bool {
    let (before, after) = (&idx[0], &idx[1]);
    begin(model, before) + chosen_duration(model, before) <= begin(model, after)
}

/// Jobs/modes consuming resource `r`, with their need.
fn consumers<'m>(model: &'m ConstraintModel, resource: &'m Key) -> impl Iterator<Item = (&'m IndexTuple, i64)> + 'm {
    model.members(JOBS_MODES).iter().filter_map(move |jm| {
        let mut idx = jm.clone();
        idx.push(resource.clone());
        let need = model.param_value(NEED, &idx);
        (need > 0).then_some((jm, need))
    })
}

/// Start periods `q` with `p - d < q <= p`, i.e. those covering period `p`.
fn covering_starts(model: &ConstraintModel, jm: &[Key], period: i64) -> Vec<VarRef> {
    let duration = model.param_value(DURATION, jm);
    (period - duration + 1..=period)
        .filter(|&q| q >= 0)
        .map(|q| VarRef::new(START, vec![jm[0].clone(), Key::Int(q)]))
        .filter(|r| model.variable(START).is_some_and(|v| v.entries.contains_key(&r.index)))
        .collect()
}

fn renewable_scope(model: &ConstraintModel, idx: &[Key]) -> Vec<VarRef> {
    let period = idx[1].as_int().unwrap_or(0);
    consumers(model, &idx[0])
        .flat_map(|(jm, _)| {
            let mut refs = covering_starts(model, jm, period);
            refs.push(VarRef::new(MODE, jm.clone()));
            refs
        })
        .collect()
}

fn renewable_holds(model: &ConstraintModel, idx: &[Key]) -> bool {
    let period = idx[1].as_int().unwrap_or(0);
    let usage: i64 = consumers(model, &idx[0])
        .filter(|(jm, _)| model.value(MODE, jm) == 1)
        .map(|(jm, need)| need * sum_of(model, &covering_starts(model, jm, period)))
        .sum();
    usage <= model.param_value(CAPACITY, &idx[..1])
}

fn non_renewable_scope(model: &ConstraintModel, idx: &[Key]) -> Vec<VarRef> {
    consumers(model, &idx[0])
        .map(|(jm, _)| VarRef::new(MODE, jm.clone()))
        .collect()
}

fn non_renewable_holds(model: &ConstraintModel, idx: &[Key]) -> bool {
    let usage: i64 = consumers(model, &idx[0])
        .map(|(jm, need)| need * model.value(MODE, jm))
        .sum();
    usage <= model.param_value(CAPACITY, idx)
}

fn makespan_scope(model: &ConstraintModel, idx: &[Key]) -> Vec<VarRef> {
    let mut refs = vec![VarRef::new(MAKESPAN, Vec::new())];
    refs.extend(start_refs(model, &idx[0]));
    refs.extend(mode_refs(model, &idx[0]));
    refs
}

fn makespan_holds(model: &ConstraintModel, idx: &[Key]) -> bool {
    let job = &idx[0];
    model.value(MAKESPAN, &[]) >= begin(model, job) + chosen_duration(model, job)
}

fn makespan_objective(model: &ConstraintModel) -> i64 {
    model.value(MAKESPAN, &[])
}

fn critical_path_objective(model: &ConstraintModel) -> i64 {
    let durations: BTreeMap<&Key, i64> = model
        .members(JOBS)
        .iter()
        .map(|j| (&j[0], chosen_duration(model, &j[0])))
        .collect();
    let edges: Vec<(&Key, &Key)> = model
        .members(PRECEDENCE_EDGES)
        .iter()
        .map(|e| (&e[0], &e[1]))
        .collect();
    critical_path(&durations, &edges)
}

/// Longest path through the precedence graph, weighted by job durations.
///
/// Relaxes earliest finishes until stable; on a cyclic graph stops after
/// one pass per job.
pub fn critical_path<K: Ord>(durations: &BTreeMap<K, i64>, edges: &[(K, K)]) -> i64 {
    let mut finish: BTreeMap<&K, i64> = durations.iter().map(|(k, &d)| (k, d)).collect();
    for _ in 0..durations.len() {
        let mut changed = false;
        for (a, b) in edges {
            let (Some(&fa), Some(&db)) = (finish.get(a), durations.get(b)) else {
                continue;
            };
            if let Some(fb) = finish.get_mut(b) {
                if fa + db > *fb {
                    *fb = fa + db;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    finish.values().copied().max().unwrap_or(0)
}

/// Selected mode per job (entries of `mode` equal to 1).
pub fn decode_modes(model: &ConstraintModel) -> BTreeMap<JobId, ModeId> {
    model
        .variable(MODE)
        .map(|v| {
            v.entries
                .iter()
                .filter(|(_, e)| e.value == 1)
                .filter_map(|(idx, _)| Some((key_u32(&idx[0])?, key_u32(&idx[1])?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Start period per job (entries of `start` equal to 1).
pub fn decode_starts(model: &ConstraintModel) -> BTreeMap<JobId, u32> {
    model
        .variable(START)
        .map(|v| {
            v.entries
                .iter()
                .filter(|(_, e)| e.value == 1)
                .filter_map(|(idx, _)| Some((key_u32(&idx[0])?, key_u32(&idx[1])?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Reads `(start, mode)` per job. Jobs missing either are left out.
pub fn decode_solution(model: &ConstraintModel) -> Solution {
    let modes = decode_modes(model);
    let mut solution = Solution::new();
    for (job, period) in decode_starts(model) {
        if let Some(&mode) = modes.get(&job) {
            solution.assign(job, period, mode);
        }
    }
    solution
}

fn key_u32(key: &Key) -> Option<u32> {
    key.as_int().and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, Mode, Resource};

    fn chain() -> Instance {
        let job = |id: u32| Job::new(id).with_mode(1, Mode::new(1).with_need("R1", 1));
        Instance::new(
            vec![
                job(1).with_successor(2),
                job(2).with_successor(3),
                job(3),
            ],
            vec![Resource::renewable("R1", 1)],
        )
        .unwrap()
    }

    fn multi_mode() -> Instance {
        Instance::new(
            vec![
                Job::new(1)
                    .with_mode(1, Mode::new(3).with_need("N1", 1))
                    .with_mode(2, Mode::new(1).with_need("N1", 4))
                    .with_mode(3, Mode::new(1).with_need("N1", 9)),
                Job::new(2).with_mode(1, Mode::new(2).with_need("N1", 2)),
            ],
            vec![Resource::non_renewable("N1", 6)],
        )
        .unwrap()
    }

    fn set_schedule(model: &mut ConstraintModel, rows: &[(u32, u32, u32)], makespan: i64) {
        for &(j, p, m) in rows {
            model.set_value(START, &job_period(j, p), 1).unwrap();
            model.set_value(MODE, &job_mode(j, m), 1).unwrap();
        }
        model.set_value(MAKESPAN, &[], makespan).unwrap();
    }

    #[test]
    fn test_eligible_modes_filter_capacity() {
        let instance = multi_mode();
        let builder = MrcpspModelBuilder::new(&instance);
        assert_eq!(builder.eligible_modes(), vec![(1, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_schedule_model_shape() {
        let instance = chain();
        let model = MrcpspModelBuilder::new(&instance).build_schedule(5).unwrap();

        assert_eq!(model.variable(START).unwrap().entries.len(), 15);
        assert_eq!(model.variable(MODE).unwrap().entries.len(), 3);
        assert_eq!(model.variable(MAKESPAN).unwrap().entries.len(), 1);
        assert_eq!(model.constraint(PRECEDENCE).unwrap().active_count(), 2);
        assert_eq!(model.constraint(RENEWABLE_CAPACITY).unwrap().active_count(), 5);
        assert_eq!(model.constraint(NON_RENEWABLE_CAPACITY).unwrap().active_count(), 0);
    }

    #[test]
    fn test_feasible_schedule_satisfies_model() {
        let instance = chain();
        let mut model = MrcpspModelBuilder::new(&instance).build_schedule(5).unwrap();
        set_schedule(&mut model, &[(1, 0, 1), (2, 1, 1), (3, 2, 1)], 3);

        assert!(model.violated_constraints().is_empty());
        assert_eq!(model.objective_value(), 3);

        let solution = decode_solution(&model);
        assert_eq!(solution.start(3), Some(2));
        assert_eq!(solution.mode(2), Some(1));
    }

    #[test]
    fn test_overlap_violates_model() {
        let instance = chain();
        let mut model = MrcpspModelBuilder::new(&instance).build_schedule(5).unwrap();
        set_schedule(&mut model, &[(1, 0, 1), (2, 0, 1), (3, 2, 1)], 2);

        let violated: Vec<String> = model.violated_constraints().into_iter().map(|(c, _)| c).collect();
        assert!(violated.contains(&PRECEDENCE.to_string()));
        assert!(violated.contains(&RENEWABLE_CAPACITY.to_string()));
        assert!(violated.contains(&MAKESPAN_BOUND.to_string()));
    }

    #[test]
    fn test_renewable_scope_covers_window() {
        let instance = Instance::new(
            vec![Job::new(1).with_mode(1, Mode::new(3).with_need("R1", 1))],
            vec![Resource::renewable("R1", 1)],
        )
        .unwrap();
        let model = MrcpspModelBuilder::new(&instance).build_schedule(6).unwrap();
        let scope = renewable_scope(&model, &[Key::from("R1"), Key::Int(4)]);

        let starts: Vec<i64> = scope
            .iter()
            .filter(|r| r.variable == START)
            .filter_map(|r| r.index[1].as_int())
            .collect();
        assert_eq!(starts, vec![2, 3, 4]);
        assert!(scope.contains(&VarRef::new(MODE, job_mode(1, 1))));
    }

    #[test]
    fn test_mode_selection_model() {
        let instance = multi_mode();
        let mut model = MrcpspModelBuilder::new(&instance).build_mode_selection().unwrap();
        assert!(model.variable(START).is_none());

        model.set_value(MODE, &job_mode(1, 2), 1).unwrap();
        model.set_value(MODE, &job_mode(2, 1), 1).unwrap();
        assert!(model.violated_constraints().is_empty());
        // independent jobs: the longest one
        assert_eq!(model.objective_value(), 2);

        model.set_value(MODE, &job_mode(1, 2), 0).unwrap();
        model.set_value(MODE, &job_mode(1, 1), 1).unwrap();
        assert_eq!(model.objective_value(), 3);
        assert_eq!(decode_modes(&model), BTreeMap::from([(1, 1), (2, 1)]));
    }

    #[test]
    fn test_critical_path() {
        let durations = BTreeMap::from([(1, 2), (2, 3), (3, 1), (4, 5)]);
        assert_eq!(critical_path(&durations, &[(1, 2), (2, 3)]), 6);
        assert_eq!(critical_path(&durations, &[(1, 2), (2, 3), (1, 4)]), 7);
        assert_eq!(critical_path(&BTreeMap::<u32, i64>::new(), &[]), 0);
    }
}
