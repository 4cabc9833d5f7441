//! Branch-and-bound engine for the MRCPSP model layouts.
//!
//! Reads the current state of a model built by
//! [`MrcpspModelBuilder`](super::MrcpspModelBuilder): fixed entries are
//! constants, free entries are decisions, inactive constraint instances are
//! skipped. Jobs whose start and mode are both determined are placed first;
//! the others are branched on in precedence order (mode, then start period,
//! ascending).
//!
//! # Pruning
//! - Incumbent: the warm start when it satisfies every active constraint,
//!   then every improving leaf.
//! - Makespan layout: earliest start plus the longest tail of minimum
//!   durations through active precedence edges.
//! - Mode-selection layout: critical path with minimum durations for the
//!   undecided jobs.
//! - Non-renewable capacity: usage so far plus the minimum need of the
//!   undecided jobs.
//!
//! # Reference
//! - Sprecher & Drexl (1998), "Multi-mode resource-constrained project scheduling by a simple, general and powerful sequencing algorithm"
//! - Demeulemeester & Herroelen (1992), "A Branch-and-Bound Procedure for the Multiple Resource-Constrained Project Scheduling Problem"

use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use super::{
    CAPACITY, DURATION, JOBS, JOBS_MODES, MAKESPAN, MAKESPAN_BOUND, MODE, NEED, NON_RENEWABLE,
    NON_RENEWABLE_CAPACITY, ONE_MODE, ONE_START, PERIODS, PRECEDENCE, PRECEDENCE_EDGES, RENEWABLE,
    RENEWABLE_CAPACITY, START,
};
use crate::decomposition::{
    ConstraintModel, EngineSolution, IndexTuple, Key, OptimizationEngine, SolveLimits, SolveStatus,
    VariableEntry, WarmStart,
};

/// Nodes between two deadline checks.
const CLOCK_INTERVAL: u64 = 256;

/// Pressure of a mode on an exhausted non-renewable resource.
const EXHAUSTED_PRESSURE: f64 = 1000.0;

/// Exact search over the schedule and mode-selection layouts.
///
/// Stops at the per-call time limit, reporting
/// [`SolveStatus::FeasibleWithinLimit`] with the incumbent or
/// [`SolveStatus::Unknown`] without one.
#[derive(Debug, Clone, Default)]
pub struct BranchAndBoundEngine {
    node_limit: Option<u64>,
}

impl BranchAndBoundEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops after this many nodes, as if the time limit were hit.
    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.node_limit = Some(nodes);
        self
    }
}

impl OptimizationEngine for BranchAndBoundEngine {
    fn solve(&self, model: &ConstraintModel, warm_start: &WarmStart, limits: &SolveLimits) -> EngineSolution {
        let Some(mut search) = Search::from_model(model) else {
            return EngineSolution::without_values(SolveStatus::Infeasible);
        };
        search.deadline = Instant::now().checked_add(limits.time_limit);
        search.node_limit = self.node_limit;

        let status = search.run(warm_start);
        debug!(
            "{}: {} after {} nodes, best {:?}",
            model.name, status, search.nodes, search.best_objective
        );
        match &search.best {
            Some(best) if status.is_feasible() => EngineSolution {
                status,
                objective: search.best_objective,
                values: search.write_back(model, best),
            },
            _ => EngineSolution::without_values(status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Minimize the makespan variable.
    Makespan,
    /// Minimize the critical path under the chosen durations.
    CriticalPath,
}

#[derive(Debug, Clone)]
struct ModeData {
    key: IndexTuple,
    duration: i64,
    renewable: Vec<i64>,
    non_renewable: Vec<i64>,
}

/// `(start, mode)` choice of one job. `None` leaves every entry at 0.
type Choice = (Option<i64>, Option<usize>);

#[derive(Debug, Clone)]
struct JobData {
    key: Key,
    modes: Vec<ModeData>,
    starts: Vec<Option<i64>>,
    mode_domain: Vec<Option<usize>>,
    bounds_makespan: bool,
}

impl JobData {
    fn duration(&self, mode: Option<usize>) -> i64 {
        mode.map(|m| self.modes[m].duration).unwrap_or(0)
    }

    fn min_duration(&self) -> i64 {
        self.mode_domain
            .iter()
            .map(|&m| self.duration(m))
            .min()
            .unwrap_or(0)
    }

    fn min_start(&self) -> i64 {
        self.starts.iter().map(|s| s.unwrap_or(0)).min().unwrap_or(0)
    }

    fn is_decided(&self) -> bool {
        self.starts.len() == 1 && self.mode_domain.len() == 1
    }
}

struct Search {
    layout: Layout,
    jobs: Vec<JobData>,
    renewable_capacity: Vec<i64>,
    /// Active renewable periods, per resource.
    renewable_active: Vec<Vec<bool>>,
    non_renewable_capacity: Vec<Option<i64>>,
    /// Active precedence edges (job positions).
    edges: Vec<(usize, usize)>,
    /// All precedence edges, for the critical-path objective.
    all_edges: Vec<(usize, usize)>,
    topo: Vec<usize>,
    fixed_makespan: Option<i64>,
    horizon: usize,

    order: Vec<usize>,
    tail: Vec<Option<i64>>,
    placed: Vec<Option<Choice>>,
    renewable_usage: Vec<Vec<i64>>,
    non_renewable_usage: Vec<i64>,

    best: Option<Vec<Choice>>,
    best_objective: Option<i64>,
    nodes: u64,
    node_limit: Option<u64>,
    deadline: Option<Instant>,
    stopped: bool,
}

impl Search {
    /// Decodes the model. `None` when some job has an empty domain.
    fn from_model(model: &ConstraintModel) -> Option<Self> {
        let layout = if model.variable(START).is_some() {
            Layout::Makespan
        } else {
            Layout::CriticalPath
        };

        let renewable: Vec<&Key> = model.members(RENEWABLE).iter().map(|r| &r[0]).collect();
        let non_renewable: Vec<&Key> = model.members(NON_RENEWABLE).iter().map(|r| &r[0]).collect();
        let periods: Vec<i64> = model
            .members(PERIODS)
            .iter()
            .filter_map(|p| p[0].as_int())
            .collect();
        let last_period = periods.iter().copied().max().unwrap_or(0).max(0);

        let mut jobs = Vec::new();
        let mut position = HashMap::new();
        for member in model.members(JOBS) {
            let key = member[0].clone();
            position.insert(key.clone(), jobs.len());
            jobs.push(decode_job(model, &key, &renewable, &non_renewable, &periods, layout)?);
        }

        let max_duration = jobs
            .iter()
            .flat_map(|j| j.modes.iter().map(|m| m.duration))
            .max()
            .unwrap_or(0);
        let horizon = usize::try_from(last_period + max_duration + 1).unwrap_or(0);

        let renewable_capacity: Vec<i64> = renewable
            .iter()
            .map(|r| model.param_value(CAPACITY, std::slice::from_ref(*r)))
            .collect();
        let renewable_active = renewable
            .iter()
            .map(|r| {
                let mut active = vec![false; horizon];
                for &p in &periods {
                    let idx = vec![(*r).clone(), Key::Int(p)];
                    if model.is_active(RENEWABLE_CAPACITY, &idx) {
                        if let Some(slot) = usize::try_from(p).ok().and_then(|p| active.get_mut(p)) {
                            *slot = true;
                        }
                    }
                }
                active
            })
            .collect();
        let non_renewable_capacity = non_renewable
            .iter()
            .map(|r| {
                model
                    .is_active(NON_RENEWABLE_CAPACITY, std::slice::from_ref(*r))
                    .then(|| model.param_value(CAPACITY, std::slice::from_ref(*r)))
            })
            .collect();

        let mut edges = Vec::new();
        let mut all_edges = Vec::new();
        for edge in model.members(PRECEDENCE_EDGES) {
            let (Some(&a), Some(&b)) = (position.get(&edge[0]), position.get(&edge[1])) else {
                continue;
            };
            all_edges.push((a, b));
            if model.is_active(PRECEDENCE, edge) {
                edges.push((a, b));
            }
        }

        let fixed_makespan = model
            .variable(MAKESPAN)
            .and_then(|v| v.entries.get(&IndexTuple::new()))
            .filter(|e| e.fixed)
            .map(|e| e.value);

        let n = jobs.len();
        let mut search = Self {
            layout,
            topo: topological_order(n, &all_edges),
            jobs,
            renewable_capacity,
            renewable_active,
            non_renewable_capacity,
            edges,
            all_edges,
            fixed_makespan,
            horizon,
            order: Vec::new(),
            tail: Vec::new(),
            placed: vec![None; n],
            renewable_usage: vec![vec![0; horizon]; renewable.len()],
            non_renewable_usage: vec![0; non_renewable.len()],
            best: None,
            best_objective: None,
            nodes: 0,
            node_limit: None,
            deadline: None,
            stopped: false,
        };
        search.order = search
            .topo
            .iter()
            .copied()
            .filter(|&j| !search.jobs[j].is_decided())
            .collect();
        search.tail = search.tails();
        Some(search)
    }

    /// Longest chain of minimum durations from each job to a job bounding
    /// the makespan, along active edges.
    fn tails(&self) -> Vec<Option<i64>> {
        let mut tail: Vec<Option<i64>> = vec![None; self.jobs.len()];
        for &j in self.topo.iter().rev() {
            let own = self.jobs[j].min_duration();
            let mut best = self.jobs[j].bounds_makespan.then_some(own);
            for &(a, b) in &self.edges {
                if a == j {
                    if let Some(t) = tail[b] {
                        best = Some(best.map_or(own + t, |v| v.max(own + t)));
                    }
                }
            }
            tail[j] = best;
        }
        tail
    }

    fn run(&mut self, warm_start: &WarmStart) -> SolveStatus {
        let fixed: Vec<usize> = (0..self.jobs.len()).filter(|&j| self.jobs[j].is_decided()).collect();
        for &j in &fixed {
            let choice = (self.jobs[j].starts[0], self.jobs[j].mode_domain[0]);
            if !self.fits(j, choice) {
                return SolveStatus::Infeasible;
            }
            self.place(j, choice);
        }

        if let Some(incumbent) = self.decode_warm_start(warm_start) {
            if let Some(objective) = self.evaluate(&incumbent) {
                self.best = Some(incumbent);
                self.best_objective = Some(objective);
            }
        }

        self.branch(0);

        match (self.stopped, self.best.is_some()) {
            (false, true) => SolveStatus::Optimal,
            (false, false) => SolveStatus::Infeasible,
            (true, true) => SolveStatus::FeasibleWithinLimit,
            (true, false) => SolveStatus::Unknown,
        }
    }

    fn branch(&mut self, depth: usize) {
        self.nodes += 1;
        if self.out_of_budget() {
            self.stopped = true;
            return;
        }

        if depth == self.order.len() {
            let objective = self.objective();
            if self.fixed_makespan.is_some_and(|m| objective > m) {
                return;
            }
            if self.best_objective.map_or(true, |b| objective < b) {
                self.best_objective = Some(objective);
                self.best = Some(self.current());
            }
            return;
        }

        if self.best_objective.is_some_and(|b| self.lower_bound() >= b) {
            return;
        }

        let j = self.order[depth];
        for mode in self.mode_order(j) {
            if !self.non_renewable_fits(j, mode, depth) {
                continue;
            }
            let duration = self.jobs[j].duration(mode);
            let succ_tail = self.successor_tail(j);
            let starts = self.jobs[j].starts.clone();
            for start in starts {
                if let (Some(best), Some(tail)) = (self.best_objective, succ_tail) {
                    if self.layout == Layout::Makespan && start.unwrap_or(0) + duration + tail >= best {
                        break;
                    }
                }
                let choice = (start, mode);
                if !self.fits(j, choice) {
                    continue;
                }
                self.place(j, choice);
                self.branch(depth + 1);
                self.unplace(j);
                if self.stopped {
                    return;
                }
            }
        }
    }

    fn out_of_budget(&self) -> bool {
        if self.node_limit.is_some_and(|limit| self.nodes > limit) {
            return true;
        }
        self.nodes % CLOCK_INTERVAL == 0 && self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Modes to try: shortest first for the schedule layout, lowest
    /// non-renewable pressure first for the mode-selection layout.
    fn mode_order(&self, j: usize) -> Vec<Option<usize>> {
        let job = &self.jobs[j];
        let mut modes = job.mode_domain.clone();
        match self.layout {
            Layout::Makespan => modes.sort_by_key(|&m| (job.duration(m), m)),
            Layout::CriticalPath => {
                let pressure = |m: Option<usize>| -> f64 {
                    let Some(m) = m else { return 0.0 };
                    job.modes[m]
                        .non_renewable
                        .iter()
                        .enumerate()
                        .filter(|(_, &need)| need > 0)
                        .map(|(r, &need)| {
                            let left = self.non_renewable_capacity[r].unwrap_or(i64::MAX)
                                - self.non_renewable_usage[r];
                            if left > 0 {
                                need as f64 / left as f64
                            } else {
                                EXHAUSTED_PRESSURE
                            }
                        })
                        .sum()
                };
                modes.sort_by(|&a, &b| {
                    pressure(a)
                        .total_cmp(&pressure(b))
                        .then_with(|| job.duration(a).cmp(&job.duration(b)))
                });
            }
        }
        modes
    }

    /// Non-renewable usage plus this mode plus the cheapest need of every
    /// job deeper in the order stays within capacity.
    fn non_renewable_fits(&self, j: usize, mode: Option<usize>, depth: usize) -> bool {
        let Some(m) = mode else { return true };
        self.non_renewable_capacity
            .iter()
            .enumerate()
            .all(|(r, capacity)| {
                let Some(capacity) = capacity else { return true };
                let rest: i64 = self.order[depth + 1..]
                    .iter()
                    .map(|&k| {
                        let job = &self.jobs[k];
                        job.mode_domain
                            .iter()
                            .map(|&m| m.map(|m| job.modes[m].non_renewable[r]).unwrap_or(0))
                            .min()
                            .unwrap_or(0)
                    })
                    .sum();
                self.non_renewable_usage[r] + self.jobs[j].modes[m].non_renewable[r] + rest <= *capacity
            })
    }

    /// Whether placing `choice` keeps every active constraint satisfied
    /// with respect to the jobs already placed.
    fn fits(&self, j: usize, (start, mode): Choice) -> bool {
        let job = &self.jobs[j];
        let begin = start.unwrap_or(0);
        let finish = begin + job.duration(mode);

        if let Some(m) = mode {
            let data = &job.modes[m];
            for (r, need) in data.non_renewable.iter().enumerate() {
                if let Some(capacity) = self.non_renewable_capacity[r] {
                    if self.non_renewable_usage[r] + need > capacity {
                        return false;
                    }
                }
            }
            if let Some(s) = start {
                for (r, &need) in data.renewable.iter().enumerate() {
                    if need == 0 {
                        continue;
                    }
                    for t in s..finish {
                        let Ok(t) = usize::try_from(t) else { continue };
                        if t < self.horizon
                            && self.renewable_active[r][t]
                            && self.renewable_usage[r][t] + need > self.renewable_capacity[r]
                        {
                            return false;
                        }
                    }
                }
            }
        }

        if job.bounds_makespan && self.fixed_makespan.is_some_and(|m| finish > m) {
            return false;
        }

        self.edges.iter().all(|&(a, b)| {
            if a == j {
                match self.placed[b] {
                    Some((s, _)) => finish <= s.unwrap_or(0),
                    None => true,
                }
            } else if b == j {
                match self.placed[a] {
                    Some(choice) => self.finish(a, choice) <= begin,
                    None => true,
                }
            } else {
                true
            }
        })
    }

    fn finish(&self, j: usize, (start, mode): Choice) -> i64 {
        start.unwrap_or(0) + self.jobs[j].duration(mode)
    }

    fn place(&mut self, j: usize, choice: Choice) {
        self.apply(j, choice, 1);
        self.placed[j] = Some(choice);
    }

    fn unplace(&mut self, j: usize) {
        if let Some(choice) = self.placed[j].take() {
            self.apply(j, choice, -1);
        }
    }

    fn apply(&mut self, j: usize, (start, mode): Choice, sign: i64) {
        let Some(m) = mode else { return };
        let data = &self.jobs[j].modes[m];
        for (r, need) in data.non_renewable.iter().enumerate() {
            self.non_renewable_usage[r] += sign * need;
        }
        let Some(s) = start else { return };
        for (r, &need) in data.renewable.iter().enumerate() {
            for t in s..s + data.duration {
                if let Some(slot) = usize::try_from(t).ok().and_then(|t| self.renewable_usage[r].get_mut(t)) {
                    *slot += sign * need;
                }
            }
        }
    }

    fn current(&self) -> Vec<Choice> {
        self.placed
            .iter()
            .map(|c| c.unwrap_or((None, None)))
            .collect()
    }

    fn objective(&self) -> i64 {
        match self.layout {
            Layout::Makespan => {
                let span = self
                    .placed
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| self.jobs[*j].bounds_makespan)
                    .filter_map(|(j, c)| c.map(|c| self.finish(j, c)))
                    .max()
                    .unwrap_or(0);
                self.fixed_makespan.unwrap_or(span)
            }
            Layout::CriticalPath => {
                let durations: Vec<i64> = self
                    .placed
                    .iter()
                    .enumerate()
                    .map(|(j, c)| c.map(|(_, m)| self.jobs[j].duration(m)).unwrap_or(0))
                    .collect();
                self.longest_path(&durations)
            }
        }
    }

    fn lower_bound(&self) -> i64 {
        match self.layout {
            Layout::Makespan => {
                let mut bound = self.objective();
                for (j, job) in self.jobs.iter().enumerate() {
                    if self.placed[j].is_some() {
                        continue;
                    }
                    let Some(tail) = self.tail[j] else { continue };
                    let ready = self
                        .edges
                        .iter()
                        .filter(|&&(_, b)| b == j)
                        .filter_map(|&(a, _)| self.placed[a].map(|c| self.finish(a, c)))
                        .max()
                        .unwrap_or(0);
                    bound = bound.max(ready.max(job.min_start()) + tail);
                }
                bound
            }
            Layout::CriticalPath => {
                let durations: Vec<i64> = self
                    .placed
                    .iter()
                    .enumerate()
                    .map(|(j, c)| match c {
                        Some((_, m)) => self.jobs[j].duration(*m),
                        None => self.jobs[j].min_duration(),
                    })
                    .collect();
                self.longest_path(&durations)
            }
        }
    }

    fn successor_tail(&self, j: usize) -> Option<i64> {
        let own = self.jobs[j].bounds_makespan.then_some(0);
        self.edges
            .iter()
            .filter(|&&(a, _)| a == j)
            .filter_map(|&(_, b)| self.tail[b])
            .chain(own)
            .max()
    }

    fn longest_path(&self, durations: &[i64]) -> i64 {
        let mut finish = durations.to_vec();
        for &j in &self.topo {
            for &(a, b) in &self.all_edges {
                if b == j {
                    finish[j] = finish[j].max(finish[a] + durations[j]);
                }
            }
        }
        finish.into_iter().max().unwrap_or(0)
    }

    /// Reads a full choice vector from the warm start, if every job's
    /// warm values lie in its domain.
    fn decode_warm_start(&self, warm_start: &WarmStart) -> Option<Vec<Choice>> {
        let starts = warm_start.values.get(START);
        let modes = warm_start.values.get(MODE)?;
        self.jobs
            .iter()
            .map(|job| {
                let start = match starts {
                    None => None,
                    Some(values) => single_one(values.iter().filter(|(idx, _)| idx[0] == job.key))?
                        .and_then(|idx| idx[1].as_int()),
                };
                let mode = single_one(modes.iter().filter(|(idx, _)| idx[0] == job.key))?
                    .and_then(|idx| job.modes.iter().position(|m| &m.key == idx));
                (job.starts.contains(&start) && job.mode_domain.contains(&mode)).then_some((start, mode))
            })
            .collect()
    }

    /// Objective of a complete choice vector, if it satisfies every active
    /// constraint. Leaves the placement state untouched.
    fn evaluate(&mut self, choices: &[Choice]) -> Option<i64> {
        let saved = self.placed.clone();
        let undecided: Vec<usize> = (0..self.jobs.len()).filter(|&j| self.placed[j].is_none()).collect();
        let mut placed = Vec::new();
        let mut feasible = true;
        for &j in &undecided {
            if !self.fits(j, choices[j]) {
                feasible = false;
                break;
            }
            self.place(j, choices[j]);
            placed.push(j);
        }
        let objective = self.objective();
        for &j in placed.iter().rev() {
            self.unplace(j);
        }
        debug_assert_eq!(saved, self.placed);
        let within_fixed = self.fixed_makespan.map_or(true, |m| objective <= m);
        (feasible && within_fixed).then_some(objective)
    }

    /// Model values for a choice vector: free entries follow the choice,
    /// fixed entries keep their value.
    fn write_back(&self, model: &ConstraintModel, choices: &[Choice]) -> BTreeMap<String, BTreeMap<IndexTuple, i64>> {
        let mut values = WarmStart::from_model(model).values;
        for (job, &(start, mode)) in self.jobs.iter().zip(choices) {
            if let (Some(var), Some(out)) = (model.variable(START), values.get_mut(START)) {
                for (idx, entry) in var.entries.iter().filter(|(idx, _)| idx[0] == job.key) {
                    if !entry.fixed {
                        out.insert(idx.clone(), i64::from(idx[1].as_int() == start));
                    }
                }
            }
            if let (Some(var), Some(out)) = (model.variable(MODE), values.get_mut(MODE)) {
                let chosen = mode.map(|m| &job.modes[m].key);
                for (idx, entry) in var.entries.iter().filter(|(idx, _)| idx[0] == job.key) {
                    if !entry.fixed {
                        out.insert(idx.clone(), i64::from(chosen == Some(idx)));
                    }
                }
            }
        }
        if let (Some(var), Some(out), Some(objective)) =
            (model.variable(MAKESPAN), values.get_mut(MAKESPAN), self.best_objective)
        {
            if !var.all_fixed() {
                out.insert(Vec::new(), objective);
            }
        }
        values
    }
}

/// Decodes one job's modes and domains. `None` when a domain is empty.
fn decode_job(
    model: &ConstraintModel,
    key: &Key,
    renewable: &[&Key],
    non_renewable: &[&Key],
    periods: &[i64],
    layout: Layout,
) -> Option<JobData> {
    let modes: Vec<ModeData> = model
        .members(JOBS_MODES)
        .iter()
        .filter(|jm| &jm[0] == key)
        .map(|jm| {
            let need = |r: &Key| {
                let mut idx = jm.clone();
                idx.push(r.clone());
                model.param_value(NEED, &idx)
            };
            ModeData {
                key: jm.clone(),
                duration: model.param_value(DURATION, jm),
                renewable: renewable.iter().map(|r| need(r)).collect(),
                non_renewable: non_renewable.iter().map(|r| need(r)).collect(),
            }
        })
        .collect();

    let mode_domain = {
        let var = model.variable(MODE)?;
        let required = model.is_active(ONE_MODE, std::slice::from_ref(key));
        domain(
            modes.iter().enumerate().filter_map(|(i, m)| var.entries.get(&m.key).map(|e| (i, *e))),
            required,
        )?
    };

    let starts = match layout {
        Layout::CriticalPath => vec![None],
        Layout::Makespan => {
            let var = model.variable(START)?;
            let required = model.is_active(ONE_START, std::slice::from_ref(key));
            domain(
                periods.iter().filter_map(|&p| {
                    var.entries
                        .get(&vec![key.clone(), Key::Int(p)])
                        .map(|e| (p, *e))
                }),
                required,
            )?
        }
    };

    let bounds_makespan = model.is_active(MAKESPAN_BOUND, std::slice::from_ref(key));
    Some(JobData {
        key: key.clone(),
        modes,
        starts,
        mode_domain,
        bounds_makespan,
    })
}

/// Choices for a one-hot group of entries.
///
/// An entry fixed at 1 forces its choice, whether or not the group must hold
/// exactly one; the group's free entries are then written back as 0.
/// Otherwise the free entries are the choices when the group must hold
/// exactly one, and "none" when it need not. `None` when the group cannot be
/// satisfied, including two entries fixed at 1.
fn domain<T: Copy>(
    entries: impl Iterator<Item = (T, VariableEntry)>,
    required: bool,
) -> Option<Vec<Option<T>>> {
    let mut forced = Vec::new();
    let mut open = Vec::new();
    for (choice, entry) in entries {
        match (entry.fixed, entry.value) {
            (true, 1) => forced.push(choice),
            (true, _) => {}
            (false, _) => open.push(choice),
        }
    }
    match forced.len() {
        1 => Some(vec![Some(forced[0])]),
        0 if required && open.is_empty() => None,
        0 if required => Some(open.into_iter().map(Some).collect()),
        0 => Some(vec![None]),
        _ => None,
    }
}

/// The only index set to 1. `None` for two or more, `Some(None)` for zero.
fn single_one<'a>(mut entries: impl Iterator<Item = (&'a IndexTuple, &'a i64)>) -> Option<Option<&'a IndexTuple>> {
    let mut found = None;
    for (idx, &value) in entries.by_ref() {
        if value == 1 {
            if found.is_some() {
                return None;
            }
            found = Some(idx);
        }
    }
    Some(found)
}

/// Kahn's order over `n` nodes; nodes on cycles are appended in index order.
fn topological_order(n: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree = vec![0usize; n];
    for &(_, b) in edges {
        indegree[b] += 1;
    }
    let mut ready: Vec<usize> = (0..n).filter(|&j| indegree[j] == 0).rev().collect();
    let mut order = Vec::with_capacity(n);
    while let Some(j) = ready.pop() {
        order.push(j);
        let mut next: Vec<usize> = Vec::new();
        for &(a, b) in edges {
            if a == j {
                indegree[b] -= 1;
                if indegree[b] == 0 {
                    next.push(b);
                }
            }
        }
        next.sort_unstable_by(|x, y| y.cmp(x));
        ready.extend(next);
    }
    if order.len() < n {
        let seen: Vec<bool> = (0..n).map(|j| order.contains(&j)).collect();
        order.extend((0..n).filter(|&j| !seen[j]));
    }
    order
}
