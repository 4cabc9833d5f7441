//! Solution feasibility verifier.
//!
//! Checks a candidate [`Solution`] against an [`Instance`], independently of
//! how the solution was produced. Four checks are available:
//!
//! | Check | Violation when |
//! |-------|----------------|
//! | Successors | `finish(a) > start(b)` for an edge `a → b` |
//! | Non-renewable | Σ needs of the assigned modes exceeds capacity |
//! | Renewable | usage at some period in `[0, makespan]` exceeds capacity |
//! | Completeness | a job of the instance is not assigned |
//!
//! A job assigned at period `s` in a mode of duration `d` is active in the
//! half-open interval `[s, s + d)`.

use std::collections::{BTreeMap, HashMap};

use crate::models::{Instance, JobId, ModeId, ResourceId, Solution};

/// Identifies one of the verifier checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Check {
    Successors,
    NonRenewable,
    Renewable,
    Completeness,
}

impl Check {
    /// All checks, in reporting order.
    pub const ALL: [Check; 4] = [
        Check::Successors,
        Check::NonRenewable,
        Check::Renewable,
        Check::Completeness,
    ];
}

/// A single constraint violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// `before` finishes `overlap` periods after `after` starts.
    Precedence {
        before: JobId,
        after: JobId,
        overlap: u64,
    },
    /// Cumulative usage of a non-renewable resource exceeds capacity.
    NonRenewable { resource: ResourceId, excess: u64 },
    /// Usage of a renewable resource at `period` exceeds capacity.
    Renewable {
        resource: ResourceId,
        period: u64,
        excess: u64,
    },
    /// Job present in the instance but not in the solution.
    MissingJob { job: JobId },
    /// Job assigned a mode it does not have.
    UnknownMode { job: JobId, mode: ModeId },
}

/// Non-empty check results. An empty report means a feasible solution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    results: BTreeMap<Check, Vec<Violation>>,
}

impl Report {
    /// Whether no check reported a violation.
    pub fn is_feasible(&self) -> bool {
        self.results.is_empty()
    }

    /// Violations of one check (empty if satisfied or not run).
    pub fn violations(&self, check: Check) -> &[Violation] {
        self.results.get(&check).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Checks that reported at least one violation.
    pub fn failed_checks(&self) -> Vec<Check> {
        self.results.keys().copied().collect()
    }

    /// Total number of violations.
    pub fn violation_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    fn record(&mut self, check: Check, violations: Vec<Violation>) {
        if !violations.is_empty() {
            self.results.insert(check, violations);
        }
    }
}

/// Verifies a solution against an instance.
///
/// # Example
/// ```
/// use u_mrcpsp::models::{Instance, Job, Mode, Resource, Solution};
/// use u_mrcpsp::verifier::Verifier;
///
/// let jobs = vec![
///     Job::new(1).with_successor(2).with_mode(1, Mode::new(2).with_need("R1", 1)),
///     Job::new(2).with_mode(1, Mode::new(1).with_need("R1", 1)),
/// ];
/// let instance = Instance::new(jobs, vec![Resource::renewable("R1", 1)]).unwrap();
/// let solution = Solution::new().with_assignment(1, 0, 1).with_assignment(2, 2, 1);
///
/// let verifier = Verifier::new(&instance, &solution);
/// assert!(verifier.verify().is_feasible());
/// assert_eq!(verifier.objective(), 3);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    instance: &'a Instance,
    solution: &'a Solution,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier.
    pub fn new(instance: &'a Instance, solution: &'a Solution) -> Self {
        Self { instance, solution }
    }

    /// Runs all checks.
    pub fn verify(&self) -> Report {
        self.verify_only(&Check::ALL)
    }

    /// Runs the given checks only.
    pub fn verify_only(&self, checks: &[Check]) -> Report {
        let mut report = Report::default();
        for &check in checks {
            let violations = match check {
                Check::Successors => self.check_successors(),
                Check::NonRenewable => self.check_non_renewable(),
                Check::Renewable => self.check_renewable(),
                Check::Completeness => self.check_completeness(),
            };
            report.record(check, violations);
        }
        report
    }

    /// Finish period of every assigned job with a known mode.
    ///
    /// Computed in `u64`, so a start near `u32::MAX` cannot wrap.
    pub fn finish_times(&self) -> HashMap<JobId, u64> {
        self.solution
            .iter()
            .filter_map(|a| {
                let duration = self.instance.job(a.job)?.duration(a.mode)?;
                Some((a.job, u64::from(a.period) + u64::from(duration)))
            })
            .collect()
    }

    /// Makespan: latest finish time (0 without assigned jobs).
    pub fn objective(&self) -> u64 {
        self.finish_times().into_values().max().unwrap_or(0)
    }

    /// Precedence check: `finish(a) ≤ start(b)` for every edge `a → b`.
    ///
    /// Edges with an unassigned endpoint are left to the completeness check.
    pub fn check_successors(&self) -> Vec<Violation> {
        let finish = self.finish_times();
        self.instance
            .precedence_edges()
            .into_iter()
            .filter_map(|(a, b)| {
                let end_a = *finish.get(&a)?;
                let start_b = u64::from(self.solution.start(b)?);
                (end_a > start_b).then(|| Violation::Precedence {
                    before: a,
                    after: b,
                    overlap: end_a - start_b,
                })
            })
            .collect()
    }

    /// Non-renewable check: cumulative usage per resource.
    pub fn check_non_renewable(&self) -> Vec<Violation> {
        self.instance
            .non_renewable_resources()
            .into_iter()
            .filter_map(|r| {
                let used: u64 = self
                    .solution
                    .iter()
                    .filter_map(|a| self.instance.job(a.job))
                    .map(|job| u64::from(job.need(self.mode_of(job.id), &r.id)))
                    .sum();
                let capacity = u64::from(r.capacity);
                (used > capacity).then(|| Violation::NonRenewable {
                    resource: r.id.clone(),
                    excess: used - capacity,
                })
            })
            .collect()
    }

    /// Renewable check: usage per (resource, period).
    ///
    /// Sweeps the start and finish events of each resource, so only periods
    /// some job covers are visited. A period nobody uses cannot exceed a
    /// capacity.
    pub fn check_renewable(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for r in self.instance.renewable_resources() {
            let mut events: BTreeMap<u64, i64> = BTreeMap::new();
            for a in self.solution.iter() {
                let Some(job) = self.instance.job(a.job) else {
                    continue;
                };
                let Some(duration) = job.duration(a.mode) else {
                    continue;
                };
                let need = i64::from(job.need(a.mode, &r.id));
                if need == 0 || duration == 0 {
                    continue;
                }
                let start = u64::from(a.period);
                *events.entry(start).or_insert(0) += need;
                *events.entry(start + u64::from(duration)).or_insert(0) -= need;
            }

            let capacity = i64::from(r.capacity);
            let mut used = 0i64;
            let mut points = events.into_iter().peekable();
            while let Some((from, delta)) = points.next() {
                used += delta;
                let Some(&(until, _)) = points.peek() else {
                    break;
                };
                if used > capacity {
                    let excess = u64::try_from(used - capacity).unwrap_or(0);
                    violations.extend((from..until).map(|period| Violation::Renewable {
                        resource: r.id.clone(),
                        period,
                        excess,
                    }));
                }
            }
        }
        violations
    }

    /// Completeness check: every job assigned exactly once with a known mode.
    pub fn check_completeness(&self) -> Vec<Violation> {
        let mut violations: Vec<Violation> = self
            .instance
            .jobs()
            .iter()
            .filter(|j| !self.solution.contains(j.id))
            .map(|j| Violation::MissingJob { job: j.id })
            .collect();

        violations.extend(self.solution.iter().filter_map(|a| {
            let job = self.instance.job(a.job)?;
            job.mode(a.mode)
                .is_none()
                .then_some(Violation::UnknownMode {
                    job: a.job,
                    mode: a.mode,
                })
        }));
        violations
    }

    fn mode_of(&self, job: JobId) -> ModeId {
        self.solution.mode(job).unwrap_or_default()
    }
}
