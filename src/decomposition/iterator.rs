//! Decomposition iterator.
//!
//! Solves a [`ConstraintModel`] as a sequence of sub-problems. Each
//! iteration frees a window of index combinations, fixes everything else at
//! its current value, deactivates the constraint instances that no longer
//! read a free entry, and hands the model to the [`OptimizationEngine`] with
//! a warm start built from the current values.
//!
//! # Free/fixed rule
//!
//! A [`Partition`] lists, per named index set, the members that are free and
//! the members that are fixed in this iteration. A set named in either list
//! is *governed*; members of a governed set in neither list are *ignored*.
//! An entry of a declared variable is free iff every governed coordinate is
//! free or fixed (not ignored) and at least one governed coordinate is free:
//!
//! | coordinates | result |
//! |-------------|--------|
//! | free × free | free |
//! | free × fixed | free |
//! | fixed × fixed | fixed |
//! | free × ignored | fixed |
//! | fixed × ignored | fixed |
//! | ignored × ignored | fixed |
//!
//! Dimensions over ungoverned sets never restrict an entry. Variables that
//! are not declared are never fixed by a partition.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::engine::{OptimizationEngine, SolveLimits, SolveStatus, WarmStart};
use super::model::{display_tuple, split, ConstraintModel, IndexTuple, Key};
use crate::error::DecompositionError;

/// Free and fixed members per index set for one iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub free: BTreeMap<String, Vec<IndexTuple>>,
    pub fixed: BTreeMap<String, Vec<IndexTuple>>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks members of `set` as free.
    pub fn with_free(mut self, set: &str, members: impl IntoIterator<Item = IndexTuple>) -> Self {
        self.free.entry(set.to_string()).or_default().extend(members);
        self
    }

    /// Marks members of `set` as fixed.
    pub fn with_fixed(mut self, set: &str, members: impl IntoIterator<Item = IndexTuple>) -> Self {
        self.fixed.entry(set.to_string()).or_default().extend(members);
        self
    }

    /// [`Partition::with_free`] for one-coordinate sets.
    pub fn with_free_keys<K: Into<Key>>(self, set: &str, keys: impl IntoIterator<Item = K>) -> Self {
        self.with_free(set, keys.into_iter().map(|k| vec![k.into()]))
    }

    /// [`Partition::with_fixed`] for one-coordinate sets.
    pub fn with_fixed_keys<K: Into<Key>>(self, set: &str, keys: impl IntoIterator<Item = K>) -> Self {
        self.with_fixed(set, keys.into_iter().map(|k| vec![k.into()]))
    }

    /// Whether `set` is named in the free or the fixed list.
    pub fn governs(&self, set: &str) -> bool {
        self.free.contains_key(set) || self.fixed.contains_key(set)
    }

    fn check_disjoint(&self) -> Result<(), DecompositionError> {
        for (set, free) in &self.free {
            let Some(fixed) = self.fixed.get(set) else {
                continue;
            };
            let fixed: BTreeSet<&IndexTuple> = fixed.iter().collect();
            if let Some(member) = free.iter().find(|m| fixed.contains(m)) {
                return Err(DecompositionError::OverlappingPartition {
                    set: set.clone(),
                    member: display_tuple(member),
                });
            }
        }
        Ok(())
    }
}

/// Status and objective of one sub-solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationResult {
    pub status: SolveStatus,
    pub objective: Option<i64>,
}

impl IterationResult {
    pub fn is_feasible(&self) -> bool {
        self.status.is_feasible()
    }
}

impl fmt::Display for IterationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.objective {
            Some(obj) => write!(f, "status {} ({}) obj {}", self.status.code(), self.status, obj),
            None => write!(f, "status {} ({})", self.status.code(), self.status),
        }
    }
}

/// Free tuples per declared variable, as returned by
/// [`DecompositionIterator::apply_partition`].
pub type FreedEntries = BTreeMap<String, Vec<IndexTuple>>;

/// Iterative sub-problem solver over an owned [`ConstraintModel`].
///
/// # Example
///
/// ```ignore
/// let mut it = DecompositionIterator::new(model, engine);
/// it.declare("start", &["Jobs", "Periods"])?;
/// let partition = Partition::new()
///     .with_free_keys("Jobs", [3u32, 4])
///     .with_fixed_keys("Jobs", [1u32, 2])
///     .with_fixed_keys("Periods", 0u32..20);
/// let result = it.iterate(&partition, &["precedence"])?;
/// ```
#[derive(Debug)]
pub struct DecompositionIterator<E> {
    model: ConstraintModel,
    engine: E,
    declared: BTreeMap<String, Vec<String>>,
    warm_start: WarmStart,
    limits: SolveLimits,
    solves: usize,
}

impl<E: OptimizationEngine> DecompositionIterator<E> {
    /// Takes ownership of the model. Nothing is declared yet.
    pub fn new(model: ConstraintModel, engine: E) -> Self {
        Self {
            model,
            engine,
            declared: BTreeMap::new(),
            warm_start: WarmStart::default(),
            limits: SolveLimits::default(),
            solves: 0,
        }
    }

    /// Sets the limits handed to every engine call.
    pub fn with_limits(mut self, limits: SolveLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn set_limits(&mut self, limits: SolveLimits) {
        self.limits = limits;
    }

    pub fn limits(&self) -> &SolveLimits {
        &self.limits
    }

    /// The model in its current state.
    pub fn model(&self) -> &ConstraintModel {
        &self.model
    }

    /// Consumes the iterator, returning the model.
    pub fn into_model(self) -> ConstraintModel {
        self.model
    }

    /// The warm start handed to the last engine call.
    pub fn warm_start(&self) -> &WarmStart {
        &self.warm_start
    }

    /// Number of engine calls so far.
    pub fn solve_count(&self) -> usize {
        self.solves
    }

    /// Declared variables and the set name governing each of their dimensions.
    pub fn declared(&self) -> &BTreeMap<String, Vec<String>> {
        &self.declared
    }

    /// Declares which set governs each dimension of `variable`.
    ///
    /// Names need not match the variable's own dimension sets; only sets
    /// named by a [`Partition`] restrict the variable.
    ///
    /// # Errors
    /// Unknown variable, or a name count different from the variable's
    /// dimension count.
    pub fn declare(&mut self, variable: &str, sets: &[&str]) -> Result<(), DecompositionError> {
        let var = self
            .model
            .variable(variable)
            .ok_or_else(|| DecompositionError::UnknownVariable(variable.to_string()))?;
        if var.dims.len() != sets.len() {
            return Err(DecompositionError::DimensionMismatch {
                variable: variable.to_string(),
                expected: var.dims.len(),
                given: sets.len(),
            });
        }
        self.declared.insert(
            variable.to_string(),
            sets.iter().map(|s| s.to_string()).collect(),
        );
        Ok(())
    }

    /// Sets every entry of every variable to 0.
    pub fn reset_to_default(&mut self) {
        for var in self.model.variables_mut() {
            for entry in var.entries.values_mut() {
                entry.value = 0;
            }
        }
    }

    /// Entries of `variable` that `partition` makes free.
    ///
    /// # Errors
    /// [`DecompositionError::NotDeclared`] for undeclared variables.
    pub fn compute_free_indices(
        &self,
        variable: &str,
        partition: &Partition,
    ) -> Result<Vec<IndexTuple>, DecompositionError> {
        let sets = self
            .declared
            .get(variable)
            .ok_or_else(|| DecompositionError::NotDeclared(variable.to_string()))?;
        let var = self
            .model
            .variable(variable)
            .ok_or_else(|| DecompositionError::UnknownVariable(variable.to_string()))?;
        let arities = self.model.arities(&var.dims)?;

        let lookup = |map: &BTreeMap<String, Vec<IndexTuple>>| -> Vec<Option<BTreeSet<IndexTuple>>> {
            sets.iter()
                .map(|s| map.get(s).map(|members| members.iter().cloned().collect()))
                .collect()
        };
        let free = lookup(&partition.free);
        let fixed = lookup(&partition.fixed);
        let governed: Vec<bool> = sets.iter().map(|s| partition.governs(s)).collect();

        let in_set = |sets: &[Option<BTreeSet<IndexTuple>>], k: usize, segment: &[Key]| {
            sets[k].as_ref().is_some_and(|s| s.contains(segment))
        };

        Ok(var
            .entries
            .keys()
            .filter(|idx| {
                let segments = split(idx, &arities);
                let present = segments.iter().enumerate().all(|(k, seg)| {
                    !governed[k] || in_set(&free, k, seg) || in_set(&fixed, k, seg)
                });
                present
                    && segments
                        .iter()
                        .enumerate()
                        .any(|(k, seg)| governed[k] && in_set(&free, k, seg))
            })
            .cloned()
            .collect())
    }

    /// Fixes every declared variable, then frees the entries `partition`
    /// selects. Returns the freed entries per variable.
    ///
    /// # Errors
    /// A member listed both free and fixed for the same set.
    pub fn apply_partition(&mut self, partition: &Partition) -> Result<FreedEntries, DecompositionError> {
        partition.check_disjoint()?;

        let mut freed = FreedEntries::new();
        for name in self.declared.keys() {
            freed.insert(name.clone(), self.compute_free_indices(name, partition)?);
        }

        for (name, free) in &freed {
            let Some(var) = self.model.variable_mut(name) else {
                continue;
            };
            for entry in var.entries.values_mut() {
                entry.fixed = true;
            }
            for idx in free {
                if let Some(entry) = var.entries.get_mut(idx) {
                    entry.fixed = false;
                }
            }
        }
        Ok(freed)
    }

    /// Re-activates every constraint group not in `exclude`, then deactivates
    /// its instances that read no free entry. Returns the number of
    /// deactivated instances.
    ///
    /// # Errors
    /// [`DecompositionError::UnknownConstraint`] for an unknown excluded name.
    pub fn deactivate_vacuous_constraints(&mut self, exclude: &[&str]) -> Result<usize, DecompositionError> {
        for name in exclude {
            if self.model.constraint(name).is_none() {
                return Err(DecompositionError::UnknownConstraint(name.to_string()));
            }
        }

        let vacuous: Vec<(String, Vec<IndexTuple>)> = self
            .model
            .constraints()
            .filter(|c| !exclude.contains(&c.name.as_str()))
            .map(|c| {
                let idle = c
                    .instances
                    .keys()
                    .filter(|idx| !(c.scope)(&self.model, idx).iter().any(|r| self.model.is_free(r)))
                    .cloned()
                    .collect();
                (c.name.clone(), idle)
            })
            .collect();

        let mut count = 0;
        for (name, idle) in vacuous {
            let Some(group) = self.model.constraint_mut(&name) else {
                continue;
            };
            for active in group.instances.values_mut() {
                *active = true;
            }
            for idx in &idle {
                if let Some(active) = group.instances.get_mut(idx) {
                    *active = false;
                }
            }
            count += idle.len();
        }
        Ok(count)
    }

    /// Rewrites the warm start, calls the engine, and on success writes the
    /// returned values of free entries back into the model.
    pub fn solve_once(&mut self) -> IterationResult {
        self.warm_start.rewrite_from(&self.model);
        self.solves += 1;
        let solution = self.engine.solve(&self.model, &self.warm_start, &self.limits);

        if !solution.status.is_feasible() {
            warn!("sub-solve {} ended with status {}", self.solves, solution.status);
            return IterationResult {
                status: solution.status,
                objective: None,
            };
        }

        for var in self.model.variables_mut() {
            let Some(values) = solution.values.get(&var.name) else {
                continue;
            };
            for (idx, entry) in var.entries.iter_mut() {
                if entry.fixed {
                    continue;
                }
                if let Some(&v) = values.get(idx) {
                    entry.value = v;
                }
            }
        }

        let violated = self.model.violated_constraints();
        if !violated.is_empty() {
            warn!(
                "engine solution violates {} active constraint instances, first: {} {}",
                violated.len(),
                violated[0].0,
                display_tuple(&violated[0].1)
            );
        }

        let objective = solution
            .objective
            .unwrap_or_else(|| self.model.objective_value());
        debug!("sub-solve {}: {} obj {}", self.solves, solution.status, objective);
        IterationResult {
            status: solution.status,
            objective: Some(objective),
        }
    }

    /// [`apply_partition`](Self::apply_partition), then
    /// [`deactivate_vacuous_constraints`](Self::deactivate_vacuous_constraints),
    /// then [`solve_once`](Self::solve_once).
    pub fn iterate(&mut self, partition: &Partition, exclude: &[&str]) -> Result<IterationResult, DecompositionError> {
        let freed = self.apply_partition(partition)?;
        let idle = self.deactivate_vacuous_constraints(exclude)?;
        debug!(
            "iteration: {} free entries, {} idle constraint instances",
            freed.values().map(Vec::len).sum::<usize>(),
            idle
        );
        Ok(self.solve_once())
    }

    /// Frees every variable entry and activates every constraint instance.
    pub fn release_all(&mut self) {
        for var in self.model.variables_mut() {
            for entry in var.entries.values_mut() {
                entry.fixed = false;
            }
        }
        for group in self.model.constraints_mut() {
            for active in group.instances.values_mut() {
                *active = true;
            }
        }
    }

    /// Activates a constraint group, or only the listed instances of it.
    pub fn activate_constraint(&mut self, name: &str, only: Option<&[IndexTuple]>) -> Result<(), DecompositionError> {
        self.set_constraint_state(name, only, true)
    }

    /// Deactivates a constraint group, or only the listed instances of it.
    pub fn deactivate_constraint(&mut self, name: &str, only: Option<&[IndexTuple]>) -> Result<(), DecompositionError> {
        self.set_constraint_state(name, only, false)
    }

    fn set_constraint_state(
        &mut self,
        name: &str,
        only: Option<&[IndexTuple]>,
        state: bool,
    ) -> Result<(), DecompositionError> {
        let group = self
            .model
            .constraint_mut(name)
            .ok_or_else(|| DecompositionError::UnknownConstraint(name.to_string()))?;
        match only {
            None => group.instances.values_mut().for_each(|a| *a = state),
            Some(keys) => {
                for idx in keys {
                    if let Some(active) = group.instances.get_mut(idx) {
                        *active = state;
                    }
                }
            }
        }
        Ok(())
    }

    /// Shrinks an index set to `keep`. See [`ConstraintModel::shrink_set`].
    pub fn shrink_index_set(&mut self, set: &str, keep: &[IndexTuple]) -> Result<usize, DecompositionError> {
        let removed = self.model.shrink_set(set, keep)?;
        debug!("index set '{set}' shrunk by {removed} members");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::{Domain, EngineSolution, IndexSet, VarRef};
    use proptest::prelude::*;
    use std::cell::RefCell;

    fn k(v: i64) -> Key {
        Key::Int(v)
    }

    fn t(a: i64, b: i64) -> IndexTuple {
        vec![k(a), k(b)]
    }

    /// Tries every 0/1 combination of the free binary entries.
    struct ExhaustiveEngine {
        calls: RefCell<Vec<WarmStart>>,
    }

    impl ExhaustiveEngine {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl OptimizationEngine for ExhaustiveEngine {
        fn solve(&self, model: &ConstraintModel, warm_start: &WarmStart, _limits: &SolveLimits) -> EngineSolution {
            self.calls.borrow_mut().push(warm_start.clone());
            let free: Vec<VarRef> = model
                .variables()
                .flat_map(|v| {
                    v.free_indices()
                        .into_iter()
                        .map(move |idx| VarRef::new(v.name.clone(), idx))
                })
                .collect();
            assert!(free.len() <= 16);

            let mut best: Option<(i64, ConstraintModel)> = None;
            for mask in 0u32..(1 << free.len()) {
                let mut candidate = model.clone();
                for (bit, r) in free.iter().enumerate() {
                    candidate
                        .set_value(&r.variable, &r.index, i64::from((mask >> bit) & 1))
                        .unwrap();
                }
                if !candidate.violated_constraints().is_empty() {
                    continue;
                }
                let obj = candidate.objective_value();
                if best.as_ref().map_or(true, |(b, _)| obj < *b) {
                    best = Some((obj, candidate));
                }
            }

            match best {
                None => EngineSolution::without_values(SolveStatus::Infeasible),
                Some((obj, m)) => EngineSolution {
                    status: SolveStatus::Optimal,
                    objective: Some(obj),
                    values: WarmStart::from_model(&m).values,
                },
            }
        }
    }

    fn row_scope(model: &ConstraintModel, idx: &[Key]) -> Vec<VarRef> {
        model
            .members("P")
            .iter()
            .map(|p| VarRef::new("x", [idx, p.as_slice()].concat()))
            .collect()
    }

    /// Each job of J takes exactly one period.
    fn exactly_one(model: &ConstraintModel, idx: &[Key]) -> bool {
        row_scope(model, idx)
            .iter()
            .map(|r| model.value(&r.variable, &r.index))
            .sum::<i64>()
            == 1
    }

    /// Sum of chosen periods.
    fn total_period(model: &ConstraintModel) -> i64 {
        model
            .variable("x")
            .map(|v| {
                v.entries
                    .iter()
                    .map(|(idx, e)| e.value * idx[1].as_int().unwrap_or(0))
                    .sum()
            })
            .unwrap_or(0)
    }

    fn model() -> ConstraintModel {
        let mut m = ConstraintModel::new("grid");
        m.add_set(IndexSet::simple("J", [1i64, 2, 3]));
        m.add_set(IndexSet::simple("P", [0i64, 1, 2]));
        m.add_variable("x", &["J", "P"], Domain::Binary).unwrap();
        m.add_constraint("one", &["J"], row_scope, exactly_one).unwrap();
        m.set_objective(total_period);
        m
    }

    fn iterator() -> DecompositionIterator<ExhaustiveEngine> {
        let mut it = DecompositionIterator::new(model(), ExhaustiveEngine::new());
        it.declare("x", &["J", "P"]).unwrap();
        it
    }

    #[test]
    fn test_declare_errors() {
        let mut it = iterator();
        assert_eq!(
            it.declare("y", &["J"]),
            Err(DecompositionError::UnknownVariable("y".into()))
        );
        assert!(matches!(
            it.declare("x", &["J"]),
            Err(DecompositionError::DimensionMismatch { expected: 2, given: 1, .. })
        ));
    }

    #[test]
    fn test_composition_table() {
        let it = iterator();
        // J: 1 free, 2 fixed, 3 ignored. P: 1 free, 0 fixed, 2 ignored.
        let p = Partition::new()
            .with_free_keys("J", [1i64])
            .with_fixed_keys("J", [2i64])
            .with_free_keys("P", [1i64])
            .with_fixed_keys("P", [0i64]);
        let free: BTreeSet<IndexTuple> = it.compute_free_indices("x", &p).unwrap().into_iter().collect();

        let expected: BTreeSet<IndexTuple> = [t(1, 1), t(1, 0), t(2, 1)].into_iter().collect();
        assert_eq!(free, expected);
        // fixed x fixed, free x ignored, fixed x ignored, ignored x ignored
        for fixed in [t(2, 0), t(1, 2), t(2, 2), t(3, 2)] {
            assert!(!free.contains(&fixed));
        }
    }

    #[test]
    fn test_ungoverned_dimension_is_present() {
        let it = iterator();
        let p = Partition::new().with_free_keys("J", [2i64]);
        let free = it.compute_free_indices("x", &p).unwrap();
        assert_eq!(free, vec![t(2, 0), t(2, 1), t(2, 2)]);
    }

    #[test]
    fn test_not_declared() {
        let it = iterator();
        assert_eq!(
            it.compute_free_indices("z", &Partition::new()),
            Err(DecompositionError::NotDeclared("z".into()))
        );
    }

    #[test]
    fn test_overlapping_partition() {
        let mut it = iterator();
        let p = Partition::new()
            .with_free_keys("J", [1i64])
            .with_fixed_keys("J", [1i64]);
        assert!(matches!(
            it.apply_partition(&p),
            Err(DecompositionError::OverlappingPartition { .. })
        ));
    }

    #[test]
    fn test_apply_partition_sets_flags() {
        let mut it = iterator();
        let p = Partition::new()
            .with_free_keys("J", [1i64])
            .with_fixed_keys("P", [0i64, 1, 2]);
        let freed = it.apply_partition(&p).unwrap();

        assert_eq!(freed["x"], vec![t(1, 0), t(1, 1), t(1, 2)]);
        let x = it.model().variable("x").unwrap();
        assert!(!x.is_fixed(&t(1, 1)));
        assert!(x.is_fixed(&t(2, 1)));
        assert!(x.is_fixed(&t(3, 0)));
    }

    #[test]
    fn test_vacuous_constraints_deactivated() {
        let mut it = iterator();
        it.apply_partition(&Partition::new().with_free_keys("J", [1i64])).unwrap();
        let idle = it.deactivate_vacuous_constraints(&[]).unwrap();

        assert_eq!(idle, 2);
        assert!(it.model().is_active("one", &[k(1)]));
        assert!(!it.model().is_active("one", &[k(2)]));
    }

    #[test]
    fn test_excluded_constraint_untouched() {
        let mut it = iterator();
        it.deactivate_constraint("one", None).unwrap();
        it.apply_partition(&Partition::new().with_free_keys("J", [1i64])).unwrap();
        it.deactivate_vacuous_constraints(&["one"]).unwrap();
        assert_eq!(it.model().constraint("one").unwrap().active_count(), 0);

        assert_eq!(
            it.deactivate_vacuous_constraints(&["nope"]),
            Err(DecompositionError::UnknownConstraint("nope".into()))
        );
    }

    #[test]
    fn test_iterate_job_by_job() {
        let mut it = iterator();
        it.reset_to_default();
        let mut done: Vec<i64> = Vec::new();
        for j in 1..=3 {
            let p = Partition::new()
                .with_free_keys("J", [j])
                .with_fixed_keys("J", done.clone());
            let result = it.iterate(&p, &[]).unwrap();
            assert_eq!(result.status, SolveStatus::Optimal);
            done.push(j);
        }

        for j in 1..=3 {
            assert_eq!(it.model().value("x", &t(j, 0)), 1);
        }
        assert!(it.model().violated_constraints().is_empty());
        assert_eq!(it.solve_count(), 3);
    }

    #[test]
    fn test_fixed_values_survive() {
        let mut it = iterator();
        it.model.set_value("x", &t(2, 2), 1).unwrap();
        let p = Partition::new().with_free_keys("J", [1i64]).with_fixed_keys("J", [2i64]);
        it.iterate(&p, &[]).unwrap();

        assert_eq!(it.model().value("x", &t(2, 2)), 1);
        assert_eq!(it.model().value("x", &t(1, 0)), 1);
        // the warm start saw the pre-solve values
        let calls = it.engine.calls.borrow();
        assert_eq!(calls[0].get("x", &t(2, 2)), Some(1));
        assert_eq!(calls[0].get("x", &t(1, 0)), Some(0));
    }

    #[test]
    fn test_infeasible_leaves_values() {
        let mut it = iterator();
        it.model.set_value("x", &t(2, 0), 1).unwrap();
        it.model.set_value("x", &t(2, 1), 1).unwrap();
        for idx in [t(2, 0), t(2, 1)] {
            it.model.variable_mut("x").unwrap().entries.get_mut(&idx).unwrap().fixed = true;
        }

        // row 2 already holds two ones
        let result = it.solve_once();
        assert_eq!(result.status, SolveStatus::Infeasible);
        assert_eq!(result.objective, None);
        assert_eq!(it.model().value("x", &t(2, 1)), 1);
        assert_eq!(it.model().value("x", &t(1, 0)), 0);
    }

    #[test]
    fn test_release_all() {
        let mut it = iterator();
        it.apply_partition(&Partition::new().with_free_keys("J", [1i64])).unwrap();
        it.deactivate_vacuous_constraints(&[]).unwrap();
        it.release_all();

        let x = it.model().variable("x").unwrap();
        assert!(x.entries.values().all(|e| !e.fixed));
        assert_eq!(it.model().constraint("one").unwrap().active_count(), 3);
    }

    #[test]
    fn test_activate_subset() {
        let mut it = iterator();
        it.deactivate_constraint("one", None).unwrap();
        it.activate_constraint("one", Some(&[vec![k(2)], vec![k(9)]])).unwrap();
        assert!(it.model().is_active("one", &[k(2)]));
        assert!(!it.model().is_active("one", &[k(1)]));
        assert!(it.activate_constraint("none", None).is_err());
    }

    #[test]
    fn test_shrink_index_set() {
        let mut it = iterator();
        let removed = it.shrink_index_set("P", &[vec![k(0)]]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(it.model().variable("x").unwrap().entries.len(), 3);
    }

    fn membership() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(0u8..3, 3)
    }

    fn partition_from(j: &[u8], p: &[u8]) -> Partition {
        let pick = |marks: &[u8], m: u8| -> Vec<i64> {
            marks
                .iter()
                .enumerate()
                .filter(|(_, &x)| x == m)
                .map(|(i, _)| i as i64)
                .collect()
        };
        Partition::new()
            .with_free_keys("J", pick(j, 1).into_iter().map(|i| i + 1))
            .with_fixed_keys("J", pick(j, 2).into_iter().map(|i| i + 1))
            .with_free_keys("P", pick(p, 1))
            .with_fixed_keys("P", pick(p, 2))
    }

    proptest! {
        #[test]
        fn prop_apply_partition_idempotent(j in membership(), p in membership()) {
            let mut it = iterator();
            let partition = partition_from(&j, &p);
            let first = it.apply_partition(&partition).unwrap();
            let second = it.apply_partition(&partition).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_free_entries_match_rule(j in membership(), p in membership()) {
            let it = iterator();
            let partition = partition_from(&j, &p);
            let free = it.compute_free_indices("x", &partition).unwrap();
            for (ji, &jm) in j.iter().enumerate() {
                for (pi, &pm) in p.iter().enumerate() {
                    let expected = jm != 0 && pm != 0 && (jm == 1 || pm == 1);
                    prop_assert_eq!(free.contains(&t(ji as i64 + 1, pi as i64)), expected);
                }
            }
        }
    }
}
