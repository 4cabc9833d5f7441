//! Explicit constraint model.
//!
//! A [`ConstraintModel`] holds everything a sub-solve needs, in plain data:
//! - named index sets (ordered members, each a tuple of [`Key`]s),
//! - named parameter tables (index tuple → value),
//! - named variable tables (index tuple → value + fixed flag),
//! - named constraint groups (one instance per index tuple, each with an
//!   active flag, a scope function listing the variable entries it reads and
//!   a check function telling whether it holds for the current values).
//!
//! Variables and constraints are indexed over the product of their
//! dimension sets; a member of a set with arity `k` occupies `k` consecutive
//! coordinates of the flat index tuple.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::DecompositionError;

/// One coordinate of an index tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Name(String),
}

/// A flat index tuple. Scalars use the empty tuple.
pub type IndexTuple = Vec<Key>;

impl Key {
    /// Integer value, if this is an integer key.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(v) => Some(*v),
            Key::Name(_) => None,
        }
    }

    /// Name, if this is a named key.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Int(_) => None,
            Key::Name(s) => Some(s),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<u32> for Key {
    fn from(v: u32) -> Self {
        Key::Int(i64::from(v))
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Name(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Name(v)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Name(s) => write!(f, "{s}"),
        }
    }
}

/// Formats an index tuple as `(a, b, ..)`.
pub fn display_tuple(tuple: &[Key]) -> String {
    let parts: Vec<String> = tuple.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

/// A named, ordered collection of members of fixed arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSet {
    pub name: String,
    pub arity: usize,
    members: Vec<IndexTuple>,
}

impl IndexSet {
    /// Creates a set. Duplicate members are dropped, first occurrence wins.
    pub fn new(name: impl Into<String>, arity: usize, members: Vec<IndexTuple>) -> Self {
        let mut seen = BTreeSet::new();
        let members = members
            .into_iter()
            .filter(|m| seen.insert(m.clone()))
            .collect();
        Self {
            name: name.into(),
            arity,
            members,
        }
    }

    /// Creates a one-coordinate set.
    pub fn simple<K: Into<Key>>(name: impl Into<String>, keys: impl IntoIterator<Item = K>) -> Self {
        Self::new(name, 1, keys.into_iter().map(|k| vec![k.into()]).collect())
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[IndexTuple] {
        &self.members
    }

    /// Whether `member` belongs to the set.
    pub fn contains(&self, member: &[Key]) -> bool {
        self.members.iter().any(|m| m.as_slice() == member)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A parameter table with a default for missing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    pub values: BTreeMap<IndexTuple, i64>,
    pub default: i64,
}

impl Parameter {
    /// Value at `index`, or the default.
    pub fn get(&self, index: &[Key]) -> i64 {
        self.values.get(index).copied().unwrap_or(self.default)
    }
}

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    Binary,
    NonNegativeInteger,
}

/// Current value of one variable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariableEntry {
    pub value: i64,
    pub fixed: bool,
}

/// A variable table indexed over the product of its dimension sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub domain: Domain,
    pub entries: BTreeMap<IndexTuple, VariableEntry>,
}

impl Variable {
    /// Value at `index` (0 for entries that do not exist).
    pub fn value(&self, index: &[Key]) -> i64 {
        self.entries.get(index).map(|e| e.value).unwrap_or(0)
    }

    /// Whether the entry exists and is fixed.
    pub fn is_fixed(&self, index: &[Key]) -> bool {
        self.entries.get(index).is_some_and(|e| e.fixed)
    }

    /// Whether every entry is fixed.
    pub fn all_fixed(&self) -> bool {
        self.entries.values().all(|e| e.fixed)
    }

    /// Indices of free entries.
    pub fn free_indices(&self) -> Vec<IndexTuple> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.fixed)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// A reference to one variable entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarRef {
    pub variable: String,
    pub index: IndexTuple,
}

impl VarRef {
    pub fn new(variable: impl Into<String>, index: IndexTuple) -> Self {
        Self {
            variable: variable.into(),
            index,
        }
    }
}

/// Lists the variable entries a constraint instance reads.
pub type ScopeFn = fn(&ConstraintModel, &[Key]) -> Vec<VarRef>;

/// Whether a constraint instance holds for the current values.
pub type CheckFn = fn(&ConstraintModel, &[Key]) -> bool;

/// Objective value of the current values (minimized).
pub type ObjectiveFn = fn(&ConstraintModel) -> i64;

/// A named group of constraint instances sharing one rule.
#[derive(Debug, Clone)]
pub struct ConstraintGroup {
    pub name: String,
    pub dims: Vec<String>,
    pub instances: BTreeMap<IndexTuple, bool>,
    pub scope: ScopeFn,
    pub check: CheckFn,
}

impl ConstraintGroup {
    /// Whether the instance exists and is active.
    pub fn is_active(&self, index: &[Key]) -> bool {
        self.instances.get(index).copied().unwrap_or(false)
    }

    /// Number of active instances.
    pub fn active_count(&self) -> usize {
        self.instances.values().filter(|&&a| a).count()
    }
}

/// Stateful constraint model shared by the iterator and the engine.
#[derive(Debug, Clone)]
pub struct ConstraintModel {
    pub name: String,
    sets: BTreeMap<String, IndexSet>,
    params: BTreeMap<String, Parameter>,
    variables: BTreeMap<String, Variable>,
    constraints: BTreeMap<String, ConstraintGroup>,
    objective: Option<ObjectiveFn>,
}

impl ConstraintModel {
    /// Creates an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sets: BTreeMap::new(),
            params: BTreeMap::new(),
            variables: BTreeMap::new(),
            constraints: BTreeMap::new(),
            objective: None,
        }
    }

    /// Adds (or replaces) an index set.
    pub fn add_set(&mut self, set: IndexSet) {
        self.sets.insert(set.name.clone(), set);
    }

    /// Adds (or replaces) a parameter table.
    pub fn add_param(&mut self, name: impl Into<String>, values: BTreeMap<IndexTuple, i64>, default: i64) {
        self.params.insert(name.into(), Parameter { values, default });
    }

    /// Adds a variable with one free, zero-valued entry per index tuple of
    /// the product of `dims`.
    ///
    /// # Errors
    /// [`DecompositionError::UnknownIndexSet`] if a dimension is not a set.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        dims: &[&str],
        domain: Domain,
    ) -> Result<(), DecompositionError> {
        let name = name.into();
        let entries = self
            .product(dims)?
            .into_iter()
            .map(|idx| (idx, VariableEntry::default()))
            .collect();
        self.variables.insert(
            name.clone(),
            Variable {
                name,
                dims: dims.iter().map(|d| d.to_string()).collect(),
                domain,
                entries,
            },
        );
        Ok(())
    }

    /// Adds a constraint group with one active instance per index tuple of
    /// the product of `dims`.
    ///
    /// # Errors
    /// [`DecompositionError::UnknownIndexSet`] if a dimension is not a set.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        dims: &[&str],
        scope: ScopeFn,
        check: CheckFn,
    ) -> Result<(), DecompositionError> {
        let name = name.into();
        let instances = self
            .product(dims)?
            .into_iter()
            .map(|idx| (idx, true))
            .collect();
        self.constraints.insert(
            name.clone(),
            ConstraintGroup {
                name,
                dims: dims.iter().map(|d| d.to_string()).collect(),
                instances,
                scope,
                check,
            },
        );
        Ok(())
    }

    /// Sets the (minimized) objective.
    pub fn set_objective(&mut self, objective: ObjectiveFn) {
        self.objective = Some(objective);
    }

    /// Objective value of the current assignment (0 without objective).
    pub fn objective_value(&self) -> i64 {
        self.objective.map(|f| f(self)).unwrap_or(0)
    }

    pub fn set(&self, name: &str) -> Option<&IndexSet> {
        self.sets.get(name)
    }

    /// Members of a set (empty for unknown sets).
    pub fn members(&self, name: &str) -> &[IndexTuple] {
        self.sets.get(name).map(IndexSet::members).unwrap_or(&[])
    }

    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    /// Parameter value (0 for unknown parameters).
    pub fn param_value(&self, name: &str, index: &[Key]) -> i64 {
        self.params.get(name).map(|p| p.get(index)).unwrap_or(0)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub(crate) fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub(crate) fn variables_mut(&mut self) -> impl Iterator<Item = &mut Variable> {
        self.variables.values_mut()
    }

    /// Variable value (0 for unknown variables or entries).
    pub fn value(&self, variable: &str, index: &[Key]) -> i64 {
        self.variables
            .get(variable)
            .map(|v| v.value(index))
            .unwrap_or(0)
    }

    /// Sets a variable entry's value, leaving its fixed flag untouched.
    ///
    /// # Errors
    /// [`DecompositionError::UnknownVariable`] for unknown variables.
    /// Unknown entries of known variables are ignored.
    pub fn set_value(&mut self, variable: &str, index: &[Key], value: i64) -> Result<(), DecompositionError> {
        let var = self
            .variables
            .get_mut(variable)
            .ok_or_else(|| DecompositionError::UnknownVariable(variable.to_string()))?;
        if let Some(entry) = var.entries.get_mut(index) {
            entry.value = value;
        }
        Ok(())
    }

    pub fn constraint(&self, name: &str) -> Option<&ConstraintGroup> {
        self.constraints.get(name)
    }

    pub(crate) fn constraint_mut(&mut self, name: &str) -> Option<&mut ConstraintGroup> {
        self.constraints.get_mut(name)
    }

    pub fn constraints(&self) -> impl Iterator<Item = &ConstraintGroup> {
        self.constraints.values()
    }

    pub(crate) fn constraints_mut(&mut self) -> impl Iterator<Item = &mut ConstraintGroup> {
        self.constraints.values_mut()
    }

    /// Whether a constraint instance exists and is active.
    pub fn is_active(&self, constraint: &str, index: &[Key]) -> bool {
        self.constraints
            .get(constraint)
            .is_some_and(|c| c.is_active(index))
    }

    /// Whether a variable entry is free. Entries that do not exist are
    /// reported as fixed.
    pub fn is_free(&self, var_ref: &VarRef) -> bool {
        self.variables
            .get(&var_ref.variable)
            .and_then(|v| v.entries.get(&var_ref.index))
            .is_some_and(|e| !e.fixed)
    }

    /// Active constraint instances whose check fails, as `(group, index)`.
    pub fn violated_constraints(&self) -> Vec<(String, IndexTuple)> {
        self.constraints
            .values()
            .flat_map(|c| {
                c.instances
                    .iter()
                    .filter(move |(idx, &active)| active && !(c.check)(self, idx))
                    .map(move |(idx, _)| (c.name.clone(), idx.clone()))
            })
            .collect()
    }

    /// Arity of each dimension, looked up from the sets.
    ///
    /// # Errors
    /// [`DecompositionError::UnknownIndexSet`] if a dimension is not a set.
    pub fn arities(&self, dims: &[String]) -> Result<Vec<usize>, DecompositionError> {
        dims.iter()
            .map(|d| {
                self.sets
                    .get(d)
                    .map(|s| s.arity)
                    .ok_or_else(|| DecompositionError::UnknownIndexSet(d.clone()))
            })
            .collect()
    }

    /// Drops every member of `set` not in `keep`, together with all variable
    /// entries, parameter values and constraint instances indexed by a
    /// dropped member. Returns the number of dropped members.
    ///
    /// # Errors
    /// [`DecompositionError::UnknownIndexSet`] for unknown sets.
    pub fn shrink_set(&mut self, set: &str, keep: &[IndexTuple]) -> Result<usize, DecompositionError> {
        let index_set = self
            .sets
            .get_mut(set)
            .ok_or_else(|| DecompositionError::UnknownIndexSet(set.to_string()))?;
        let keep: BTreeSet<&IndexTuple> = keep.iter().collect();
        let before = index_set.members.len();
        index_set.members.retain(|m| keep.contains(m));
        let kept: BTreeSet<IndexTuple> = index_set.members.iter().cloned().collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let retained = |dims: &[String], arities: &[usize], idx: &[Key]| {
            split(idx, arities)
                .into_iter()
                .zip(dims)
                .all(|(segment, dim)| dim != set || kept.contains(segment))
        };

        let var_dims: Vec<(String, Vec<String>)> = self
            .variables
            .values()
            .map(|v| (v.name.clone(), v.dims.clone()))
            .collect();
        for (name, dims) in var_dims {
            if !dims.iter().any(|d| d == set) {
                continue;
            }
            let arities = self.arities(&dims)?;
            if let Some(var) = self.variables.get_mut(&name) {
                var.entries
                    .retain(|idx, _| retained(dims.as_slice(), arities.as_slice(), idx.as_slice()));
            }
        }

        let con_dims: Vec<(String, Vec<String>)> = self
            .constraints
            .values()
            .map(|c| (c.name.clone(), c.dims.clone()))
            .collect();
        for (name, dims) in con_dims {
            if !dims.iter().any(|d| d == set) {
                continue;
            }
            let arities = self.arities(&dims)?;
            if let Some(group) = self.constraints.get_mut(&name) {
                group
                    .instances
                    .retain(|idx, _| retained(dims.as_slice(), arities.as_slice(), idx.as_slice()));
            }
        }

        Ok(removed)
    }

    /// Cartesian product of the members of `dims`, flattened.
    fn product(&self, dims: &[&str]) -> Result<Vec<IndexTuple>, DecompositionError> {
        let mut tuples: Vec<IndexTuple> = vec![Vec::new()];
        for dim in dims {
            let set = self
                .sets
                .get(*dim)
                .ok_or_else(|| DecompositionError::UnknownIndexSet(dim.to_string()))?;
            tuples = tuples
                .iter()
                .flat_map(|prefix| {
                    set.members.iter().map(move |m| {
                        let mut t = prefix.clone();
                        t.extend(m.iter().cloned());
                        t
                    })
                })
                .collect();
        }
        Ok(tuples)
    }
}

/// Splits a flat index tuple into one segment per dimension.
///
/// A tuple shorter than the arities require yields fewer segments.
pub fn split<'a>(index: &'a [Key], arities: &[usize]) -> Vec<&'a [Key]> {
    let mut segments = Vec::with_capacity(arities.len());
    let mut offset = 0;
    for &arity in arities {
        if offset + arity > index.len() {
            break;
        }
        segments.push(&index[offset..offset + arity]);
        offset += arity;
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(v: i64) -> Key {
        Key::Int(v)
    }

    fn sum_le_two(model: &ConstraintModel, idx: &[Key]) -> bool {
        let total: i64 = model
            .members("P")
            .iter()
            .map(|p| {
                let mut i = idx.to_vec();
                i.extend(p.iter().cloned());
                model.value("x", &i)
            })
            .sum();
        total <= 2
    }

    fn row_scope(model: &ConstraintModel, idx: &[Key]) -> Vec<VarRef> {
        model
            .members("P")
            .iter()
            .map(|p| {
                let mut i = idx.to_vec();
                i.extend(p.iter().cloned());
                VarRef::new("x", i)
            })
            .collect()
    }

    fn sample_model() -> ConstraintModel {
        let mut m = ConstraintModel::new("sample");
        m.add_set(IndexSet::simple("J", [1i64, 2]));
        m.add_set(IndexSet::simple("P", [0i64, 1, 2]));
        m.add_set(IndexSet::new(
            "JM",
            2,
            vec![vec![k(1), k(1)], vec![k(1), k(2)], vec![k(2), k(1)]],
        ));
        m.add_variable("x", &["J", "P"], Domain::Binary).unwrap();
        m.add_variable("y", &["JM"], Domain::Binary).unwrap();
        m.add_constraint("row", &["J"], row_scope, sum_le_two).unwrap();
        m
    }

    #[test]
    fn test_variable_product() {
        let m = sample_model();
        assert_eq!(m.variable("x").unwrap().entries.len(), 6);
        assert_eq!(m.variable("y").unwrap().entries.len(), 3);
        assert!(m.variable("y").unwrap().entries.contains_key(&vec![k(1), k(2)]));
        assert_eq!(m.constraint("row").unwrap().active_count(), 2);
    }

    #[test]
    fn test_unknown_set() {
        let mut m = sample_model();
        let err = m.add_variable("z", &["Q"], Domain::Binary).unwrap_err();
        assert_eq!(err, DecompositionError::UnknownIndexSet("Q".into()));
    }

    #[test]
    fn test_values_and_violations() {
        let mut m = sample_model();
        assert!(m.violated_constraints().is_empty());

        for p in 0..3 {
            m.set_value("x", &[k(1), k(p)], 1).unwrap();
        }
        assert_eq!(m.value("x", &[k(1), k(2)]), 1);
        assert_eq!(m.violated_constraints(), vec![("row".to_string(), vec![k(1)])]);
        assert!(m.set_value("nope", &[], 1).is_err());
    }

    #[test]
    fn test_is_free() {
        let mut m = sample_model();
        let r = VarRef::new("x", vec![k(1), k(0)]);
        assert!(m.is_free(&r));
        m.variable_mut("x").unwrap().entries.get_mut(&r.index).unwrap().fixed = true;
        assert!(!m.is_free(&r));
        assert!(!m.is_free(&VarRef::new("x", vec![k(9), k(0)])));
    }

    #[test]
    fn test_shrink_set() {
        let mut m = sample_model();
        let removed = m.shrink_set("P", &[vec![k(0)], vec![k(1)]]).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(m.members("P").len(), 2);
        assert_eq!(m.variable("x").unwrap().entries.len(), 4);
        assert_eq!(m.variable("y").unwrap().entries.len(), 3);
        assert_eq!(m.shrink_set("P", &[vec![k(0)], vec![k(1)]]).unwrap(), 0);
    }

    #[test]
    fn test_split() {
        let idx = vec![k(1), k(2), k(3)];
        assert_eq!(split(&idx, &[2, 1]), vec![&idx[0..2], &idx[2..3]]);
        assert_eq!(split(&idx, &[1, 1, 1]).len(), 3);
        assert_eq!(split(&idx, &[4]).len(), 0);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(display_tuple(&[k(3), Key::from("R1")]), "(3, R1)");
        assert_eq!(Key::from(7u32).as_int(), Some(7));
        assert_eq!(Key::from("N1").as_name(), Some("N1"));
    }
}
