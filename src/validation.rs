//! Input validation for MRCPSP instances.
//!
//! Checks referential integrity of the flattened instance records before an
//! [`Instance`](crate::models::Instance) is built. Detects:
//! - Duplicate job / resource IDs and duplicate (job, mode) durations
//! - Jobs without any mode
//! - Needs and durations referencing unknown jobs, modes or resources
//! - Successors referencing unknown jobs
//!
//! The precedence relation is assumed acyclic and is not checked here.

use crate::models::InstanceData;
use std::collections::HashSet;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A record references a resource that doesn't exist.
    InvalidResourceReference,
    /// A record references a job that doesn't exist.
    InvalidJobReference,
    /// A need references a (job, mode) pair without a duration.
    InvalidModeReference,
    /// A job lists a successor that doesn't exist.
    InvalidSuccessor,
    /// A job has no modes.
    EmptyJob,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Validates flattened instance records.
///
/// Checks:
/// 1. No duplicate job IDs
/// 2. No duplicate resource IDs
/// 3. No duplicate (job, mode) durations
/// 4. Durations reference existing jobs
/// 5. Every job has at least one mode
/// 6. Needs reference existing resources and existing (job, mode) pairs
/// 7. Successors reference existing jobs
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_records(data: &InstanceData) -> ValidationResult {
    let mut errors = Vec::new();

    let mut resource_ids = HashSet::new();
    for r in &data.resources {
        if !resource_ids.insert(r.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate resource ID: {}", r.id),
            ));
        }
    }

    let mut job_ids = HashSet::new();
    for j in &data.jobs {
        if !job_ids.insert(j.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate job ID: {}", j.id),
            ));
        }
    }

    let mut job_modes = HashSet::new();
    for d in &data.durations {
        if !job_ids.contains(&d.job) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidJobReference,
                format!("Duration references unknown job {}", d.job),
            ));
            continue;
        }
        if !job_modes.insert((d.job, d.mode)) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate duration for job {} mode {}", d.job, d.mode),
            ));
        }
    }

    for j in &data.jobs {
        if !job_modes.iter().any(|&(job, _)| job == j.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyJob,
                format!("Job {} has no modes", j.id),
            ));
        }
        for succ in &j.successors {
            if !job_ids.contains(succ) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidSuccessor,
                    format!("Job {} references unknown successor {}", j.id, succ),
                ));
            }
        }
    }

    for n in &data.needs {
        if !resource_ids.contains(n.resource.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidResourceReference,
                format!(
                    "Need of job {} mode {} references unknown resource '{}'",
                    n.job, n.mode, n.resource
                ),
            ));
        }
        if !job_ids.contains(&n.job) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidJobReference,
                format!("Need references unknown job {}", n.job),
            ));
        } else if !job_modes.contains(&(n.job, n.mode)) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidModeReference,
                format!("Need references job {} mode {} without a duration", n.job, n.mode),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DurationRecord, JobRecord, NeedRecord, ResourceRecord};

    fn job(id: u32, successors: Vec<u32>) -> JobRecord {
        JobRecord { id, successors }
    }

    fn duration(job: u32, mode: u32, duration: u32) -> DurationRecord {
        DurationRecord {
            job,
            mode,
            duration,
        }
    }

    fn need(job: u32, mode: u32, resource: &str, need: u32) -> NeedRecord {
        NeedRecord {
            job,
            mode,
            resource: resource.into(),
            need,
        }
    }

    fn sample() -> InstanceData {
        InstanceData {
            jobs: vec![job(1, vec![2]), job(2, vec![])],
            resources: vec![ResourceRecord {
                id: "R1".into(),
                available: 3,
                kind: None,
            }],
            needs: vec![need(1, 1, "R1", 2), need(2, 1, "R1", 1)],
            durations: vec![duration(1, 1, 4), duration(2, 1, 2)],
        }
    }

    fn kinds(data: &InstanceData) -> Vec<ValidationErrorKind> {
        validate_records(data)
            .unwrap_err()
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_records(&sample()).is_ok());
    }

    #[test]
    fn test_duplicate_job_id() {
        let mut data = sample();
        data.jobs.push(job(1, vec![]));
        assert!(kinds(&data).contains(&ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_duplicate_resource_id() {
        let mut data = sample();
        data.resources.push(data.resources[0].clone());
        let errors = validate_records(&data).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId && e.message.contains("resource")));
    }

    #[test]
    fn test_empty_job() {
        let mut data = sample();
        data.jobs.push(job(3, vec![]));
        assert!(kinds(&data).contains(&ValidationErrorKind::EmptyJob));
    }

    #[test]
    fn test_invalid_successor() {
        let mut data = sample();
        data.jobs[1].successors.push(42);
        assert!(kinds(&data).contains(&ValidationErrorKind::InvalidSuccessor));
    }

    #[test]
    fn test_need_without_duration() {
        let mut data = sample();
        data.needs.push(need(2, 3, "R1", 1));
        assert_eq!(kinds(&data), vec![ValidationErrorKind::InvalidModeReference]);
    }

    #[test]
    fn test_need_unknown_resource() {
        let mut data = sample();
        data.needs.push(need(1, 1, "N1", 1));
        assert_eq!(
            kinds(&data),
            vec![ValidationErrorKind::InvalidResourceReference]
        );
    }

    #[test]
    fn test_duration_unknown_job() {
        let mut data = sample();
        data.durations.push(duration(9, 1, 1));
        assert!(kinds(&data).contains(&ValidationErrorKind::InvalidJobReference));
    }

    #[test]
    fn test_multiple_errors() {
        let mut data = sample();
        data.jobs.push(job(3, vec![99]));
        data.needs.push(need(1, 1, "X", 1));

        let errors = validate_records(&data).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
