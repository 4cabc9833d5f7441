//! Problem instance.
//!
//! An [`Instance`] is the immutable description of an MRCPSP problem: jobs
//! with their modes and precedence, and the resources they compete for.
//! It is built either from domain objects ([`Instance::new`]) or from the
//! flattened interchange records ([`InstanceData`]) and is validated for
//! referential consistency on construction.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{Job, JobId, ModeId, Resource, ResourceId, ResourceKind};
use crate::error::ModelError;
use crate::validation;

/// Flattened instance records (interchange format).
///
/// ```json
/// {
///   "jobs": [{"id": 1, "successors": [2]}],
///   "resources": [{"id": "R1", "available": 4}],
///   "needs": [{"job": 1, "mode": 1, "resource": "R1", "need": 2}],
///   "durations": [{"job": 1, "mode": 1, "duration": 3}]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceData {
    pub jobs: Vec<JobRecord>,
    pub resources: Vec<ResourceRecord>,
    pub needs: Vec<NeedRecord>,
    pub durations: Vec<DurationRecord>,
}

/// A job and its successors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    #[serde(default)]
    pub successors: Vec<JobId>,
}

/// A resource and its capacity.
///
/// `type` is optional; without it the kind is inferred from the id prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub available: u32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResourceKind>,
}

/// Requirement of a job on a resource under a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedRecord {
    pub job: JobId,
    pub mode: ModeId,
    pub resource: ResourceId,
    pub need: u32,
}

/// Duration of a job under a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRecord {
    pub job: JobId,
    pub mode: ModeId,
    pub duration: u32,
}

/// A validated MRCPSP instance.
///
/// Jobs keep the order in which they were supplied.
/// [`construction_order`](Instance::construction_order) derives from it the
/// precedence-respecting order used by the incremental construction.
#[derive(Debug, Clone)]
pub struct Instance {
    jobs: Vec<Job>,
    resources: Vec<Resource>,
    job_index: HashMap<JobId, usize>,
}

impl Instance {
    /// Builds an instance from domain objects.
    ///
    /// Every mode gets an explicit (possibly zero) need entry for every
    /// resource.
    ///
    /// # Errors
    /// [`ModelError::Inconsistent`] when IDs are duplicated, jobs have no
    /// modes, or successors / needs reference unknown jobs or resources.
    pub fn new(jobs: Vec<Job>, resources: Vec<Resource>) -> Result<Self, ModelError> {
        Self::from_data(&to_records(&jobs, &resources))
    }

    /// Builds an instance from flattened records.
    ///
    /// # Errors
    /// [`ModelError::Inconsistent`] with every problem found.
    pub fn from_data(data: &InstanceData) -> Result<Self, ModelError> {
        validation::validate_records(data).map_err(ModelError::Inconsistent)?;

        let resources: Vec<Resource> = data
            .resources
            .iter()
            .map(|r| {
                let kind = r.kind.unwrap_or_else(|| ResourceKind::from_id(&r.id));
                Resource::new(r.id.clone(), kind, r.available)
            })
            .collect();

        let mut jobs: Vec<Job> = data
            .jobs
            .iter()
            .map(|j| Job {
                id: j.id,
                successors: j.successors.clone(),
                modes: BTreeMap::new(),
            })
            .collect();
        let job_index: HashMap<JobId, usize> =
            jobs.iter().enumerate().map(|(i, j)| (j.id, i)).collect();

        for d in &data.durations {
            let job = &mut jobs[job_index[&d.job]];
            let mode = job.modes.entry(d.mode).or_default();
            mode.duration = d.duration;
            for r in &resources {
                mode.needs.entry(r.id.clone()).or_insert(0);
            }
        }
        for n in &data.needs {
            let job = &mut jobs[job_index[&n.job]];
            if let Some(mode) = job.modes.get_mut(&n.mode) {
                mode.needs.insert(n.resource.clone(), n.need);
            }
        }

        Ok(Self {
            jobs,
            resources,
            job_index,
        })
    }

    /// Exports the flattened records.
    pub fn to_data(&self) -> InstanceData {
        to_records(&self.jobs, &self.resources)
    }

    /// All jobs in index order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Looks a job up by identifier.
    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.job_index.get(&id).map(|&i| &self.jobs[i])
    }

    /// Job identifiers in index order.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|j| j.id).collect()
    }

    /// All resources.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Looks a resource up by identifier.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Renewable resources.
    pub fn renewable_resources(&self) -> Vec<&Resource> {
        self.resources.iter().filter(|r| r.is_renewable()).collect()
    }

    /// Non-renewable resources.
    pub fn non_renewable_resources(&self) -> Vec<&Resource> {
        self.resources.iter().filter(|r| !r.is_renewable()).collect()
    }

    /// Longest duration of a job across its modes.
    pub fn max_duration(&self, job: JobId) -> Option<u32> {
        self.job(job).map(Job::max_duration)
    }

    /// Flattened precedence relation as `(predecessor, successor)` pairs.
    pub fn precedence_edges(&self) -> Vec<(JobId, JobId)> {
        self.jobs
            .iter()
            .flat_map(|j| j.successors.iter().map(move |&s| (j.id, s)))
            .collect()
    }

    /// Job identifiers with every predecessor before its successors.
    ///
    /// Ties go to the job supplied first, so an instance already listed in
    /// precedence order keeps its index order. Jobs on a cycle follow the
    /// rest in index order.
    pub fn construction_order(&self) -> Vec<JobId> {
        let n = self.jobs.len();
        let mut indegree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (a, job) in self.jobs.iter().enumerate() {
            for s in &job.successors {
                if let Some(&b) = self.job_index.get(s) {
                    successors[a].push(b);
                    indegree[b] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];
        while let Some(i) = ready.pop_first() {
            order.push(self.jobs[i].id);
            placed[i] = true;
            for &b in &successors[i] {
                indegree[b] -= 1;
                if indegree[b] == 0 {
                    ready.insert(b);
                }
            }
        }
        order.extend((0..n).filter(|&i| !placed[i]).map(|i| self.jobs[i].id));
        order
    }

    /// Loose makespan upper bound: every job run serially in its longest mode.
    pub fn horizon_upper_bound(&self) -> u32 {
        self.jobs.iter().map(Job::max_duration).sum()
    }

    /// Whether every requirement of a mode fits the resource capacities.
    ///
    /// Modes failing this can never appear in a feasible schedule.
    pub fn mode_fits_capacity(&self, job: &Job, mode: ModeId) -> bool {
        match job.mode(mode) {
            None => false,
            Some(m) => self.resources.iter().all(|r| m.need(&r.id) <= r.capacity),
        }
    }

    /// Number of jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

fn to_records(jobs: &[Job], resources: &[Resource]) -> InstanceData {
    let mut data = InstanceData {
        resources: resources
            .iter()
            .map(|r| ResourceRecord {
                id: r.id.clone(),
                available: r.capacity,
                kind: Some(r.kind),
            })
            .collect(),
        ..InstanceData::default()
    };

    for job in jobs {
        data.jobs.push(JobRecord {
            id: job.id,
            successors: job.successors.clone(),
        });
        for (&mode_id, mode) in &job.modes {
            data.durations.push(DurationRecord {
                job: job.id,
                mode: mode_id,
                duration: mode.duration,
            });
            data.needs.extend(mode.needs.iter().map(|(resource, &need)| NeedRecord {
                job: job.id,
                mode: mode_id,
                resource: resource.clone(),
                need,
            }));
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mode;
    use crate::validation::ValidationErrorKind;

    fn sample_data() -> InstanceData {
        InstanceData {
            jobs: vec![
                JobRecord {
                    id: 1,
                    successors: vec![2],
                },
                JobRecord {
                    id: 2,
                    successors: vec![],
                },
            ],
            resources: vec![
                ResourceRecord {
                    id: "R1".into(),
                    available: 2,
                    kind: None,
                },
                ResourceRecord {
                    id: "N1".into(),
                    available: 10,
                    kind: None,
                },
            ],
            needs: vec![
                NeedRecord {
                    job: 1,
                    mode: 1,
                    resource: "R1".into(),
                    need: 1,
                },
                NeedRecord {
                    job: 2,
                    mode: 2,
                    resource: "N1".into(),
                    need: 4,
                },
            ],
            durations: vec![
                DurationRecord {
                    job: 1,
                    mode: 1,
                    duration: 3,
                },
                DurationRecord {
                    job: 2,
                    mode: 1,
                    duration: 5,
                },
                DurationRecord {
                    job: 2,
                    mode: 2,
                    duration: 2,
                },
            ],
        }
    }

    #[test]
    fn test_from_data() {
        let inst = Instance::from_data(&sample_data()).unwrap();

        assert_eq!(inst.job_count(), 2);
        assert_eq!(inst.job_ids(), vec![1, 2]);
        assert_eq!(inst.max_duration(2), Some(5));
        assert_eq!(inst.precedence_edges(), vec![(1, 2)]);
        assert_eq!(inst.horizon_upper_bound(), 8);
        assert_eq!(inst.renewable_resources().len(), 1);
        assert_eq!(inst.non_renewable_resources()[0].id, "N1");
    }

    #[test]
    fn test_missing_needs_default_to_zero() {
        let inst = Instance::from_data(&sample_data()).unwrap();
        let job2 = inst.job(2).unwrap();

        // every mode lists every resource
        for mode in job2.modes.values() {
            assert_eq!(mode.needs.len(), 2);
        }
        assert_eq!(job2.need(1, "N1"), 0);
        assert_eq!(job2.need(2, "N1"), 4);
    }

    #[test]
    fn test_explicit_kind_overrides_prefix() {
        let mut data = sample_data();
        data.resources[1].kind = Some(ResourceKind::Renewable);
        let inst = Instance::from_data(&data).unwrap();
        assert_eq!(inst.renewable_resources().len(), 2);
    }

    #[test]
    fn test_dangling_need_rejected() {
        let mut data = sample_data();
        data.needs.push(NeedRecord {
            job: 1,
            mode: 7,
            resource: "R1".into(),
            need: 1,
        });

        match Instance::from_data(&data) {
            Err(ModelError::Inconsistent(errors)) => {
                assert!(errors
                    .iter()
                    .any(|e| e.kind == ValidationErrorKind::InvalidModeReference));
            }
            other => panic!("expected inconsistency, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_resource_rejected() {
        let mut data = sample_data();
        data.needs[0].resource = "R9".into();
        assert!(Instance::from_data(&data).is_err());
    }

    #[test]
    fn test_domain_objects_round_trip() {
        let jobs = vec![
            Job::new(1)
                .with_successor(2)
                .with_mode(1, Mode::new(2).with_need("R1", 1)),
            Job::new(2).with_mode(1, Mode::new(1)),
        ];
        let resources = vec![Resource::renewable("R1", 1)];
        let inst = Instance::new(jobs, resources).unwrap();

        let again = Instance::from_data(&inst.to_data()).unwrap();
        assert_eq!(again.jobs(), inst.jobs());
        assert_eq!(again.resources(), inst.resources());
    }

    #[test]
    fn test_json_interchange() {
        let json = r#"{
            "jobs": [{"id": 1, "successors": [2]}, {"id": 2, "successors": []}],
            "resources": [{"id": "R1", "available": 1}],
            "needs": [{"job": 1, "mode": 1, "resource": "R1", "need": 1}],
            "durations": [
                {"job": 1, "mode": 1, "duration": 2},
                {"job": 2, "mode": 1, "duration": 3}
            ]
        }"#;
        let data: InstanceData = serde_json::from_str(json).unwrap();
        let inst = Instance::from_data(&data).unwrap();
        assert_eq!(inst.resource("R1").unwrap().kind, ResourceKind::Renewable);
        assert_eq!(inst.horizon_upper_bound(), 5);
    }

    #[test]
    fn test_construction_order_follows_precedence() {
        let job = |id: u32| Job::new(id).with_mode(1, Mode::new(1).with_need("R1", 1));
        let instance = Instance::new(
            vec![job(1), job(2).with_successor(1), job(3).with_successor(2), job(4)],
            vec![Resource::renewable("R1", 1)],
        )
        .unwrap();
        assert_eq!(instance.construction_order(), vec![3, 2, 1, 4]);

        let listed = Instance::new(
            vec![job(1).with_successor(3), job(2), job(3)],
            vec![Resource::renewable("R1", 1)],
        )
        .unwrap();
        assert_eq!(listed.construction_order(), vec![1, 2, 3]);
    }

    #[test]
    fn test_mode_fits_capacity() {
        let jobs = vec![Job::new(1)
            .with_mode(1, Mode::new(1).with_need("R1", 3))
            .with_mode(2, Mode::new(2).with_need("R1", 1))];
        let inst = Instance::new(jobs, vec![Resource::renewable("R1", 2)]).unwrap();
        let job = inst.job(1).unwrap();

        assert!(!inst.mode_fits_capacity(job, 1));
        assert!(inst.mode_fits_capacity(job, 2));
        assert!(!inst.mode_fits_capacity(job, 3));
    }
}
