//! Resource model.
//!
//! MRCPSP distinguishes two kinds of resources:
//! - **Renewable** resources bound the usage of every single period
//!   (machines, crews); their capacity is restored each period.
//! - **Non-renewable** resources bound the cumulative usage over the whole
//!   project (budget, raw material).
//!
//! # Reference
//! Talbot (1982), "Resource-Constrained Project Scheduling with Time-Resource
//! Tradeoffs: The Nonpreemptive Case"

use serde::{Deserialize, Serialize};

/// Resource identifier (e.g. `"R1"`, `"N2"`).
pub type ResourceId = String;

/// A resource shared by all jobs of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: ResourceId,
    /// Renewable or non-renewable.
    pub kind: ResourceKind,
    /// Available capacity (per period for renewable, in total otherwise).
    pub capacity: u32,
}

/// Resource kind.
///
/// Serialized with the legacy one-letter codes (`"R"`, `"N"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Capacity bounds per-period usage.
    #[serde(rename = "R")]
    Renewable,
    /// Capacity bounds cumulative usage.
    #[serde(rename = "N")]
    NonRenewable,
}

impl ResourceKind {
    /// Infers the kind from the identifier prefix.
    ///
    /// Benchmark instances name renewable resources `R*` and non-renewable
    /// ones `N*`; anything not starting with `R` is treated as non-renewable.
    pub fn from_id(id: &str) -> Self {
        if id.starts_with('R') {
            Self::Renewable
        } else {
            Self::NonRenewable
        }
    }
}

impl Resource {
    /// Creates a new resource.
    pub fn new(id: impl Into<ResourceId>, kind: ResourceKind, capacity: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            capacity,
        }
    }

    /// Creates a renewable resource.
    pub fn renewable(id: impl Into<ResourceId>, capacity: u32) -> Self {
        Self::new(id, ResourceKind::Renewable, capacity)
    }

    /// Creates a non-renewable resource.
    pub fn non_renewable(id: impl Into<ResourceId>, capacity: u32) -> Self {
        Self::new(id, ResourceKind::NonRenewable, capacity)
    }

    /// Whether capacity is restored each period.
    pub fn is_renewable(&self) -> bool {
        self.kind == ResourceKind::Renewable
    }
}
