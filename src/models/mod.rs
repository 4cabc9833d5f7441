//! MRCPSP domain models.
//!
//! Provides the data types describing a problem instance and its solution.
//!
//! # Domain Mappings
//!
//! | u-mrcpsp | Construction | Software | Manufacturing |
//! |----------|--------------|----------|---------------|
//! | Job | Activity | Work item | Operation |
//! | Mode | Crew size option | Staffing option | Machine setting |
//! | Renewable resource | Crane | Developer | Machine |
//! | Non-renewable resource | Budget | Budget | Raw material |

mod instance;
mod job;
mod resource;
mod solution;

pub use instance::{
    DurationRecord, Instance, InstanceData, JobRecord, NeedRecord, ResourceRecord,
};
pub use job::{Job, JobId, Mode, ModeId};
pub use resource::{Resource, ResourceId, ResourceKind};
pub use solution::{Assignment, Solution, SolutionData};
