pub mod applications;
pub mod deployment;
pub mod kube_ops;
pub mod protection_plans;
pub mod restore;
pub mod snapshots;
pub mod storage;

pub use applications::{ApplicationService, DeleteResult};
pub use deployment::{DeployRequest, DeployResult, DeploymentService};
pub use protection_plans::{ProtectionPlanService, TriggerResult};
pub use restore::{RestoreRequest, RestoreResult, RestoreService};
pub use snapshots::SnapshotService;
pub use storage::StorageService;
