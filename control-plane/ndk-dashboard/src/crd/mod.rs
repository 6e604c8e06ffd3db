pub mod application;
pub mod protection_plan;
pub mod reference_grant;
pub mod restore;
pub mod snapshot;
pub mod storage_cluster;

pub use application::*;
pub use protection_plan::*;
pub use reference_grant::*;
pub use restore::*;
pub use snapshot::*;
pub use storage_cluster::*;
