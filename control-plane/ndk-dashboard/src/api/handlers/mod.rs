pub mod applications;
pub mod deployment;
pub mod protection_plans;
pub mod restores;
pub mod snapshots;
pub mod storage;

pub use applications::*;
pub use deployment::*;
pub use protection_plans::*;
pub use restores::*;
pub use snapshots::*;
pub use storage::*;
