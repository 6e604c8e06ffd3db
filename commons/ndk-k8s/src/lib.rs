pub mod error;
pub mod kinds;
pub mod traits;

#[cfg(feature = "kube")]
pub mod kube_client;

#[cfg(feature = "memory")]
pub mod memory;

pub use error::*;
pub use kinds::*;
pub use traits::*;

#[cfg(feature = "kube")]
pub use kube_client::KubeResourceClient;
