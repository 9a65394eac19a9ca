mod api;
mod error;
mod kube_api;
mod resolve;
mod restart;
mod types;

pub use api::ClusterApi;
pub use error::{ClusterError, RestartError};
pub use kube_api::{workload_patch, KubeClusterApi};
pub use restart::{WorkloadRestarter, DEFAULT_SCALE_GRACE, RESTARTED_AT_ANNOTATION};
pub use types::{AffectedUnit, RestartReport, WorkloadKind, WorkloadObject, WorkloadRef};
