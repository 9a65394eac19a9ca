use async_trait::async_trait;

use crate::{AffectedUnit, ClusterError, WorkloadKind, WorkloadObject};

/// Namespaced cluster operations used by the restarter.
///
/// Implementations propagate "not found" and update conflicts as distinct
/// [`ClusterError`] variants.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_units(&self, selector: &str) -> Result<Vec<AffectedUnit>, ClusterError>;

    async fn get_workload(
        &self,
        kind: WorkloadKind,
        name: &str,
    ) -> Result<WorkloadObject, ClusterError>;

    /// Writes back template annotations and replicas. A set resource version
    /// makes the write conditional on the object not having changed since.
    async fn update_workload(&self, object: &WorkloadObject) -> Result<(), ClusterError>;
}
