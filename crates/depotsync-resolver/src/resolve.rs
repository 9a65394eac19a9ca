use tracing::debug;

use crate::{AffectedUnit, ClusterApi, RestartError, WorkloadKind, WorkloadRef};

/// Maps a pod to the workload that should be restarted for it.
///
/// Only one level of ownership is flattened: a pod owned by a replica set
/// resolves to that replica set's first owner (normally a deployment). When the
/// replica set cannot be fetched or has no owner, the replica set itself is
/// returned. Deeper chains are not walked.
pub(crate) async fn resolve_owner<A>(
    api: &A,
    unit: &AffectedUnit,
) -> Result<WorkloadRef, RestartError>
where
    A: ClusterApi + ?Sized,
{
    let Some(owner) = unit.owners.first() else {
        return Err(RestartError::NoOwner {
            unit: unit.name.clone(),
        });
    };

    if WorkloadKind::parse(&owner.kind) != Some(WorkloadKind::ReplicaSet) {
        return Ok(owner.clone());
    }

    match api.get_workload(WorkloadKind::ReplicaSet, &owner.name).await {
        Ok(replica_set) => match replica_set.owners.into_iter().next() {
            Some(parent) => Ok(parent),
            None => Ok(owner.clone()),
        },
        Err(err) => {
            debug!(pod = %unit.name, replica_set = %owner.name, error = %err, "failed to fetch replica set owner, restarting replica set directly");
            Ok(owner.clone())
        }
    }
}
