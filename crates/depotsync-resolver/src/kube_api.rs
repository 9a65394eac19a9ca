use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Pod, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use serde_json::{json, Value};

use crate::{AffectedUnit, ClusterApi, ClusterError, WorkloadKind, WorkloadObject, WorkloadRef};

/// [`ClusterApi`] backed by the Kubernetes API, scoped to one namespace.
#[derive(Clone)]
pub struct KubeClusterApi {
    pods: Api<Pod>,
    deployments: Api<Deployment>,
    stateful_sets: Api<StatefulSet>,
    daemon_sets: Api<DaemonSet>,
    replica_sets: Api<ReplicaSet>,
}

impl KubeClusterApi {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client.clone(), namespace),
            deployments: Api::namespaced(client.clone(), namespace),
            stateful_sets: Api::namespaced(client.clone(), namespace),
            daemon_sets: Api::namespaced(client.clone(), namespace),
            replica_sets: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_units(&self, selector: &str) -> Result<Vec<AffectedUnit>, ClusterError> {
        let pods = self
            .pods
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|err| cluster_error(err, "Pod", selector))?;

        Ok(pods
            .items
            .into_iter()
            .map(|pod| AffectedUnit {
                owners: owner_refs(&pod.metadata),
                name: pod.metadata.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn get_workload(
        &self,
        kind: WorkloadKind,
        name: &str,
    ) -> Result<WorkloadObject, ClusterError> {
        let map_err = |err| cluster_error(err, kind.as_str(), name);
        let object = match kind {
            WorkloadKind::Deployment => {
                let deployment = self.deployments.get(name).await.map_err(map_err)?;
                let spec = deployment.spec.unwrap_or_default();
                workload_object(
                    kind,
                    name,
                    &deployment.metadata,
                    Some(&spec.template),
                    spec.replicas,
                )
            }
            WorkloadKind::StatefulSet => {
                let stateful_set = self.stateful_sets.get(name).await.map_err(map_err)?;
                let spec = stateful_set.spec.unwrap_or_default();
                workload_object(
                    kind,
                    name,
                    &stateful_set.metadata,
                    Some(&spec.template),
                    spec.replicas,
                )
            }
            WorkloadKind::DaemonSet => {
                let daemon_set = self.daemon_sets.get(name).await.map_err(map_err)?;
                let spec = daemon_set.spec.unwrap_or_default();
                workload_object(kind, name, &daemon_set.metadata, Some(&spec.template), None)
            }
            WorkloadKind::ReplicaSet => {
                let replica_set = self.replica_sets.get(name).await.map_err(map_err)?;
                let spec = replica_set.spec.unwrap_or_default();
                workload_object(
                    kind,
                    name,
                    &replica_set.metadata,
                    spec.template.as_ref(),
                    spec.replicas,
                )
            }
        };
        Ok(object)
    }

    async fn update_workload(&self, object: &WorkloadObject) -> Result<(), ClusterError> {
        let patch = Patch::Merge(workload_patch(object));
        let params = PatchParams::default();
        let name = object.name.as_str();
        let result = match object.kind {
            WorkloadKind::Deployment => self
                .deployments
                .patch(name, &params, &patch)
                .await
                .map(drop),
            WorkloadKind::StatefulSet => self
                .stateful_sets
                .patch(name, &params, &patch)
                .await
                .map(drop),
            WorkloadKind::DaemonSet => self
                .daemon_sets
                .patch(name, &params, &patch)
                .await
                .map(drop),
            WorkloadKind::ReplicaSet => self
                .replica_sets
                .patch(name, &params, &patch)
                .await
                .map(drop),
        };
        result.map_err(|err| cluster_error(err, object.kind.as_str(), name))
    }
}

/// Merge patch writing the template annotations and replica count back. The
/// resource version, when known, turns the patch into a conditional update.
pub fn workload_patch(object: &WorkloadObject) -> Value {
    let mut spec = json!({
        "template": {
            "metadata": {
                "annotations": object.template_annotations,
            },
        },
    });
    if let Some(replicas) = object.replicas {
        spec["replicas"] = json!(replicas);
    }

    let mut patch = json!({ "spec": spec });
    if let Some(resource_version) = &object.resource_version {
        patch["metadata"] = json!({ "resourceVersion": resource_version });
    }
    patch
}

fn workload_object(
    kind: WorkloadKind,
    name: &str,
    metadata: &ObjectMeta,
    template: Option<&PodTemplateSpec>,
    replicas: Option<i32>,
) -> WorkloadObject {
    let template_annotations = template
        .and_then(|template| template.metadata.as_ref())
        .and_then(|metadata| metadata.annotations.clone())
        .unwrap_or_else(BTreeMap::new);

    WorkloadObject {
        kind,
        name: name.to_string(),
        owners: owner_refs(metadata),
        template_annotations,
        replicas,
        resource_version: metadata.resource_version.clone(),
    }
}

fn owner_refs(metadata: &ObjectMeta) -> Vec<WorkloadRef> {
    metadata
        .owner_references
        .iter()
        .flatten()
        .map(|owner| WorkloadRef::new(owner.kind.clone(), owner.name.clone()))
        .collect()
}

fn cluster_error(err: kube::Error, kind: &str, name: &str) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 409 => ClusterError::Conflict {
            kind: kind.to_string(),
            name: name.to_string(),
            message: response.message,
        },
        other => ClusterError::Request {
            kind: kind.to_string(),
            name: name.to_string(),
            source: Box::new(other),
        },
    }
}
