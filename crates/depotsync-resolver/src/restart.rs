use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use crate::resolve::resolve_owner;
use crate::{
    AffectedUnit, ClusterApi, RestartError, RestartReport, WorkloadKind, WorkloadObject,
    WorkloadRef,
};

pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";
pub const DEFAULT_SCALE_GRACE: Duration = Duration::from_secs(2);

// The API server defaults an unset replica count to one.
const DEFAULT_REPLICAS: i32 = 1;

pub struct WorkloadRestarter<A> {
    api: A,
    scale_grace: Duration,
}

impl<A: ClusterApi> WorkloadRestarter<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            scale_grace: DEFAULT_SCALE_GRACE,
        }
    }

    pub fn with_scale_grace(mut self, scale_grace: Duration) -> Self {
        self.scale_grace = scale_grace;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn resolve_owner(&self, unit: &AffectedUnit) -> Result<WorkloadRef, RestartError> {
        resolve_owner(&self.api, unit).await
    }

    /// Restarts every distinct workload owning a pod that matches `selector`.
    ///
    /// Each workload is attempted at most once. The call fails only when pods
    /// matched but no workload could be restarted; partial restarts are
    /// reported as degraded.
    pub async fn restart_matching(&self, selector: &str) -> Result<RestartReport, RestartError> {
        info!(selector, "finding pods to restart");
        let units = self
            .api
            .list_units(selector)
            .await
            .map_err(|source| RestartError::ListUnits {
                selector: selector.to_string(),
                source,
            })?;

        let mut report = RestartReport {
            units: units.len(),
            ..RestartReport::default()
        };
        if units.is_empty() {
            warn!(selector, "no pods found matching selector");
            return Ok(report);
        }
        info!(count = units.len(), "found pods to restart");

        let mut attempted = BTreeSet::new();
        for unit in &units {
            let workload = match self.resolve_owner(unit).await {
                Ok(workload) => workload,
                Err(err) => {
                    warn!(pod = %unit.name, error = %err, "failed to resolve pod owner");
                    report.unresolved.push((unit.name.clone(), err.to_string()));
                    continue;
                }
            };

            if !attempted.insert(workload.key()) {
                debug!(workload = %workload, "workload already handled this cycle, skipping");
                continue;
            }

            info!(kind = %workload.kind, name = %workload.name, "restarting workload");
            match self.restart_workload(&workload).await {
                Ok(()) => {
                    info!(workload = %workload, "initiated workload restart");
                    report.restarted.push(workload);
                }
                Err(err) => {
                    error!(workload = %workload, error = %err, "failed to restart workload");
                    report.failed.push((workload, err.to_string()));
                }
            }
        }

        if report.restarted.is_empty() {
            return Err(RestartError::NothingRestarted { report });
        }
        if report.is_degraded() {
            warn!(
                restarted = report.restarted.len(),
                failed = report.failed.len(),
                unresolved = report.unresolved.len(),
                "restarted some workloads, others were left as-is"
            );
        } else {
            info!(restarted = report.restarted.len(), "restarted all workloads");
        }
        Ok(report)
    }

    pub async fn restart_workload(&self, workload: &WorkloadRef) -> Result<(), RestartError> {
        let Some(kind) = WorkloadKind::parse(&workload.kind) else {
            return Err(RestartError::UnsupportedKind {
                kind: workload.kind.clone(),
            });
        };

        if kind.supports_rolling_restart() {
            self.rolling_restart(kind, workload).await
        } else {
            self.scale_cycle(kind, workload).await
        }
    }

    // Bumping the template annotation hands the rollout to the workload's own
    // controller; completion is not awaited.
    async fn rolling_restart(
        &self,
        kind: WorkloadKind,
        workload: &WorkloadRef,
    ) -> Result<(), RestartError> {
        let mut object = self.get(kind, workload, "get").await?;
        object.template_annotations.insert(
            RESTARTED_AT_ANNOTATION.to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        self.update(&object, workload, "update").await?;
        debug!(workload = %workload, "added restart annotation");
        Ok(())
    }

    /// Bounces a replica set by scaling it to zero and back.
    ///
    /// Not atomic: the restore always writes the originally observed count. It
    /// carries the re-read resource version, so a concurrent change between the
    /// re-read and the restore surfaces as a conflict instead of being
    /// overwritten; changes made during the grace period are not detected.
    async fn scale_cycle(
        &self,
        kind: WorkloadKind,
        workload: &WorkloadRef,
    ) -> Result<(), RestartError> {
        let mut object = self.get(kind, workload, "get").await?;
        let original_replicas = object.replicas.unwrap_or(DEFAULT_REPLICAS);

        object.replicas = Some(0);
        self.update(&object, workload, "scale down").await?;
        debug!(workload = %workload, "scaled to 0");

        tokio::time::sleep(self.scale_grace).await;

        let mut object = self.get(kind, workload, "get after scale down").await?;
        object.replicas = Some(original_replicas);
        self.update(&object, workload, "scale up").await?;
        debug!(workload = %workload, replicas = original_replicas, "scaled back to original replicas");
        Ok(())
    }

    async fn get(
        &self,
        kind: WorkloadKind,
        workload: &WorkloadRef,
        action: &'static str,
    ) -> Result<WorkloadObject, RestartError> {
        self.api
            .get_workload(kind, &workload.name)
            .await
            .map_err(|source| RestartError::Cluster {
                action,
                workload: workload.clone(),
                source,
            })
    }

    async fn update(
        &self,
        object: &WorkloadObject,
        workload: &WorkloadRef,
        action: &'static str,
    ) -> Result<(), RestartError> {
        self.api
            .update_workload(object)
            .await
            .map_err(|source| RestartError::Cluster {
                action,
                workload: workload.clone(),
                source,
            })
    }
}
