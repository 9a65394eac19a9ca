use thiserror::Error;

use crate::{RestartReport, WorkloadRef};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },
    #[error("conflict updating {kind} {name}: {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },
    #[error("cluster request for {kind} {name} failed: {source}")]
    Request {
        kind: String,
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("pod {unit} has no owner references")]
    NoOwner { unit: String },
    #[error("unsupported workload kind: {kind}")]
    UnsupportedKind { kind: String },
    #[error("failed to {action} {workload}: {source}")]
    Cluster {
        action: &'static str,
        workload: WorkloadRef,
        #[source]
        source: ClusterError,
    },
    #[error("failed to list pods matching '{selector}': {source}")]
    ListUnits {
        selector: String,
        #[source]
        source: ClusterError,
    },
    #[error(
        "failed to restart any workloads ({} failed, {} unresolved)",
        .report.failed.len(),
        .report.unresolved.len()
    )]
    NothingRestarted { report: RestartReport },
}
