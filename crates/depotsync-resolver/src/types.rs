use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
}

impl WorkloadKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(Self::Deployment),
            "StatefulSet" => Some(Self::StatefulSet),
            "DaemonSet" => Some(Self::DaemonSet),
            "ReplicaSet" => Some(Self::ReplicaSet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::ReplicaSet => "ReplicaSet",
        }
    }

    /// Kinds whose controllers roll pods when the pod template changes.
    pub fn supports_rolling_restart(&self) -> bool {
        !matches!(self, Self::ReplicaSet)
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ownership reference as it appears on a pod or replica set. The kind is
/// kept verbatim so unsupported owners can be reported by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadRef {
    pub kind: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A pod selected for restart, with its owner references in API order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedUnit {
    pub name: String,
    pub owners: Vec<WorkloadRef>,
}

/// The fields of a workload object the restarter reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadObject {
    pub kind: WorkloadKind,
    pub name: String,
    pub owners: Vec<WorkloadRef>,
    pub template_annotations: BTreeMap<String, String>,
    pub replicas: Option<i32>,
    pub resource_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartReport {
    pub units: usize,
    pub restarted: Vec<WorkloadRef>,
    pub failed: Vec<(WorkloadRef, String)>,
    pub unresolved: Vec<(String, String)>,
}

impl RestartReport {
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty() || !self.unresolved.is_empty()
    }
}
