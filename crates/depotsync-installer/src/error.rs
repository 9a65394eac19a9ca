use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to read app manifest {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("buildid not found in app manifest {}", path.display())]
    MalformedManifest { path: PathBuf },
    #[error("failed to write installer script {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to run installer for stage '{stage}': {source}")]
    Tool {
        stage: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to query app info ({status}), output: {output}")]
    QueryFailed { status: String, output: String },
    #[error("buildid not found in app_info output")]
    BuildIdNotFound { output: String },
    #[error("failed to clear installer metadata {} for 0x6 recovery: {source}", path.display())]
    Recovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("installer update failed after 0x6 recovery ({status}), output: {output}")]
    RecoveryRetryFailed { status: String, output: String },
    #[error("installer update failed ({status}), output: {output}")]
    ApplyFailed { status: String, output: String },
    #[error("installer stage '{stage}' may have failed, no success marker in output: {output}")]
    MissingSuccessMarker { stage: &'static str, output: String },
    #[error("validation failed ({status}), output: {output}")]
    ValidationFailed { status: String, output: String },
    #[error("validation reported issues: {output}")]
    ValidationIssues { output: String },
}

impl UpdateError {
    /// Captured installer output, when the failure came from a tool run.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::QueryFailed { output, .. }
            | Self::BuildIdNotFound { output }
            | Self::RecoveryRetryFailed { output, .. }
            | Self::ApplyFailed { output, .. }
            | Self::MissingSuccessMarker { output, .. }
            | Self::ValidationFailed { output, .. }
            | Self::ValidationIssues { output } => Some(output),
            _ => None,
        }
    }
}
