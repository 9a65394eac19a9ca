use depotsync_core::BuildId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateCheck {
    InitialInstall,
    ManifestMissing,
    UpToDate { build: BuildId },
    Outdated { installed: BuildId, latest: BuildId },
}

impl UpdateCheck {
    pub fn needs_update(&self) -> bool {
        !matches!(self, Self::UpToDate { .. })
    }

    pub fn summary(&self) -> String {
        match self {
            Self::InitialInstall => "not installed, initial installation required".to_string(),
            Self::ManifestMissing => "no build id in local manifest, update required".to_string(),
            Self::UpToDate { build } => format!("up to date (build={build})"),
            Self::Outdated { installed, latest } => {
                format!("update available (installed={installed}, latest={latest})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub initial_install: bool,
    pub recovered: bool,
    pub output: String,
}
