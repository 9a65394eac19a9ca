use std::path::{Path, PathBuf};

use depotsync_core::{manifest_file_name, AppId, METADATA_DIR_NAME};

pub const APP_INFO_SCRIPT_NAME: &str = "app_info_check.txt";
pub const VALIDATE_SCRIPT_NAME: &str = "validate_script.txt";

/// Paths inside the shared installation volume.
///
/// `root` is the directory handed to `force_install_dir`; the game itself lives
/// in `root/<app_dir>` and installer metadata in `root/steamapps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    app_dir: String,
    marker_file: String,
}

impl InstallLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        app_dir: impl Into<String>,
        marker_file: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            app_dir: app_dir.into(),
            marker_file: marker_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn game_dir(&self) -> PathBuf {
        self.root.join(&self.app_dir)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.game_dir().join(&self.marker_file)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR_NAME)
    }

    pub fn manifest_path(&self, app_id: &AppId) -> PathBuf {
        self.metadata_dir().join(manifest_file_name(app_id))
    }

    pub fn script_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}
