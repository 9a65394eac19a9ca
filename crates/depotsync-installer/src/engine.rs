use std::path::Path;

use depotsync_core::{
    has_corruption_signature, has_success_marker, public_branch_build_id, AppId, BuildId,
    InstallerScript,
};
use tracing::{debug, info, warn};

use crate::fs_utils::{remove_dir_if_exists, remove_file_if_exists, write_script};
use crate::{
    is_installed, read_installed_build_id, ApplyReport, InstallLayout, InstallerTool, ToolRun,
    UpdateCheck, UpdateError, APP_INFO_SCRIPT_NAME, VALIDATE_SCRIPT_NAME,
};

const STAGE_APP_INFO: &str = "app-info";
const STAGE_UPDATE: &str = "update";
const STAGE_UPDATE_RETRY: &str = "update-retry";
const STAGE_VALIDATE: &str = "validate";

/// Drives the installer tool against one installation.
///
/// Checking for updates only ever issues the metadata query; the download path
/// is reachable solely through [`UpdateEngine::apply_update`] and
/// [`UpdateEngine::validate_update`].
pub struct UpdateEngine<T> {
    layout: InstallLayout,
    app_id: AppId,
    update_script: String,
    tool: T,
}

impl<T: InstallerTool> UpdateEngine<T> {
    pub fn new(
        layout: InstallLayout,
        app_id: AppId,
        update_script: impl Into<String>,
        tool: T,
    ) -> Self {
        Self {
            layout,
            app_id,
            update_script: update_script.into(),
            tool,
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub async fn check_update(&self) -> Result<UpdateCheck, UpdateError> {
        debug!("checking for updates by comparing build ids");

        if !is_installed(&self.layout) {
            info!(game_dir = %self.layout.game_dir().display(), "game not installed, initial installation required");
            return Ok(UpdateCheck::InitialInstall);
        }

        let Some(installed) = read_installed_build_id(&self.layout, &self.app_id)? else {
            info!("no build id found in manifest, assuming update needed");
            return Ok(UpdateCheck::ManifestMissing);
        };
        debug!(%installed, "read installed build id");

        let latest = self.latest_build_id().await?;
        debug!(%latest, "read latest build id");

        if installed != latest {
            info!(%installed, %latest, "update available");
            return Ok(UpdateCheck::Outdated { installed, latest });
        }

        info!(build = %installed, "game is up to date");
        Ok(UpdateCheck::UpToDate { build: installed })
    }

    /// Queries the latest public build id without downloading anything.
    pub async fn latest_build_id(&self) -> Result<BuildId, UpdateError> {
        let script_path = self.layout.script_path(APP_INFO_SCRIPT_NAME);
        self.write_script(&script_path, &InstallerScript::app_info(&self.app_id))
            .await?;

        let run = self.run(&script_path, STAGE_APP_INFO).await;
        if let Err(err) = remove_file_if_exists(&script_path).await {
            debug!(script = %script_path.display(), error = %err, "failed to remove app info script");
        }
        let run = run?;

        if !run.success() {
            return Err(UpdateError::QueryFailed {
                status: run.status_label(),
                output: run.output,
            });
        }

        match public_branch_build_id(&run.output, &self.app_id) {
            Some(build_id) => Ok(build_id),
            None => Err(UpdateError::BuildIdNotFound { output: run.output }),
        }
    }

    pub async fn apply_update(&self) -> Result<ApplyReport, UpdateError> {
        let initial_install = !is_installed(&self.layout);
        if initial_install {
            info!("performing initial game installation via installer");
        } else {
            info!("applying update via installer");
        }

        let script_path = self.layout.script_path(&self.update_script);
        self.write_script(
            &script_path,
            &InstallerScript::app_update(self.layout.root(), &self.app_id, false),
        )
        .await?;

        let mut stage = STAGE_UPDATE;
        let mut run = self.run(&script_path, stage).await?;
        let mut recovered = false;

        if has_corruption_signature(&run.output) {
            warn!("detected 0x6 installer state, attempting recovery");
            self.clear_metadata_dir().await?;

            info!("retrying update after clearing installer metadata");
            stage = STAGE_UPDATE_RETRY;
            run = self.run(&script_path, stage).await?;
            if !run.success() {
                return Err(UpdateError::RecoveryRetryFailed {
                    status: run.status_label(),
                    output: run.output,
                });
            }
            recovered = true;
        } else if !run.success() {
            return Err(UpdateError::ApplyFailed {
                status: run.status_label(),
                output: run.output,
            });
        }

        if !has_success_marker(&run.output) {
            return Err(UpdateError::MissingSuccessMarker {
                stage,
                output: run.output,
            });
        }

        Ok(ApplyReport {
            initial_install,
            recovered,
            output: run.output,
        })
    }

    pub async fn validate_update(&self) -> Result<(), UpdateError> {
        info!("validating installation");

        let script_path = self.layout.script_path(VALIDATE_SCRIPT_NAME);
        self.write_script(
            &script_path,
            &InstallerScript::app_update(self.layout.root(), &self.app_id, true),
        )
        .await?;

        let run = self.run(&script_path, STAGE_VALIDATE).await?;
        if !run.success() {
            return Err(UpdateError::ValidationFailed {
                status: run.status_label(),
                output: run.output,
            });
        }
        if !has_success_marker(&run.output) {
            return Err(UpdateError::ValidationIssues { output: run.output });
        }
        Ok(())
    }

    async fn write_script(
        &self,
        path: &Path,
        script: &InstallerScript,
    ) -> Result<(), UpdateError> {
        write_script(path, script).await.map_err(|source| UpdateError::Script {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(script = %path.display(), "wrote installer script");
        Ok(())
    }

    async fn run(&self, script_path: &Path, stage: &'static str) -> Result<ToolRun, UpdateError> {
        self.tool
            .run_script(script_path, stage)
            .await
            .map_err(|source| UpdateError::Tool { stage, source })
    }

    // Only the metadata directory goes; the game files stay in place.
    async fn clear_metadata_dir(&self) -> Result<(), UpdateError> {
        let path = self.layout.metadata_dir();
        warn!(path = %path.display(), "clearing installer metadata directory");
        remove_dir_if_exists(&path).await.map_err(|source| UpdateError::Recovery {
            path: path.clone(),
            source,
        })?;
        info!("cleared installer metadata directory");
        Ok(())
    }
}
