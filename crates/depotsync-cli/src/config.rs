use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use depotsync_core::AppId;
use depotsync_installer::InstallLayout;

use crate::coordinator::RetryPolicy;

/// Controller settings. Every flag falls back to an environment variable so the
/// controller can be configured entirely from a pod spec.
#[derive(Args, Debug, Clone)]
pub struct ControllerConfig {
    /// How often to poll for a newer published build.
    #[arg(long, env = "CHECK_INTERVAL", default_value = "30m", value_parser = humantime::parse_duration)]
    pub check_interval: Duration,

    /// Directory containing steamcmd.sh.
    #[arg(long, env = "STEAMCMD_PATH", default_value = "/home/steam/steamcmd")]
    pub steamcmd_path: PathBuf,

    /// Short name of the app; also the game directory under the install root.
    #[arg(long, env = "STEAMAPP", default_value = "tf")]
    pub steam_app: String,

    #[arg(long, env = "STEAMAPPID", default_value = "232250")]
    pub steam_app_id: String,

    /// Install root handed to the installer as force_install_dir.
    #[arg(long, env = "GAME_MOUNT_PATH", default_value = "/tf")]
    pub game_mount_path: PathBuf,

    /// File name of the update script written into the install root.
    #[arg(long, env = "UPDATE_SCRIPT", default_value = "tf_update.txt")]
    pub update_script: String,

    /// File inside the game directory whose presence marks a completed install.
    #[arg(long, env = "MARKER_FILE", default_value = "srcds_run")]
    pub marker_file: String,

    #[arg(long, env = "POD_SELECTOR", default_value = "app=tf2-server")]
    pub pod_selector: String,

    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    #[arg(long, env = "RETRY_DELAY", default_value = "5m", value_parser = humantime::parse_duration)]
    pub retry_delay: Duration,

    /// Pause between scaling a replica set down and restoring it.
    #[arg(long, env = "SCALE_GRACE", default_value = "2s", value_parser = humantime::parse_duration)]
    pub scale_grace: Duration,

    #[arg(long, env = "NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Kubeconfig to use instead of the in-cluster configuration.
    #[arg(long, env = "KUBECONFIG_PATH")]
    pub kubeconfig: Option<PathBuf>,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        self.app_id()?;
        if self.steam_app.trim().is_empty() {
            bail!("steam app name must not be empty");
        }
        if self.marker_file.trim().is_empty() {
            bail!("marker file name must not be empty");
        }
        if self.pod_selector.trim().is_empty() {
            bail!("pod selector must not be empty");
        }
        if self.namespace.trim().is_empty() {
            bail!("namespace must not be empty");
        }
        if self.max_retries == 0 {
            bail!("max retries must be at least 1");
        }
        if self.check_interval.is_zero() {
            bail!("check interval must be greater than zero");
        }
        if !is_plain_file_name(&self.update_script) {
            bail!(
                "update script must be a plain file name: {}",
                self.update_script
            );
        }
        Ok(())
    }

    pub fn app_id(&self) -> Result<AppId> {
        AppId::parse(&self.steam_app_id)
            .with_context(|| format!("invalid steam app id: {}", self.steam_app_id))
    }

    pub fn layout(&self) -> InstallLayout {
        InstallLayout::new(&self.game_mount_path, &self.steam_app, &self.marker_file)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
        }
    }
}

fn is_plain_file_name(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
