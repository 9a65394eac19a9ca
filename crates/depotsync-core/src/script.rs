use std::fmt;
use std::path::{Path, PathBuf};

use crate::AppId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptDirective {
    ShutdownOnFailedCommand,
    NoPromptForPassword,
    ForceInstallDir(PathBuf),
    LoginAnonymous,
    AppUpdate { app_id: AppId, validate: bool },
    AppInfoPrint(AppId),
    Quit,
}

impl fmt::Display for ScriptDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShutdownOnFailedCommand => f.write_str("@ShutdownOnFailedCommand 1"),
            Self::NoPromptForPassword => f.write_str("@NoPromptForPassword 1"),
            Self::ForceInstallDir(path) => write!(f, "force_install_dir {}", path.display()),
            Self::LoginAnonymous => f.write_str("login anonymous"),
            Self::AppUpdate { app_id, validate } => {
                if *validate {
                    write!(f, "app_update {app_id} validate")
                } else {
                    write!(f, "app_update {app_id}")
                }
            }
            Self::AppInfoPrint(app_id) => write!(f, "app_info_print {app_id}"),
            Self::Quit => f.write_str("quit"),
        }
    }
}

/// A `+runscript` file for the installer tool, one directive per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerScript {
    directives: Vec<ScriptDirective>,
}

impl InstallerScript {
    /// Metadata-only query. Never downloads or validates content.
    pub fn app_info(app_id: &AppId) -> Self {
        Self::with_body(vec![
            ScriptDirective::LoginAnonymous,
            ScriptDirective::AppInfoPrint(app_id.clone()),
        ])
    }

    pub fn app_update(install_dir: &Path, app_id: &AppId, validate: bool) -> Self {
        Self::with_body(vec![
            ScriptDirective::ForceInstallDir(install_dir.to_path_buf()),
            ScriptDirective::LoginAnonymous,
            ScriptDirective::AppUpdate {
                app_id: app_id.clone(),
                validate,
            },
        ])
    }

    fn with_body(body: Vec<ScriptDirective>) -> Self {
        let mut directives = vec![
            ScriptDirective::ShutdownOnFailedCommand,
            ScriptDirective::NoPromptForPassword,
        ];
        directives.extend(body);
        directives.push(ScriptDirective::Quit);
        Self { directives }
    }

    pub fn directives(&self) -> &[ScriptDirective] {
        &self.directives
    }

    pub fn downloads_content(&self) -> bool {
        self.directives
            .iter()
            .any(|directive| matches!(directive, ScriptDirective::AppUpdate { .. }))
    }

    pub fn render(&self) -> String {
        let mut payload = String::new();
        for directive in &self.directives {
            payload.push_str(&format!("{directive}\n"));
        }
        payload
    }
}
