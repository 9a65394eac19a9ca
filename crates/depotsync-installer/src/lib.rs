mod engine;
mod error;
mod fs_utils;
mod layout;
mod state;
mod tool;
mod types;

pub use engine::UpdateEngine;
pub use error::UpdateError;
pub use layout::{InstallLayout, APP_INFO_SCRIPT_NAME, VALIDATE_SCRIPT_NAME};
pub use state::{is_installed, read_installed_build_id};
pub use tool::{InstallerTool, SteamCmd, ToolRun};
pub use types::{ApplyReport, UpdateCheck};

#[cfg(test)]
mod tests;
