mod app;
mod app_info;
mod build_id;
mod manifest;
mod script;
mod signature;

pub use app::AppId;
pub use app_info::public_branch_build_id;
pub use build_id::BuildId;
pub use manifest::{manifest_build_id, manifest_file_name, METADATA_DIR_NAME};
pub use script::{InstallerScript, ScriptDirective};
pub use signature::{has_corruption_signature, has_success_marker, is_progress_line, SUCCESS_MARKER};
