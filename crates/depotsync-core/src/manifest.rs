use crate::{AppId, BuildId};

/// Installer metadata directory under the install root. Holds the app manifests
/// and is the only directory removed by corruption recovery.
pub const METADATA_DIR_NAME: &str = "steamapps";

pub(crate) const BUILD_ID_KEY: &str = "\"buildid\"";

pub fn manifest_file_name(app_id: &AppId) -> String {
    format!("appmanifest_{app_id}.acf")
}

/// Returns the build id recorded in an app manifest, or `None` when no
/// `"buildid"` line carries a value.
pub fn manifest_build_id(raw: &str) -> Option<BuildId> {
    raw.lines()
        .filter(|line| line.contains(BUILD_ID_KEY))
        .find_map(BuildId::from_keyed_line)
}
