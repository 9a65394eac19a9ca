use std::fs;
use std::io;

use depotsync_core::{manifest_build_id, AppId, BuildId};

use crate::{InstallLayout, UpdateError};

/// True when the game directory and its marker file both exist. Missing
/// pieces mean "not installed", never an error.
pub fn is_installed(layout: &InstallLayout) -> bool {
    layout.game_dir().is_dir() && layout.marker_path().is_file()
}

/// Reads the build id recorded in the local app manifest.
///
/// A missing manifest, or one whose build id is empty, yields `None`. A manifest
/// that exists but carries no build id at all is a [`UpdateError::MalformedManifest`].
pub fn read_installed_build_id(
    layout: &InstallLayout,
    app_id: &AppId,
) -> Result<Option<BuildId>, UpdateError> {
    let path = layout.manifest_path(app_id);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(UpdateError::ManifestRead { path, source }),
    };

    match manifest_build_id(&raw) {
        Some(build_id) if build_id.as_str().is_empty() => Ok(None),
        Some(build_id) => Ok(Some(build_id)),
        None => Err(UpdateError::MalformedManifest { path }),
    }
}
