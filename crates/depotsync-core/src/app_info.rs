use crate::manifest::BUILD_ID_KEY;
use crate::{AppId, BuildId};

const PUBLIC_BRANCH_KEY: &str = "\"public\"";
const FALLBACK_SCAN_LINES: usize = 50;

/// Extracts the latest public build id from `app_info_print` output.
///
/// The `"public"` branch section is authoritative. When it cannot be located,
/// the lines following the app id key are scanned for a build id outside the
/// `branches` block instead.
pub fn public_branch_build_id(output: &str, app_id: &AppId) -> Option<BuildId> {
    let lines = output.lines().collect::<Vec<_>>();
    build_id_in_public_branch(&lines).or_else(|| build_id_after_app_key(&lines, app_id))
}

fn build_id_in_public_branch(lines: &[&str]) -> Option<BuildId> {
    let mut in_public_branch = false;
    for line in lines {
        if line.contains(PUBLIC_BRANCH_KEY) {
            in_public_branch = true;
            continue;
        }
        if !in_public_branch {
            continue;
        }

        let is_build_id_line = line.contains(BUILD_ID_KEY);
        if line.contains('}') && !is_build_id_line {
            in_public_branch = false;
            continue;
        }
        if is_build_id_line {
            if let Some(build_id) = BuildId::from_keyed_line(line) {
                return Some(build_id);
            }
        }
    }
    None
}

fn build_id_after_app_key(lines: &[&str], app_id: &AppId) -> Option<BuildId> {
    let app_key = app_id.quoted();
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(&app_key))
        .find_map(|(start, _)| {
            lines
                .iter()
                .skip(start)
                .take(FALLBACK_SCAN_LINES)
                .filter(|line| line.contains(BUILD_ID_KEY) && !line.contains("branches"))
                .filter_map(|line| BuildId::from_keyed_line(line))
                .find(|build_id| !build_id.is_placeholder())
        })
}
