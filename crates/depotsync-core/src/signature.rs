pub const SUCCESS_MARKER: &str = "Success";

const PROGRESS_KEYWORDS: &[&str] = &[
    "update state",
    "progress",
    "downloading",
    "install",
    "validat",
    "success",
    "error",
    "app_update",
];

/// Matches the installer's damaged-metadata state (`0x6`), which is recovered
/// by removing the metadata directory and running the update again.
pub fn has_corruption_signature(output: &str) -> bool {
    output.contains("state is 0x6")
        || output.contains("state is 0x606")
        || (output.contains("Error! App") && output.contains("0x6"))
}

pub fn has_success_marker(output: &str) -> bool {
    output.contains(SUCCESS_MARKER)
}

pub fn is_progress_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    PROGRESS_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}
