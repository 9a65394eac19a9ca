use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use depotsync_core::{AppId, BuildId};

use super::*;

const APP_INFO_1001: &str = "\"232250\"\n{\n\t\"branches\"\n\t{\n\t\t\"public\"\n\t\t{\n\t\t\t\"buildid\"\t\t\"1001\"\n\t\t}\n\t}\n}\n";
const APP_INFO_2002: &str = "\"232250\"\n{\n\t\"branches\"\n\t{\n\t\t\"public\"\n\t\t{\n\t\t\t\"buildid\"\t\t\"2002\"\n\t\t}\n\t}\n}\n";
const UPDATE_SUCCESS: &str = "Update state (0x61) downloading, progress: 99.00\nSuccess! App '232250' fully installed.\n";
const UPDATE_STATE_0X6: &str = "Update state (0x5) verifying install\nError! App '232250' state is 0x6 after update job.\n";

#[derive(Debug, Clone)]
struct RecordedRun {
    stage: &'static str,
    script: String,
    metadata_dir_present: bool,
}

struct FakeTool {
    metadata_dir: PathBuf,
    responses: Mutex<VecDeque<io::Result<ToolRun>>>,
    runs: Mutex<Vec<RecordedRun>>,
}

impl FakeTool {
    fn new(layout: &InstallLayout, responses: Vec<io::Result<ToolRun>>) -> Self {
        Self {
            metadata_dir: layout.metadata_dir(),
            responses: Mutex::new(responses.into()),
            runs: Mutex::new(Vec::new()),
        }
    }

    fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().expect("runs lock").clone()
    }
}

#[async_trait]
impl InstallerTool for FakeTool {
    async fn run_script(&self, script_path: &Path, stage: &'static str) -> io::Result<ToolRun> {
        let script = fs::read_to_string(script_path)?;
        self.runs.lock().expect("runs lock").push(RecordedRun {
            stage,
            script,
            metadata_dir_present: self.metadata_dir.exists(),
        });
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::other("unexpected installer run")))
    }
}

fn ok_run(output: &str) -> io::Result<ToolRun> {
    Ok(ToolRun {
        exit_code: Some(0),
        output: output.to_string(),
    })
}

fn failed_run(code: i32, output: &str) -> io::Result<ToolRun> {
    Ok(ToolRun {
        exit_code: Some(code),
        output: output.to_string(),
    })
}

static TEST_LAYOUT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn build_test_layout_path(nanos: u128) -> PathBuf {
    let mut path = std::env::temp_dir();
    let sequence = TEST_LAYOUT_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!(
        "depotsync-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    path
}

fn test_layout() -> InstallLayout {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    InstallLayout::new(build_test_layout_path(nanos), "tf", "srcds_run")
}

fn app_id() -> AppId {
    AppId::parse("232250").expect("must parse app id")
}

fn install_game(layout: &InstallLayout) {
    fs::create_dir_all(layout.game_dir()).expect("must create game dir");
    fs::write(layout.marker_path(), b"#!/bin/sh\n").expect("must write marker");
}

fn write_manifest(layout: &InstallLayout, raw: &str) {
    fs::create_dir_all(layout.metadata_dir()).expect("must create metadata dir");
    fs::write(layout.manifest_path(&app_id()), raw.as_bytes()).expect("must write manifest");
}

fn manifest_with_build(build: &str) -> String {
    format!("\"AppState\"\n{{\n\t\"appid\"\t\t\"232250\"\n\t\"buildid\"\t\t\"{build}\"\n}}\n")
}

fn engine(layout: &InstallLayout, tool: FakeTool) -> UpdateEngine<FakeTool> {
    UpdateEngine::new(layout.clone(), app_id(), "tf_update.txt", tool)
}

fn cleanup(layout: &InstallLayout) {
    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn build_test_layout_path_disambiguates_same_timestamp_calls() {
    assert_ne!(build_test_layout_path(42), build_test_layout_path(42));
}

#[test]
fn layout_paths_follow_installer_conventions() {
    let layout = InstallLayout::new("/tf", "tf", "srcds_run");
    assert_eq!(layout.game_dir(), PathBuf::from("/tf/tf"));
    assert_eq!(layout.marker_path(), PathBuf::from("/tf/tf/srcds_run"));
    assert_eq!(layout.metadata_dir(), PathBuf::from("/tf/steamapps"));
    assert_eq!(
        layout.manifest_path(&app_id()),
        PathBuf::from("/tf/steamapps/appmanifest_232250.acf")
    );
    assert_eq!(
        layout.script_path("tf_update.txt"),
        PathBuf::from("/tf/tf_update.txt")
    );
}

#[test]
fn is_installed_requires_directory_and_marker() {
    let layout = test_layout();
    assert!(!is_installed(&layout));

    fs::create_dir_all(layout.game_dir()).expect("must create game dir");
    assert!(!is_installed(&layout));

    fs::write(layout.marker_path(), b"").expect("must write marker");
    assert!(is_installed(&layout));

    cleanup(&layout);
}

#[test]
fn missing_manifest_reads_as_no_build_id() {
    let layout = test_layout();
    install_game(&layout);
    let build = read_installed_build_id(&layout, &app_id()).expect("must not fail");
    assert_eq!(build, None);
    cleanup(&layout);
}

#[test]
fn manifest_build_id_is_read_exactly() {
    let layout = test_layout();
    write_manifest(&layout, &manifest_with_build("20300156"));
    let build = read_installed_build_id(&layout, &app_id()).expect("must read");
    assert_eq!(build, Some(BuildId::new("20300156")));
    cleanup(&layout);
}

#[test]
fn empty_manifest_build_id_reads_as_no_build_id() {
    let layout = test_layout();
    write_manifest(&layout, &manifest_with_build(""));
    let build = read_installed_build_id(&layout, &app_id()).expect("must read");
    assert_eq!(build, None);
    cleanup(&layout);
}

#[test]
fn manifest_without_build_id_is_malformed() {
    let layout = test_layout();
    write_manifest(&layout, "\"AppState\"\n{\n\t\"appid\"\t\t\"232250\"\n}\n");
    let err = read_installed_build_id(&layout, &app_id()).expect_err("must be malformed");
    assert!(matches!(err, UpdateError::MalformedManifest { .. }));
    cleanup(&layout);
}

#[tokio::test]
async fn check_reports_initial_install_without_reading_manifest() {
    let layout = test_layout();
    // A malformed manifest would fail the check if it were read.
    write_manifest(&layout, "garbage");
    let engine = engine(&layout, FakeTool::new(&layout, Vec::new()));

    let check = engine.check_update().await.expect("must check");
    assert_eq!(check, UpdateCheck::InitialInstall);
    assert!(check.needs_update());
    assert!(engine.tool().runs().is_empty());
    cleanup(&layout);
}

#[tokio::test]
async fn check_treats_missing_manifest_as_update_needed() {
    let layout = test_layout();
    install_game(&layout);
    let engine = engine(&layout, FakeTool::new(&layout, Vec::new()));

    let check = engine.check_update().await.expect("must check");
    assert_eq!(check, UpdateCheck::ManifestMissing);
    assert!(engine.tool().runs().is_empty());
    cleanup(&layout);
}

#[tokio::test]
async fn check_surfaces_malformed_manifest() {
    let layout = test_layout();
    install_game(&layout);
    write_manifest(&layout, "\"AppState\"\n{\n}\n");
    let engine = engine(&layout, FakeTool::new(&layout, Vec::new()));

    let err = engine.check_update().await.expect_err("must fail");
    assert!(matches!(err, UpdateError::MalformedManifest { .. }));
    cleanup(&layout);
}

#[tokio::test]
async fn check_matching_build_ids_is_up_to_date() {
    let layout = test_layout();
    install_game(&layout);
    write_manifest(&layout, &manifest_with_build("1001"));
    let engine = engine(&layout, FakeTool::new(&layout, vec![ok_run(APP_INFO_1001)]));

    let check = engine.check_update().await.expect("must check");
    assert_eq!(
        check,
        UpdateCheck::UpToDate {
            build: BuildId::new("1001")
        }
    );
    assert!(!check.needs_update());
    assert!(
        !layout.script_path(APP_INFO_SCRIPT_NAME).exists(),
        "app info script must be removed after the query"
    );
    cleanup(&layout);
}

#[tokio::test]
async fn check_differing_build_ids_needs_update() {
    let layout = test_layout();
    install_game(&layout);
    write_manifest(&layout, &manifest_with_build("1001"));
    let engine = engine(&layout, FakeTool::new(&layout, vec![ok_run(APP_INFO_2002)]));

    let check = engine.check_update().await.expect("must check");
    assert_eq!(
        check,
        UpdateCheck::Outdated {
            installed: BuildId::new("1001"),
            latest: BuildId::new("2002"),
        }
    );
    assert!(check.needs_update());
    cleanup(&layout);
}

#[tokio::test]
async fn check_never_issues_download_directive() {
    let layout = test_layout();
    install_game(&layout);
    write_manifest(&layout, &manifest_with_build("1001"));
    let engine = engine(
        &layout,
        FakeTool::new(&layout, vec![ok_run(APP_INFO_2002), ok_run(APP_INFO_1001)]),
    );

    engine.check_update().await.expect("must check");
    engine.check_update().await.expect("must check");

    let runs = engine.tool().runs();
    assert_eq!(runs.len(), 2);
    for run in runs {
        assert_eq!(run.stage, "app-info");
        assert!(run.script.contains("app_info_print 232250"));
        assert!(!run.script.contains("app_update"), "script: {}", run.script);
        assert!(!run.script.contains("validate"));
    }
    cleanup(&layout);
}

#[tokio::test]
async fn check_propagates_missing_remote_build_id() {
    let layout = test_layout();
    install_game(&layout);
    write_manifest(&layout, &manifest_with_build("1001"));
    let engine = engine(
        &layout,
        FakeTool::new(&layout, vec![ok_run("Connecting anonymously to Steam Public...OK\n")]),
    );

    let err = engine.check_update().await.expect_err("must fail");
    assert!(matches!(err, UpdateError::BuildIdNotFound { .. }));
    assert_eq!(err.to_string(), "buildid not found in app_info output");
    cleanup(&layout);
}

#[tokio::test]
async fn check_propagates_query_failure() {
    let layout = test_layout();
    install_game(&layout);
    write_manifest(&layout, &manifest_with_build("1001"));
    let engine = engine(
        &layout,
        FakeTool::new(&layout, vec![failed_run(8, "FAILED (No Connection)\n")]),
    );

    let err = engine.check_update().await.expect_err("must fail");
    match err {
        UpdateError::QueryFailed { status, output } => {
            assert_eq!(status, "exit code 8");
            assert!(output.contains("No Connection"));
        }
        other => panic!("unexpected error: {other}"),
    }
    cleanup(&layout);
}

#[tokio::test]
async fn apply_runs_update_script_into_install_root() {
    let layout = test_layout();
    let engine = engine(&layout, FakeTool::new(&layout, vec![ok_run(UPDATE_SUCCESS)]));

    let report = engine.apply_update().await.expect("must apply");
    assert!(report.initial_install);
    assert!(!report.recovered);

    let runs = engine.tool().runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].stage, "update");
    assert!(runs[0]
        .script
        .contains(&format!("force_install_dir {}\n", layout.root().display())));
    assert!(runs[0].script.contains("app_update 232250\n"));
    assert!(layout.script_path("tf_update.txt").exists());
    cleanup(&layout);
}

#[tokio::test]
async fn apply_recovers_from_state_0x6_exactly_once() {
    let layout = test_layout();
    install_game(&layout);
    write_manifest(&layout, &manifest_with_build("1001"));
    let engine = engine(
        &layout,
        FakeTool::new(
            &layout,
            vec![failed_run(8, UPDATE_STATE_0X6), ok_run(UPDATE_SUCCESS)],
        ),
    );

    let report = engine.apply_update().await.expect("must recover");
    assert!(report.recovered);
    assert!(!report.initial_install);

    let runs = engine.tool().runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].stage, "update");
    assert!(runs[0].metadata_dir_present);
    assert_eq!(runs[1].stage, "update-retry");
    assert!(!runs[1].metadata_dir_present, "metadata must be cleared before retry");
    assert_eq!(runs[0].script, runs[1].script);
    assert!(
        layout.marker_path().exists(),
        "recovery must not touch the game files"
    );
    cleanup(&layout);
}

#[tokio::test]
async fn apply_recovery_tolerates_missing_metadata_dir() {
    let layout = test_layout();
    let engine = engine(
        &layout,
        FakeTool::new(
            &layout,
            vec![failed_run(8, UPDATE_STATE_0X6), ok_run(UPDATE_SUCCESS)],
        ),
    );

    let report = engine.apply_update().await.expect("must recover");
    assert!(report.recovered);
    assert!(report.initial_install);
    assert!(!layout.metadata_dir().exists());
    assert!(layout.script_path("tf_update.txt").exists());
    cleanup(&layout);
}

#[tokio::test]
async fn apply_does_not_recover_twice() {
    let layout = test_layout();
    install_game(&layout);
    write_manifest(&layout, &manifest_with_build("1001"));
    let engine = engine(
        &layout,
        FakeTool::new(
            &layout,
            vec![
                failed_run(8, UPDATE_STATE_0X6),
                failed_run(8, UPDATE_STATE_0X6),
                ok_run(UPDATE_SUCCESS),
            ],
        ),
    );

    let err = engine.apply_update().await.expect_err("must fail");
    assert!(matches!(err, UpdateError::RecoveryRetryFailed { .. }));
    assert!(err.output().is_some_and(|output| output.contains("state is 0x6")));
    assert_eq!(engine.tool().runs().len(), 2);
    cleanup(&layout);
}

#[tokio::test]
async fn apply_recovery_retry_without_success_marker_fails() {
    let layout = test_layout();
    let engine = engine(
        &layout,
        FakeTool::new(
            &layout,
            vec![ok_run(UPDATE_STATE_0X6), ok_run("Update state (0x5) verifying\n")],
        ),
    );

    let err = engine.apply_update().await.expect_err("must fail");
    assert!(matches!(
        err,
        UpdateError::MissingSuccessMarker {
            stage: "update-retry",
            ..
        }
    ));
    assert_eq!(engine.tool().runs().len(), 2);
    cleanup(&layout);
}

#[tokio::test]
async fn apply_nonzero_exit_is_terminal_with_output() {
    let layout = test_layout();
    let engine = engine(
        &layout,
        FakeTool::new(&layout, vec![failed_run(5, "ERROR! Disk write failure\n")]),
    );

    let err = engine.apply_update().await.expect_err("must fail");
    match &err {
        UpdateError::ApplyFailed { status, output } => {
            assert_eq!(status, "exit code 5");
            assert!(output.contains("Disk write failure"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.tool().runs().len(), 1);
    cleanup(&layout);
}

#[tokio::test]
async fn apply_zero_exit_without_success_marker_fails() {
    let layout = test_layout();
    let engine = engine(
        &layout,
        FakeTool::new(&layout, vec![ok_run("Update state (0x61) downloading\n")]),
    );

    let err = engine.apply_update().await.expect_err("must fail");
    assert!(matches!(
        err,
        UpdateError::MissingSuccessMarker { stage: "update", .. }
    ));
    cleanup(&layout);
}

#[tokio::test]
async fn apply_surfaces_tool_launch_failure() {
    let layout = test_layout();
    let engine = engine(
        &layout,
        FakeTool::new(&layout, vec![Err(io::Error::new(io::ErrorKind::NotFound, "no steamcmd"))]),
    );

    let err = engine.apply_update().await.expect_err("must fail");
    assert!(matches!(err, UpdateError::Tool { stage: "update", .. }));
    cleanup(&layout);
}

#[tokio::test]
async fn validate_requires_success_marker() {
    let layout = test_layout();
    let engine = engine(
        &layout,
        FakeTool::new(
            &layout,
            vec![
                ok_run("Success! App '232250' fully validated.\n"),
                ok_run("Validation finished\n"),
                failed_run(2, "Success? no\n"),
            ],
        ),
    );

    engine.validate_update().await.expect("first validation must pass");

    let issues = engine.validate_update().await.expect_err("must report issues");
    assert!(matches!(issues, UpdateError::ValidationIssues { .. }));
    assert!(issues.to_string().starts_with("validation reported issues"));

    let failed = engine.validate_update().await.expect_err("must fail");
    assert!(matches!(failed, UpdateError::ValidationFailed { .. }));

    let runs = engine.tool().runs();
    assert!(runs.iter().all(|run| run.stage == "validate"));
    assert!(runs[0].script.contains("app_update 232250 validate\n"));
    assert!(layout.script_path(VALIDATE_SCRIPT_NAME).exists());
    cleanup(&layout);
}

// Single test so no other test forks while a fake executable is being written.
#[cfg(unix)]
#[tokio::test]
async fn steamcmd_collects_both_streams_and_is_killed_on_drop() {
    use std::os::unix::fs::PermissionsExt;

    let layout = test_layout();
    let tool = SteamCmd::new(layout.root());
    let script = layout.script_path("tf_update.txt");

    let err = tool
        .run_script(&script, "update")
        .await
        .expect_err("must fail to spawn a missing executable");
    assert_eq!(err.kind(), io::ErrorKind::NotFound);

    fs::create_dir_all(layout.root()).expect("must create root");
    let executable = layout.root().join("steamcmd.sh");
    fs::write(
        &executable,
        "#!/bin/sh\necho \"script=$2\"\necho 'Update state (0x61) downloading' >&2\necho \"Success! App '232250' fully installed.\"\nexit 3\n",
    )
    .expect("must write fake steamcmd");
    fs::set_permissions(&executable, fs::Permissions::from_mode(0o755))
        .expect("must mark executable");
    assert_eq!(tool.executable(), executable.as_path());

    let run = tool
        .run_script(&script, "update")
        .await
        .expect("must run fake steamcmd");

    assert_eq!(run.exit_code, Some(3));
    assert!(!run.success());
    assert!(run.output.contains(&format!("script={}\n", script.display())));
    assert!(run.output.contains("Update state (0x61) downloading\n"));
    assert!(run.output.contains("Success! App '232250' fully installed.\n"));

    let late_marker = layout.root().join("late");
    let slow_executable = layout.root().join("slow_steamcmd.sh");
    fs::write(
        &slow_executable,
        format!("#!/bin/sh\nsleep 1\necho done > '{}'\n", late_marker.display()),
    )
    .expect("must write slow fake steamcmd");
    fs::set_permissions(&slow_executable, fs::Permissions::from_mode(0o755))
        .expect("must mark executable");
    let slow_tool = SteamCmd::with_executable(&slow_executable);

    let timed_out = tokio::time::timeout(
        Duration::from_millis(200),
        slow_tool.run_script(&script, "update"),
    )
    .await;
    assert!(timed_out.is_err(), "slow installer must still be running");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(
        !late_marker.exists(),
        "dropping the run must kill the installer process"
    );
    cleanup(&layout);
}
