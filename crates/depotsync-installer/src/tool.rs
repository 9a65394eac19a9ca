use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use depotsync_core::is_progress_line;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of one installer invocation: exit status plus stdout and stderr
/// merged line by line. Interleaving between the two streams is unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl ToolRun {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn status_label(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

#[async_trait]
pub trait InstallerTool: Send + Sync {
    async fn run_script(&self, script_path: &Path, stage: &'static str) -> io::Result<ToolRun>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamCmd {
    executable: PathBuf,
}

impl SteamCmd {
    pub fn new(steamcmd_dir: impl AsRef<Path>) -> Self {
        Self::with_executable(steamcmd_dir.as_ref().join("steamcmd.sh"))
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

#[async_trait]
impl InstallerTool for SteamCmd {
    async fn run_script(&self, script_path: &Path, stage: &'static str) -> io::Result<ToolRun> {
        debug!(stage, executable = %self.executable.display(), script = %script_path.display(), "launching installer");
        let mut child = Command::new(&self.executable)
            .arg("+runscript")
            .arg(script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("installer stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("installer stderr was not captured"))?;

        let combined = Arc::new(Mutex::new(String::new()));
        let stdout_task = tokio::spawn(drain_stream(
            stdout,
            stage,
            "stdout",
            Arc::clone(&combined),
        ));
        let stderr_task = tokio::spawn(drain_stream(
            stderr,
            stage,
            "stderr",
            Arc::clone(&combined),
        ));

        let status = child.wait().await?;
        // Both streams must be fully drained before the buffer is read.
        stdout_task.await.map_err(io::Error::other)?;
        stderr_task.await.map_err(io::Error::other)?;

        let output = std::mem::take(&mut *combined.lock().await);
        Ok(ToolRun {
            exit_code: status.code(),
            output,
        })
    }
}

async fn drain_stream<R>(
    reader: R,
    stage: &'static str,
    stream: &'static str,
    combined: Arc<Mutex<String>>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(stage, stream, error = %err, "error while reading installer output");
                break;
            }
        }

        let raw = String::from_utf8_lossy(&buf);
        let line = raw.trim_end_matches(['\r', '\n']);
        {
            let mut combined = combined.lock().await;
            combined.push_str(line);
            combined.push('\n');
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_progress_line(trimmed) {
            info!(stage, stream, "{trimmed}");
        } else {
            debug!(stage, stream, "{trimmed}");
        }
    }
}
