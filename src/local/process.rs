use crate::error::DriverResult;
use chrono::Utc;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;

/// One spawned replica of a role.
pub struct ReplicaProc {
    pub role: String,
    pub replica_id: usize,
    pub child: Child,
    pub log_path: PathBuf,
    /// Cached once the child has been reaped, so repeated `describe`
    /// calls don't need to `try_wait` on an already-exited handle.
    pub exit_code: Option<i32>,
}

impl ReplicaProc {
    /// Non-blocking poll of the OS exit status. `Ok(Some(code))` once
    /// exited (negative for signal-terminated, matching the source
    /// driver's "non-zero or signal-terminated exit -> FAILED"), `Ok(None)`
    /// while still running.
    pub fn poll_exit(&mut self) -> DriverResult<Option<i32>> {
        if let Some(code) = self.exit_code {
            return Ok(Some(code));
        }
        match self.child.try_wait()? {
            Some(status) => {
                let code = status.code().unwrap_or(-1);
                self.exit_code = Some(code);
                Ok(Some(code))
            }
            None => Ok(None),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Best-effort cancellation: SIGTERM, then after `grace` with no
    /// exit, SIGKILL. Idempotent against an already-exited child.
    pub async fn cancel(&mut self, grace: std::time::Duration) {
        let Some(pid) = self.pid() else {
            return;
        };
        if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::warn!(?err, pid, role = %self.role, "failed to send SIGTERM");
        }

        tokio::select! {
            status = self.child.wait() => {
                if let Ok(status) = status {
                    self.exit_code = Some(status.code().unwrap_or(-1));
                }
            }
            _ = tokio::time::sleep(grace) => {
                tracing::warn!(pid, role = %self.role, "replica did not exit within grace period, sending SIGKILL");
                if let Err(err) = self.child.start_kill() {
                    tracing::warn!(?err, pid, role = %self.role, "failed to send SIGKILL");
                }
                if let Ok(status) = self.child.wait().await {
                    self.exit_code = Some(status.code().unwrap_or(-1));
                }
            }
        }
    }
}

/// Spawns one replica, redirecting stdout/stderr into a single
/// timestamped log file at `log_path` via background copy tasks (spec §5:
/// "the reader must tolerate concurrent appends").
pub fn spawn_replica(
    role: &str,
    replica_id: usize,
    entrypoint: &str,
    args: &[String],
    env: &HashMap<String, String>,
    workdir: &str,
    log_path: PathBuf,
) -> DriverResult<ReplicaProc> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut command = Command::new(entrypoint);
    command
        .args(args)
        .envs(env)
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let log_path_for_writer = log_path.clone();

    tokio::spawn(async move {
        let file = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path_for_writer)
            .await
        {
            Ok(f) => f,
            Err(err) => {
                tracing::error!(?err, path = %log_path_for_writer.display(), "failed to open replica log file");
                return;
            }
        };
        let file = Arc::new(AsyncMutex::new(file));

        let mut handles = Vec::new();
        if let Some(stdout) = stdout {
            handles.push(tokio::spawn(copy_lines(stdout, file.clone())));
        }
        if let Some(stderr) = stderr {
            handles.push(tokio::spawn(copy_lines(stderr, file.clone())));
        }
        for handle in handles {
            let _ = handle.await;
        }
    });

    Ok(ReplicaProc {
        role: role.to_string(),
        replica_id,
        child,
        log_path,
        exit_code: None,
    })
}

async fn copy_lines<R>(reader: R, file: Arc<AsyncMutex<tokio::fs::File>>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let entry = format!("{}\t{}\n", Utc::now().to_rfc3339(), line);
                let mut file = file.lock().await;
                if let Err(err) = file.write_all(entry.as_bytes()).await {
                    tracing::warn!(?err, "failed to append replica log line");
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(?err, "failed to read replica output");
                return;
            }
        }
    }
}
