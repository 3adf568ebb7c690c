use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Captured result of one finished subprocess.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Last non-empty stderr line. Tools put the actual error there.
    pub fn stderr_tail(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("no error output")
            .trim()
            .to_string()
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("failed while waiting for {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Capability to run an external program to completion under a wall-clock bound.
///
/// Implementations must make sure the program is no longer running once `run`
/// returns, whether it finished, timed out, or the returned future was dropped.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError>;
}

/// Runs real binaries through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let name = program.display().to_string();
        info!(program = %name, ?args, "Spawning external tool");

        // kill_on_drop only reaches the direct child. yt-dlp forks ffmpeg for
        // merges and HLS, so the tool leads its own process group and the
        // guard below takes the whole group down.
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            program: name.clone(),
            source,
        })?;
        let mut group = GroupKill::new(child.id());

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let waited = tokio::time::timeout(timeout, async {
            let (status, out, err) = tokio::join!(
                child.wait(),
                read_pipe(stdout.as_mut()),
                read_pipe(stderr.as_mut())
            );
            Ok::<_, io::Error>((status?, out?, err?))
        })
        .await;

        match waited {
            Ok(Ok((status, stdout, stderr))) => {
                debug!(program = %name, code = ?status.code(), "External tool exited");
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                })
            }
            Ok(Err(source)) => Err(RunError::Io {
                program: name,
                source,
            }),
            Err(_) => {
                warn!(program = %name, timeout_secs = timeout.as_secs(), "External tool timed out, killing");
                group.kill();
                // kill() also reaps, so the pid is gone from the process table afterwards.
                if let Err(e) = child.kill().await {
                    warn!(program = %name, "Failed to kill timed out process: {}", e);
                }
                Err(RunError::Timeout {
                    program: name,
                    timeout,
                })
            }
        }
    }
}

/// SIGKILLs the process group led by the spawned tool when dropped, so helpers
/// it forked die with it on completion, timeout, and cancellation alike.
struct GroupKill {
    pgid: Option<u32>,
}

impl GroupKill {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    #[cfg(unix)]
    fn kill(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Some(pgid) = self.pgid.take() else {
            return;
        };
        let Ok(raw) = i32::try_from(pgid) else {
            return;
        };
        match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!(pgid, "Failed to kill process group: {}", e),
        }
    }

    #[cfg(not(unix))]
    fn kill(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn read_pipe<R>(pipe: Option<&mut R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
