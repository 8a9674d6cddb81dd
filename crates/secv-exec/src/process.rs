//! One-shot subprocess runner.
//!
//! Spawns a command in its own process group, feeds it a byte payload on
//! stdin, collects stdout and stderr, and enforces a wall-clock deadline.
//! On timeout or cancellation the whole group is sent `SIGKILL` and the
//! direct child is reaped before [`run_process`] returns.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::error::{ExecError, Result};

/// What to run and how.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory of the child.
    pub cwd: PathBuf,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Vec<u8>,
    pub timeout: Duration,
}

impl ProcessSpec {
    /// Build a spec from a whitespace-separated command line.
    ///
    /// A relative program path with more than one component (`./run.sh`,
    /// `bin/tool`) is anchored at `cwd`; a bare name is looked up on `PATH`.
    /// Returns `None` for a blank command.
    pub fn from_command_line(command: &str, cwd: &Path, timeout: Duration) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: resolve_program(program, cwd),
            args: parts.map(String::from).collect(),
            cwd: cwd.to_path_buf(),
            stdin: Vec::new(),
            timeout,
        })
    }

    /// Set the stdin payload.
    pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = stdin;
        self
    }
}

fn resolve_program(program: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        cwd.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Captured output of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// How a process run ended.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The process exited on its own and its pipes were drained.
    Exited(ProcessOutput),
    /// The deadline passed; the process group was killed.
    TimedOut,
    /// The cancellation token fired; the process group was killed.
    Cancelled,
}

enum Race {
    Done(std::io::Result<ProcessOutput>),
    TimedOut,
    Cancelled,
}

/// Run `spec` to completion, timeout or cancellation.
///
/// The deadline covers draining stdout and stderr as well as the exit, so a
/// background process that keeps a pipe open counts against the timeout.
pub async fn run_process(spec: ProcessSpec, cancel: &CancellationToken) -> Result<ProcessOutcome> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|e| ExecError::Spawn {
        program: spec.program.display().to_string(),
        source: e,
    })?;

    // Also the process group id. Captured now because `Child::id` returns
    // `None` once the child has been reaped, while its group may live on.
    let pgid = child.id();
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let payload = spec.stdin;

    let race = {
        let run = async {
            let write = async move {
                if let Some(mut stdin) = stdin {
                    if let Err(e) = stdin.write_all(&payload).await {
                        // Modules are free to ignore their input.
                        if e.kind() != std::io::ErrorKind::BrokenPipe {
                            tracing::debug!(error = %e, "failed to write process stdin");
                        }
                    }
                    let _ = stdin.shutdown().await;
                }
            };
            let (_, stdout, stderr, status) =
                tokio::join!(write, drain(stdout), drain(stderr), child.wait());
            Ok::<_, std::io::Error>(ProcessOutput {
                status: status?,
                stdout: stdout?,
                stderr: stderr?,
            })
        };

        tokio::select! {
            res = run => Race::Done(res),
            _ = tokio::time::sleep(spec.timeout) => Race::TimedOut,
            _ = cancel.cancelled() => Race::Cancelled,
        }
    };

    match race {
        Race::Done(output) => Ok(ProcessOutcome::Exited(output?)),
        Race::TimedOut => {
            terminate(&mut child, pgid).await;
            Ok(ProcessOutcome::TimedOut)
        }
        Race::Cancelled => {
            terminate(&mut child, pgid).await;
            Ok(ProcessOutcome::Cancelled)
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill the child's process group, then the child itself, and reap it.
///
/// The group is signalled even when the leader has already exited, since
/// background processes it started keep the group alive.
async fn terminate(child: &mut Child, pgid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pgid.and_then(|pid| i32::try_from(pid).ok()) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            tracing::debug!(pgid, error = %e, "failed to signal process group");
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "failed to kill child process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> ProcessSpec {
        ProcessSpec {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: std::env::temp_dir(),
            stdin: Vec::new(),
            timeout,
        }
    }

    #[test]
    fn test_command_line_splitting() {
        let spec = ProcessSpec::from_command_line(
            "  python3  scan.py --fast ",
            Path::new("/m"),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(spec.program, PathBuf::from("python3"));
        assert_eq!(spec.args, vec!["scan.py", "--fast"]);
        assert_eq!(spec.cwd, PathBuf::from("/m"));

        assert!(ProcessSpec::from_command_line("   ", Path::new("/m"), Duration::ZERO).is_none());
    }

    #[test]
    fn test_relative_program_anchored_at_cwd() {
        let cwd = Path::new("/m");

        let spec = ProcessSpec::from_command_line("./run.sh", cwd, Duration::ZERO).unwrap();
        assert_eq!(spec.program, cwd.join("./run.sh"));

        let spec = ProcessSpec::from_command_line("bin/tool x", cwd, Duration::ZERO).unwrap();
        assert_eq!(spec.program, PathBuf::from("/m/bin/tool"));

        let spec = ProcessSpec::from_command_line("/usr/bin/env", cwd, Duration::ZERO).unwrap();
        assert_eq!(spec.program, PathBuf::from("/usr/bin/env"));
    }

    #[tokio::test]
    async fn test_stdin_is_delivered_and_closed() {
        let spec = sh("cat", Duration::from_secs(10)).with_stdin(b"hello".to_vec());
        let outcome = run_process(spec, &CancellationToken::new()).await.unwrap();
        match outcome {
            ProcessOutcome::Exited(out) => {
                assert!(out.status.success());
                assert_eq!(out.stdout, b"hello");
            }
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stderr_and_exit_code_captured() {
        let spec = sh("echo oops >&2; exit 3", Duration::from_secs(10));
        match run_process(spec, &CancellationToken::new()).await.unwrap() {
            ProcessOutcome::Exited(out) => {
                assert_eq!(out.status.code(), Some(3));
                assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "oops");
            }
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_returns_promptly() {
        let spec = sh("sleep 30", Duration::from_millis(200));
        let start = std::time::Instant::now();
        let outcome = run_process(spec, &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_background_child_holding_pipe_is_killed() {
        // The shell exits immediately but leaves `sleep` holding stdout.
        let spec = sh("sleep 30 & echo started", Duration::from_millis(300));
        let start = std::time::Instant::now();
        let outcome = run_process(spec, &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let spec = sh("sleep 30", Duration::from_secs(60));
        let outcome = run_process(spec, &cancel).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let spec = ProcessSpec {
            program: PathBuf::from("/nonexistent/secv-module"),
            args: Vec::new(),
            cwd: std::env::temp_dir(),
            stdin: Vec::new(),
            timeout: Duration::from_secs(1),
        };
        let err = run_process(spec, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/secv-module"));
    }
}
