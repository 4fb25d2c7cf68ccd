/// Child Process Runner
///
/// Spawns one tool executable with a subcommand and optional JSON argument,
/// capturing stdout, stderr, and a chronologically interleaved "combined"
/// stream. Never raises on child failure — a failed child is communicated
/// through a non-zero exit status in the returned [`CaptureResult`].
///
/// The tricky part is staying alive when a tool forks a background
/// descendant that keeps the output pipes open after the direct child has
/// exited: we poll for the direct child's exit, then grant the output
/// readers a brief drain window before force-closing them and treating
/// whatever they accumulated as final. This trades possible loss of
/// trailing descendant output for liveness (see SPEC_FULL.md §4.1).
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::core::error::McpError;

/// The raw output of one child execution.
#[derive(Debug, Clone, Default)]
pub struct CaptureResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub combined: Vec<u8>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run `exec_path subcommand [arg]`, returning the captured output.
///
/// `arg`, when present, is always passed as a single positional argument
/// (even if it is an empty string). The child inherits the server's
/// environment and working directory but no stdin.
pub async fn run(
    exec_path: &Path,
    subcommand: &str,
    arg: Option<&str>,
    drain_window: Duration,
) -> Result<CaptureResult, McpError> {
    let mut command = Command::new(exec_path);
    command.arg(subcommand);
    if let Some(a) = arg {
        command.arg(a);
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| McpError::ChildSpawn(format!("{}: {e}", exec_path.display())))?;

    let stdout = child
        .stdout
        .take()
        .expect("stdout was requested as piped");
    let stderr = child
        .stderr
        .take()
        .expect("stderr was requested as piped");

    let combined: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stdout_done = Arc::new(AtomicBool::new(false));
    let stdout_task = spawn_reader(stdout, stdout_buf.clone(), combined.clone(), stdout_done.clone());

    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_done = Arc::new(AtomicBool::new(false));
    let stderr_task = spawn_reader(stderr, stderr_buf.clone(), combined.clone(), stderr_done.clone());

    let status = wait_with_poll(&mut child).await?;

    // Give the readers a brief window to drain whatever the direct child
    // (or a descendant still holding the pipe) has already written.
    let deadline = tokio::time::Instant::now() + drain_window;
    while tokio::time::Instant::now() < deadline {
        if stdout_done.load(Ordering::Acquire) && stderr_done.load(Ordering::Acquire) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    stdout_task.abort();
    stderr_task.abort();

    let exit_code = exit_code_of(status);
    let stdout_bytes = stdout_buf.lock().unwrap().clone();
    let stderr_bytes = stderr_buf.lock().unwrap().clone();
    let combined_bytes = combined.lock().unwrap().clone();

    Ok(CaptureResult {
        exit_code,
        stdout: stdout_bytes,
        stderr: stderr_bytes,
        combined: combined_bytes,
    })
}

/// Poll `child` for exit without blocking indefinitely on pipe EOF.
///
/// `Child::wait()` itself does not require the pipes to close, but we poll
/// explicitly in short steps so the overall runner stays on one consistent
/// "poll in a short loop" policy, matching the readers below.
async fn wait_with_poll(child: &mut tokio::process::Child) -> Result<std::process::ExitStatus, McpError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn spawn_reader<R>(
    mut reader: R,
    own_buf: Arc<Mutex<Vec<u8>>>,
    combined: Arc<Mutex<Vec<u8>>>,
    done: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    own_buf.lock().unwrap().extend_from_slice(&chunk[..n]);
                    combined.lock().unwrap().extend_from_slice(&chunk[..n]);
                }
                Err(_) => break,
            }
        }
        done.store(true, Ordering::Release);
    })
}

/// The direct child's exit status as a small stable integer.
///
/// Normal exits use the process's real exit code. A child killed by a
/// signal is reported as `128 + signal`, matching shell convention, since
/// POSIX does not give processes a normal exit code in that case.
#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
