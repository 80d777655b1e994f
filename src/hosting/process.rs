use crate::cancel::CancellationToken;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct BoundedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to start: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),
    #[error("interrupted")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs `cmd` to completion, killing it when `timeout` elapses or `cancel` fires.
pub fn run_bounded(
    mut cmd: Command,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<BoundedOutput, RunError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RunError::Spawn)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let started = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_cancelled() {
            terminate(&mut child);
            return Err(RunError::Cancelled);
        }
        if started.elapsed() >= timeout {
            terminate(&mut child);
            return Err(RunError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(BoundedOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Pipes are drained on their own threads so a chatty child never blocks on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2"]);
        let out = run_bounded(cmd, Duration::from_secs(10), &CancellationToken::new()).unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout, b"out\n");
        assert_eq!(out.stderr, b"err\n");
    }

    #[test]
    fn kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let err = run_bounded(cmd, Duration::from_millis(100), &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, RunError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn kills_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run_bounded(cmd, Duration::from_secs(10), &cancel).unwrap_err();
        assert!(matches!(err, RunError::Cancelled));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let cmd = Command::new("definitely-not-a-real-binary-dev-report");
        let err = run_bounded(cmd, Duration::from_secs(1), &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, RunError::Spawn(_)));
    }
}
