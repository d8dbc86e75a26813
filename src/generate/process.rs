use super::GenerationError;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where a supervised child is in its shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supervision {
    Running,
    TerminateRequested,
    KillRequested,
    Reaped,
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion within `timeout`.
///
/// On expiry the child is asked to terminate, then killed if it is still
/// alive after `grace`; each step waits at most `grace`. Both pipes are
/// drained while the child runs.
pub async fn run_supervised(
    mut command: Command,
    timeout: Duration,
    grace: Duration,
) -> Result<ProcessOutput, GenerationError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| GenerationError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let mut state = Supervision::Running;
    let mut status = None;
    let mut expired = false;
    while state != Supervision::Reaped {
        let wait = if state == Supervision::Running { timeout } else { grace };
        match tokio::time::timeout(wait, child.wait()).await {
            Ok(result) => {
                status = Some(result.map_err(|source| GenerationError::Io {
                    program: program.clone(),
                    source,
                })?);
                state = Supervision::Reaped;
            }
            Err(_) => {
                expired = true;
                state = escalate(&mut child, state);
                debug!(program = %program, state = ?state, "escalated");
            }
        }
    }

    let stdout = collect(stdout, grace).await;
    let stderr = collect(stderr, grace).await;

    match status {
        Some(status) if !expired => Ok(ProcessOutput {
            status,
            stdout,
            stderr,
        }),
        _ => Err(GenerationError::Timeout {
            program,
            after: timeout,
        }),
    }
}

/// Move one step along the shutdown sequence.
fn escalate(child: &mut Child, state: Supervision) -> Supervision {
    match state {
        Supervision::Running => {
            warn!(pid = ?child.id(), "timed out, requesting termination");
            terminate(child);
            Supervision::TerminateRequested
        }
        Supervision::TerminateRequested => {
            warn!(pid = ?child.id(), "still running, killing");
            if let Err(error) = child.start_kill() {
                debug!(error = %error, "kill failed");
            }
            Supervision::KillRequested
        }
        // Nothing left to send; give up on reaping.
        Supervision::KillRequested | Supervision::Reaped => Supervision::Reaped,
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    match i32::try_from(pid) {
        Ok(pid) => {
            if let Err(errno) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
                debug!(pid, errno = %errno, "SIGTERM failed");
            }
        }
        Err(_) => {
            let _ = child.start_kill();
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut pipe| {
        tokio::spawn(async move {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer).await;
            buffer
        })
    })
}

async fn collect(handle: Option<JoinHandle<Vec<u8>>>, grace: Duration) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            // A grandchild may still hold the pipe open.
            abort.abort();
            String::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn captures_both_streams() {
        let output = run_supervised(
            shell("echo out; echo err >&2"),
            Duration::from_secs(5),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn timeout_terminates_the_child() {
        let started = std::time::Instant::now();
        let err = run_supervised(
            shell("exec sleep 30"),
            Duration::from_millis(200),
            Duration::from_millis(500),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn ignored_sigterm_escalates_to_kill() {
        let err = run_supervised(
            shell("trap '' TERM; sleep 30 & wait"),
            Duration::from_millis(200),
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = run_supervised(
            Command::new("definitely-not-a-real-program"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenerationError::Spawn { .. }));
    }
}
