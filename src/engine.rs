use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::command::CommandSpec;
use crate::error::SubmitError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success {
        stdout: String,
        stderr: String,
    },
    Failure {
        code: i32,
        stdout: String,
        stderr: String,
    },
    Timeout {
        after_secs: u64,
    },
    Cancelled,
    ToolNotFound {
        program: String,
    },
    UnexpectedError {
        message: String,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// User-facing report for every non-success outcome.
    pub fn error_report(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure {
                code,
                stdout,
                stderr,
            } => Some(format!(
                "COMMAND FAILED (Exit Code: {code})\n\n--- STDERR ---\n{stderr}\n\n--- STDOUT ---\n{stdout}"
            )),
            Self::Timeout { after_secs } => Some(format!(
                "FATAL: Command timed out after {after_secs} seconds."
            )),
            Self::Cancelled => Some("FATAL: Command cancelled before it finished.".to_string()),
            Self::ToolNotFound { program } => Some(format!(
                "FATAL: '{program}' command not found. Is it in your system's PATH?"
            )),
            Self::UnexpectedError { message } => Some(format!(
                "FATAL: An unexpected error occurred: {message}"
            )),
        }
    }
}

/// Single background execution slot. At most one run is in flight; the
/// outcome comes back over a one-shot channel drained by `poll_outcome`.
pub struct ExecutionEngine {
    timeout: Duration,
    pending: Option<PendingRun>,
}

struct PendingRun {
    outcome: Receiver<ExecutionOutcome>,
    cancel: Arc<AtomicBool>,
}

impl ExecutionEngine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn execute(&mut self, command: &CommandSpec) -> Result<(), SubmitError> {
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let command = command.clone();
        let timeout = self.timeout;
        thread::spawn(move || {
            let outcome = run_command_cancellable(&command, timeout, &worker_cancel);
            let _ = tx.send(outcome);
        });
        self.pending = Some(PendingRun {
            outcome: rx,
            cancel,
        });
        Ok(())
    }

    pub fn poll_outcome(&mut self) -> Option<ExecutionOutcome> {
        let run = self.pending.as_ref()?;
        let outcome = match run.outcome.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => ExecutionOutcome::UnexpectedError {
                message: "execution worker exited without reporting a result".to_string(),
            },
        };
        self.pending = None;
        Some(outcome)
    }

    /// Cancels the in-flight run and waits up to `grace` for the worker to
    /// kill the tool's process group. Returns the run's outcome if it
    /// arrived in time.
    pub fn shutdown(&mut self, grace: Duration) -> Option<ExecutionOutcome> {
        let run = self.pending.take()?;
        run.cancel.store(true, Ordering::SeqCst);
        match run.outcome.recv_timeout(grace) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                tracing::warn!(%err, "execution worker did not stop within the grace period");
                None
            }
        }
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        self.shutdown(SHUTDOWN_GRACE);
    }
}

/// Runs the command to completion or until `timeout` elapses. Blocks the
/// calling thread.
pub fn run_command(command: &CommandSpec, timeout: Duration) -> ExecutionOutcome {
    run_command_cancellable(command, timeout, &AtomicBool::new(false))
}

/// Like `run_command`, but also stops the tool as soon as `cancel` is set.
/// The tool runs in its own process group so that timeouts and
/// cancellation take down every process it started.
pub fn run_command_cancellable(
    command: &CommandSpec,
    timeout: Duration,
    cancel: &AtomicBool,
) -> ExecutionOutcome {
    let program = command.program().to_string();
    let mut process = Command::new(&program);
    process
        .args(command.program_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        process.process_group(0);
    }

    tracing::info!(%program, timeout_secs = timeout.as_secs(), "starting tool");
    let mut child = match process.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(%program, "tool executable not found");
            return ExecutionOutcome::ToolNotFound { program };
        }
        Err(err) => {
            tracing::warn!(%program, %err, "tool failed to start");
            return ExecutionOutcome::UnexpectedError {
                message: err.to_string(),
            };
        }
    };

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    // Readers are detached on the early returns below: a process that
    // escaped the group may still hold the pipes open.
    let status = match wait_with_deadline(&mut child, Instant::now() + timeout, cancel) {
        Ok(WaitResult::Exited(status)) => status,
        Ok(WaitResult::TimedOut) => {
            tracing::warn!(%program, "tool timed out, process group terminated");
            return ExecutionOutcome::Timeout {
                after_secs: whole_seconds(timeout),
            };
        }
        Ok(WaitResult::Cancelled) => {
            tracing::info!(%program, "tool cancelled, process group terminated");
            return ExecutionOutcome::Cancelled;
        }
        Err(err) => {
            kill_process_group(&mut child);
            let _ = child.wait();
            return ExecutionOutcome::UnexpectedError {
                message: err.to_string(),
            };
        }
    };

    let stdout = join_reader(stdout_reader);
    let stderr = join_reader(stderr_reader);
    let stdout = stdout.trim().to_string();
    let stderr = stderr.trim().to_string();

    if status.success() {
        tracing::info!(%program, "tool finished");
        ExecutionOutcome::Success { stdout, stderr }
    } else {
        let code = status.code().unwrap_or(-1);
        tracing::info!(%program, code, "tool exited with failure");
        ExecutionOutcome::Failure {
            code,
            stdout,
            stderr,
        }
    }
}

enum WaitResult {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Polls the child until it exits, the deadline passes or `cancel` is set.
/// In the last two cases the whole process group is killed and the child
/// reaped before returning.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Instant,
    cancel: &AtomicBool,
) -> io::Result<WaitResult> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(WaitResult::Exited(status));
        }
        let now = Instant::now();
        let stop = if cancel.load(Ordering::SeqCst) {
            Some(WaitResult::Cancelled)
        } else if now >= deadline {
            Some(WaitResult::TimedOut)
        } else {
            None
        };
        if let Some(result) = stop {
            kill_process_group(child);
            child.wait()?;
            return Ok(result);
        }
        thread::sleep(WAIT_POLL_INTERVAL.min(deadline - now));
    }
}

/// Kills the child together with everything it spawned. Must run before the
/// child is reaped so its pid still names the group.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill(2) with a negative pid only signals the group the
            // child leads; it touches no memory of this process.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
}

/// Timeout in whole seconds for the report, rounding sub-second limits up.
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = reader.read_to_end(&mut bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

fn join_reader(reader: Option<thread::JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "../tests/unit/engine_tests.rs"]
mod tests;
