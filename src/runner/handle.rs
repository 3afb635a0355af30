// src/runner/handle.rs: One spawned orchestrator process and its stream pumps

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::config::defs::RunnerError;
use crate::runner::buffer::LogBuffer;
use crate::utils::command::CommandLine;

/// A live (or recently finished) child process.
///
/// The `tokio::process::Child` itself is owned by a detached waiter task;
/// the handle keeps only the pieces the runner needs between render passes:
/// the pid for signalling, the exit slot, and the cancellation flag. The
/// waiter task pumps stdout and stderr line-by-line into the shared
/// `LogBuffer`, reaps the child, and records the exit code exactly once.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    argv: Vec<String>,
    exit: Arc<OnceLock<i32>>,
    reader_error: Arc<Mutex<Option<String>>>,
    cancel_requested: AtomicBool,
}

impl ProcessHandle {
    /// Spawns `cmd` in its own process group with both output streams piped
    /// into `buffer`.
    ///
    /// # Arguments
    /// * `cmd` - The validated command line to execute.
    /// * `buffer` - Destination for the child's combined output.
    ///
    /// # Returns
    /// The handle, or `Spawn` when the executable or cwd is unusable.
    pub fn spawn(cmd: &CommandLine, buffer: Arc<LogBuffer>) -> Result<ProcessHandle, RunnerError> {
        let mut command = Command::new(cmd.program());
        command
            .args(cmd.args())
            .current_dir(cmd.cwd())
            .envs(cmd.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // The orchestrator forks its own workers; a fresh process group lets
        // stop/kill reach all of them, not just the leaf.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| RunnerError::Spawn {
            program: cmd.program().to_string(),
            source: e,
        })?;
        let pid = child.id().ok_or_else(|| RunnerError::Spawn {
            program: cmd.program().to_string(),
            source: std::io::Error::other("child exited before a pid was assigned"),
        })?;
        debug!("spawned pid {}: {}", pid, cmd);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let exit = Arc::new(OnceLock::new());
        let reader_error = Arc::new(Mutex::new(None));

        let exit_slot = exit.clone();
        let error_slot = reader_error.clone();
        let out_buffer = buffer.clone();
        tokio::spawn(async move {
            let out_pump = async {
                match stdout {
                    Some(s) => pump_stream(s, &out_buffer).await,
                    None => Ok(()),
                }
            };
            let err_pump = async {
                match stderr {
                    Some(s) => pump_stream(s, &buffer).await,
                    None => Ok(()),
                }
            };
            let (out_res, err_res) = tokio::join!(out_pump, err_pump);
            for res in [out_res, err_res] {
                if let Err(e) = res {
                    let mut slot = error_slot.lock().unwrap();
                    slot.get_or_insert_with(|| format!("failed to read process output: {e}"));
                }
            }

            match child.wait().await {
                Ok(status) => {
                    let code = exit_code_of(status);
                    debug!("pid {} exited with code {}", pid, code);
                    let _ = exit_slot.set(code);
                }
                Err(e) => {
                    let mut slot = error_slot.lock().unwrap();
                    slot.get_or_insert_with(|| format!("failed to reap process: {e}"));
                    let _ = exit_slot.set(-1);
                }
            }
        });

        let mut argv = vec![cmd.program().to_string()];
        argv.extend(cmd.args().iter().cloned());
        Ok(ProcessHandle {
            pid,
            argv,
            exit,
            reader_error,
            cancel_requested: AtomicBool::new(false),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Non-blocking exit check; `None` while the process is still running.
    pub fn poll(&self) -> Option<i32> {
        self.exit.get().copied()
    }

    pub fn reader_error(&self) -> Option<String> {
        self.reader_error.lock().unwrap().clone()
    }

    /// Sends a graceful interrupt to the process group. Idempotent; the
    /// second and later calls are no-ops. Termination is asynchronous and
    /// observed later through `poll`.
    pub fn signal_stop(&self) -> Result<(), RunnerError> {
        if self.cancel_requested.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.poll().is_some() {
            return Ok(());
        }
        debug!("interrupting process group {}", self.pid);
        signal_group(self.pid, GroupSignal::Interrupt)
    }

    /// Force-kills the process group immediately.
    pub fn force_kill(&self) -> Result<(), RunnerError> {
        if self.poll().is_some() {
            return Ok(());
        }
        signal_group(self.pid, GroupSignal::Kill)
    }

    /// Spawns the escalation task: once `grace` has elapsed without the
    /// process exiting, the whole group is force-killed via `force_kill`.
    /// The exit code the OS reports for the kill still flows through the
    /// exit slot, so the runner reaches a terminal state either way.
    pub fn escalate_after(handle: &Arc<ProcessHandle>, grace: Duration) {
        let handle = Arc::clone(handle);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if handle.poll().is_none() {
                warn!(
                    "process group {} ignored the stop signal for {:?}; force-killing",
                    handle.pid, grace
                );
                if let Err(e) = handle.force_kill() {
                    warn!("force-kill of process group {} failed: {e}", handle.pid);
                }
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Interrupt,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, sig: GroupSignal) -> Result<(), RunnerError> {
    let signo = match sig {
        GroupSignal::Interrupt => libc::SIGINT,
        GroupSignal::Kill => libc::SIGKILL,
    };
    let rc = unsafe { libc::killpg(pid as i32, signo) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the group is already gone, which is what we wanted.
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!("killpg({pid}, {signo}) failed: {err}");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _sig: GroupSignal) -> Result<(), RunnerError> {
    Err(RunnerError::Unsupported)
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Reads one piped stream to EOF, appending each (possibly partial) line to
/// the buffer. Invalid UTF-8 is replaced rather than treated as an error.
async fn pump_stream<R: AsyncRead + Unpin>(
    stream: R,
    buffer: &LogBuffer,
) -> Result<(), std::io::Error> {
    let mut reader = BufReader::new(stream);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        let n = reader.read_until(b'\n', &mut raw).await?;
        if n == 0 {
            break;
        }
        buffer.push_chunk(&String::from_utf8_lossy(&raw));
    }
    Ok(())
}
