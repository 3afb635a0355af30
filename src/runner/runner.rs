// src/runner/runner.rs: Lifecycle of one namespaced background run

use std::sync::{Arc, Mutex};

use log::info;

use crate::config::defs::{RunnerError, StopPolicy};
use crate::runner::buffer::LogBuffer;
use crate::runner::handle::ProcessHandle;
use crate::utils::command::CommandLine;

/// Lifecycle state of a namespaced run.
///
/// `Stopping` is best-effort: the process may ignore the interrupt, in
/// which case the escalation task force-kills it and the state still ends
/// at `Finished` with whatever exit code the OS reports.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerState {
    Idle,
    Running,
    Stopping,
    Finished(i32),
    Failed(String),
}

impl RunnerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunnerState::Finished(_) | RunnerState::Failed(_))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RunnerState::Running | RunnerState::Stopping)
    }
}

/// What one `drain` call observed: the lines appended since the previous
/// drain and the lifecycle state after folding in any newly seen exit.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainOutput {
    pub lines: Vec<String>,
    pub state: RunnerState,
}

impl DrainOutput {
    pub fn running(&self) -> bool {
        self.state.is_active()
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.state {
            RunnerState::Finished(code) => Some(code),
            _ => None,
        }
    }
}

struct RunnerInner {
    state: RunnerState,
    handle: Option<Arc<ProcessHandle>>,
    buffer: Arc<LogBuffer>,
    cursor: usize,
}

/// Owns the process handle and log buffer for one namespace.
///
/// Every operation is non-blocking: `start` returns once the process is
/// spawned, `drain` only reads already-buffered lines, and `stop` returns
/// right after signalling. The state check inside `start` happens under
/// the same lock as the transition it guards, so two racing starts cannot
/// both spawn.
pub struct Runner {
    namespace: String,
    inner: Mutex<RunnerInner>,
}

impl Runner {
    pub fn new(namespace: impl Into<String>) -> Self {
        Runner {
            namespace: namespace.into(),
            inner: Mutex::new(RunnerInner {
                state: RunnerState::Idle,
                handle: None,
                buffer: Arc::new(LogBuffer::new()),
                cursor: 0,
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Spawns a new run, resetting the buffer.
    ///
    /// # Arguments
    /// * `cmd` - The validated command line to execute.
    ///
    /// # Returns
    /// `AlreadyRunning` when a run is active in this namespace; `Spawn`
    /// when the process cannot be started (the runner then keeps its
    /// previous state).
    pub fn start(&self, cmd: &CommandLine) -> Result<(), RunnerError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.is_active() {
            return Err(RunnerError::AlreadyRunning(self.namespace.clone()));
        }

        let buffer = Arc::new(LogBuffer::new());
        let handle = ProcessHandle::spawn(cmd, buffer.clone())?;
        info!(
            "[{}] started pid {}: {}",
            self.namespace,
            handle.pid(),
            cmd
        );

        inner.buffer = buffer;
        inner.cursor = 0;
        inner.handle = Some(Arc::new(handle));
        inner.state = RunnerState::Running;
        Ok(())
    }

    /// Returns the lines appended since the previous drain, plus the
    /// current state. A newly observed exit is folded into the state here,
    /// at drain time; there is no push notification.
    pub fn drain(&self) -> DrainOutput {
        let mut inner = self.inner.lock().unwrap();
        // Poll the exit slot before reading the buffer. The waiter task
        // sets the slot only after both pumps hit EOF, so an exit observed
        // here guarantees the read below already holds every line; polling
        // afterwards could pair a terminal state with a truncated batch.
        let transition = inner.handle.as_ref().and_then(|handle| {
            handle.poll().map(|code| match handle.reader_error() {
                Some(msg) => RunnerState::Failed(msg),
                None => RunnerState::Finished(code),
            })
        });

        let (lines, cursor) = inner.buffer.read_from(inner.cursor);
        inner.cursor = cursor;

        if let Some(next) = transition {
            info!("[{}] run reached {:?}", self.namespace, next);
            inner.state = next;
            // The child is already reaped by the waiter task; the handle
            // has nothing left to offer.
            inner.handle = None;
        }

        DrainOutput {
            lines,
            state: inner.state.clone(),
        }
    }

    /// Current state without consuming buffered lines.
    pub fn state(&self) -> RunnerState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Full scrollback of the current (or last) run.
    pub fn scrollback(&self) -> Vec<String> {
        self.inner.lock().unwrap().buffer.snapshot()
    }

    /// Requests cooperative cancellation: interrupt now, force-kill after
    /// the policy's grace period. Returns immediately; the terminal state
    /// is observed later through `drain`. A no-op unless Running.
    ///
    /// # Returns
    /// The signalling error when the interrupt could not be delivered; the
    /// state then stays `Running` rather than pretending a stop is under
    /// way.
    pub fn stop(&self, policy: StopPolicy) -> Result<(), RunnerError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != RunnerState::Running {
            return Ok(());
        }
        if let Some(handle) = &inner.handle {
            info!(
                "[{}] stop requested for pid {} ({}), grace {:?}",
                self.namespace,
                handle.pid(),
                handle.argv().join(" "),
                policy.grace
            );
            handle.signal_stop()?;
            ProcessHandle::escalate_after(handle, policy.grace);
            inner.state = RunnerState::Stopping;
        }
        Ok(())
    }

    /// Clears a terminal runner back to Idle, discarding the buffer.
    pub fn reset(&self) -> Result<(), RunnerError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.is_active() {
            return Err(RunnerError::AlreadyRunning(self.namespace.clone()));
        }
        inner.state = RunnerState::Idle;
        inner.handle = None;
        inner.buffer = Arc::new(LogBuffer::new());
        inner.cursor = 0;
        Ok(())
    }
}
