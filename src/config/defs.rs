// src/config/defs.rs: Shared constants, stop policy, and the error taxonomy

use std::time::Duration;
use thiserror::Error;

// External software
pub const NEXTFLOW_TAG: &str = "nextflow";

// Environment variables consulted when resolving the orchestrator
pub const NEXTFLOW_BIN_ENV: &str = "NEXTFLOW_BIN";
pub const BACTOPIA_ENV_PREFIX_ENV: &str = "BACTOPIA_ENV_PREFIX";
pub const NXF_HOME_ENV: &str = "NXF_HOME";

// Nextflow's on-disk bookkeeping inside a launch directory
pub const NXF_DIR_NAME: &str = ".nextflow";
pub const NXF_CACHE_DIR_NAME: &str = "cache";
pub const NXF_HISTORY_FILE_NAME: &str = "history";

// Seconds between the graceful stop signal and the forced kill
pub const DEFAULT_STOP_GRACE_SECS: u64 = 15;

/// Escalation policy applied by `Runner::stop`: the process group first
/// receives an interrupt, then is force-killed if it is still alive once
/// `grace` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopPolicy {
    pub grace: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        StopPolicy {
            grace: Duration::from_secs(DEFAULT_STOP_GRACE_SECS),
        }
    }
}

impl StopPolicy {
    pub fn with_grace(grace: Duration) -> Self {
        StopPolicy { grace }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("a run is already active in namespace '{0}'")]
    AlreadyRunning(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("nextflow not found (neither in PATH nor in {})", BACTOPIA_ENV_PREFIX_ENV)]
    NextflowNotFound,

    #[error("cleanup failed for run '{run}': {reason}")]
    CleanupFailed { run: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("process signalling is not supported on this platform")]
    Unsupported,
}
