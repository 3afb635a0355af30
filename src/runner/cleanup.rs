// src/runner/cleanup.rs: Reconciles "clean" requests with Nextflow's cache

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use tokio::process::Command;

use crate::config::defs::{
    NXF_CACHE_DIR_NAME, NXF_DIR_NAME, NXF_HISTORY_FILE_NAME, RunnerError,
};

lazy_static! {
    // Session ids in .nextflow/history are UUIDs.
    static ref SESSION_ID: Regex =
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .unwrap();
}

#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub nextflow_bin: PathBuf,
    /// Pass `-k` to `nextflow clean`, keeping task log files.
    pub keep_logs: bool,
}

impl CleanOptions {
    pub fn new(nextflow_bin: impl Into<PathBuf>) -> Self {
        CleanOptions {
            nextflow_bin: nextflow_bin.into(),
            keep_logs: false,
        }
    }
}

/// Which cleanup path succeeded, so the caller can tell the user whether
/// the orchestrator did the work or we had to reconcile by hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CleanStrategy {
    Native,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct CleanReport {
    pub run_name: String,
    pub strategy: CleanStrategy,
    /// Paths this crate removed directly. Empty for the native strategy,
    /// where the orchestrator does its own deletion.
    pub removed: Vec<PathBuf>,
}

/// Lists run names known to Nextflow under `work_dir`, oldest first,
/// deduplicated in order. An empty list when Nextflow has no history.
pub async fn list_runs(work_dir: &Path, opts: &CleanOptions) -> Result<Vec<String>, RunnerError> {
    let output = Command::new(&opts.nextflow_bin)
        .args(["log", "-q"])
        .current_dir(work_dir)
        .output()
        .await?;
    if !output.status.success() {
        debug!(
            "nextflow log failed in {:?}: {}",
            work_dir,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Ok(Vec::new());
    }

    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        let name = line.trim();
        if !name.is_empty() && seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Cleans one run, preferring the orchestrator's own `nextflow clean`.
///
/// When that fails (the usual cause is a missing or corrupt cache index
/// after an ungraceful interruption), falls back to removing the
/// paths unambiguously scoped to the run: its session cache directory
/// under `.nextflow/cache/` and its `.nextflow/history` entry. Sibling
/// runs are never touched.
///
/// # Arguments
/// * `run_name` - The Nextflow run name (e.g. "agitated_pasteur").
/// * `work_dir` - The launch directory the run executed from.
/// * `opts` - Binary location and flags.
///
/// # Returns
/// A report naming the strategy used and anything removed directly.
pub async fn clean(
    run_name: &str,
    work_dir: &Path,
    opts: &CleanOptions,
) -> Result<CleanReport, RunnerError> {
    match native_clean(run_name, work_dir, opts).await {
        Ok(()) => {
            info!("cleaned run '{}' via nextflow clean", run_name);
            Ok(CleanReport {
                run_name: run_name.to_string(),
                strategy: CleanStrategy::Native,
                removed: Vec::new(),
            })
        }
        Err(reason) => {
            warn!(
                "nextflow clean failed for '{}' ({}); using fallback cleanup",
                run_name, reason
            );
            let removed = fallback_clean(run_name, work_dir)?;
            info!(
                "fallback cleanup removed {} path(s) for run '{}'",
                removed.len(),
                run_name
            );
            Ok(CleanReport {
                run_name: run_name.to_string(),
                strategy: CleanStrategy::Fallback,
                removed,
            })
        }
    }
}

/// Runs `nextflow clean -f [-k] <run_name>`; Err carries the failure text.
async fn native_clean(run_name: &str, work_dir: &Path, opts: &CleanOptions) -> Result<(), String> {
    let mut cmd = Command::new(&opts.nextflow_bin);
    cmd.arg("clean").arg("-f");
    if opts.keep_logs {
        cmd.arg("-k");
    }
    cmd.arg(run_name).current_dir(work_dir);

    let output = cmd
        .output()
        .await
        .map_err(|e| format!("failed to invoke nextflow: {e}"))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let msg = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(if msg.is_empty() {
        format!("exit code {:?}", output.status.code())
    } else {
        msg
    })
}

/// Direct removal of the run's cache metadata. Only paths namespaced by
/// the run's own session id are deleted; this is irreversible, so anything
/// that cannot be scoped to the run is an error, not a broader delete.
fn fallback_clean(run_name: &str, work_dir: &Path) -> Result<Vec<PathBuf>, RunnerError> {
    let nxf_dir = work_dir.join(NXF_DIR_NAME);
    let history_path = nxf_dir.join(NXF_HISTORY_FILE_NAME);
    let history = fs::read_to_string(&history_path).map_err(|e| RunnerError::CleanupFailed {
        run: run_name.to_string(),
        reason: format!("cannot read {}: {e}", history_path.display()),
    })?;

    // History columns: timestamp, duration, run name, status, revision,
    // session id, command. Only the run-name column identifies the line;
    // a run name echoed in another run's command must not match.
    let mut kept = Vec::new();
    let mut session_ids = Vec::new();
    for line in history.lines() {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.get(2) == Some(&run_name) {
            for field in &fields {
                if SESSION_ID.is_match(field) {
                    session_ids.push(field.to_string());
                }
            }
        } else {
            kept.push(line);
        }
    }

    if session_ids.is_empty() {
        return Err(RunnerError::CleanupFailed {
            run: run_name.to_string(),
            reason: "run not found in .nextflow/history".to_string(),
        });
    }

    let mut removed = Vec::new();
    let cache_root = nxf_dir.join(NXF_CACHE_DIR_NAME);
    for session_id in &session_ids {
        let cache_dir = cache_root.join(session_id);
        if cache_dir.is_dir() {
            fs::remove_dir_all(&cache_dir)?;
            debug!("removed cache dir {}", cache_dir.display());
            removed.push(cache_dir);
        }
    }

    let mut rewritten = kept.join("\n");
    if !rewritten.is_empty() {
        rewritten.push('\n');
    }
    fs::write(&history_path, rewritten)?;

    Ok(removed)
}
