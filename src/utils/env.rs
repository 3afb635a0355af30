// src/utils/env.rs: Nextflow binary and home-directory resolution

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::defs::{
    BACTOPIA_ENV_PREFIX_ENV, NEXTFLOW_BIN_ENV, NEXTFLOW_TAG, NXF_DIR_NAME, NXF_HOME_ENV,
    RunnerError,
};

/// Resolved launch environment for orchestrator invocations: the nextflow
/// binary to call and the variables overlaid on each spawn.
#[derive(Debug, Clone)]
pub struct NextflowEnv {
    pub nextflow_bin: PathBuf,
    pub nxf_home: PathBuf,
    pub vars: HashMap<String, String>,
}

/// Returns the Nextflow binary to use.
///
/// Checked in order: the `NEXTFLOW_BIN` variable, a `bin/nextflow` under
/// `BACTOPIA_ENV_PREFIX`, then the `PATH`.
///
/// # Returns
/// Path to the binary, or `NextflowNotFound`.
pub fn resolve_nextflow_bin() -> Result<PathBuf, RunnerError> {
    if let Ok(v) = env::var(NEXTFLOW_BIN_ENV) {
        let v = v.trim();
        if !v.is_empty() {
            return Ok(PathBuf::from(v));
        }
    }

    if let Ok(prefix) = env::var(BACTOPIA_ENV_PREFIX_ENV) {
        let cand = PathBuf::from(prefix).join("bin").join(NEXTFLOW_TAG);
        if cand.is_file() {
            return Ok(cand);
        }
    }

    which::which(NEXTFLOW_TAG).map_err(|_| RunnerError::NextflowNotFound)
}

/// Ensures a writable NXF_HOME under `base`, creating it if needed.
/// Nextflow refuses to run without one it can write caches and history to.
pub fn ensure_nxf_home(base: &Path) -> Result<PathBuf, RunnerError> {
    if let Ok(existing) = env::var(NXF_HOME_ENV) {
        let existing = PathBuf::from(existing);
        fs::create_dir_all(&existing)?;
        return Ok(existing);
    }
    let nxf_home = base.join(NXF_DIR_NAME);
    fs::create_dir_all(&nxf_home)?;
    Ok(nxf_home)
}

/// Ensures `<base>/.nextflow` exists so Nextflow can write its
/// `history.lock` there instead of failing on first launch.
pub fn ensure_project_nxf_dir(base: &Path) -> Result<PathBuf, RunnerError> {
    let proj_nxf = base.join(NXF_DIR_NAME);
    fs::create_dir_all(&proj_nxf)?;
    Ok(proj_nxf)
}

/// Resolves the full launch environment for runs rooted at `base`.
///
/// # Arguments
/// * `base` - The launch directory the orchestrator will run from.
///
/// # Returns
/// A `NextflowEnv` whose `vars` are ready to overlay on a `CommandLine`.
pub fn bootstrap(base: &Path) -> Result<NextflowEnv, RunnerError> {
    let nextflow_bin = resolve_nextflow_bin()?;
    let nxf_home = ensure_nxf_home(base)?;
    ensure_project_nxf_dir(base)?;

    let mut vars = HashMap::new();
    vars.insert(
        NXF_HOME_ENV.to_string(),
        nxf_home.to_string_lossy().into_owned(),
    );

    debug!(
        "resolved nextflow at {:?} with NXF_HOME {:?}",
        nextflow_bin, nxf_home
    );

    Ok(NextflowEnv {
        nextflow_bin,
        nxf_home,
        vars,
    })
}
