#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

use bear_runner::{CleanOptions, CleanStrategy, RunnerError};
use bear_runner::runner::cleanup::{clean, list_runs};

const RUN_OK: &str = "boring_euler";
const RUN_BROKEN: &str = "agitated_pasteur";
const SESSION_OK: &str = "11111111-2222-3333-4444-555555555555";
const SESSION_BROKEN: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

/// Writes an executable stub standing in for the nextflow binary.
fn write_stub(dir: &Path, body: &str) -> Result<PathBuf> {
    let path = dir.join("nextflow");
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Builds a launch directory with a two-run history and one populated
/// cache directory per run.
fn seed_work_dir() -> Result<TempDir> {
    let work = TempDir::new()?;
    let nxf = work.path().join(".nextflow");
    let history = format!(
        "2024-05-01 10:00:00\t2m\t{RUN_OK}\tOK\tabc123\t{SESSION_OK}\tnextflow run demo\n\
         2024-05-02 11:00:00\t3m\t{RUN_BROKEN}\tERR\tdef456\t{SESSION_BROKEN}\tnextflow run demo\n"
    );
    fs::create_dir_all(nxf.join("cache").join(SESSION_OK))?;
    fs::create_dir_all(nxf.join("cache").join(SESSION_BROKEN))?;
    fs::write(nxf.join("cache").join(SESSION_OK).join("index"), b"ok")?;
    fs::write(nxf.join("cache").join(SESSION_BROKEN).join("index"), b"stale")?;
    fs::write(nxf.join("history"), history)?;
    Ok(work)
}

#[tokio::test]
async fn intact_metadata_cleans_natively() -> Result<()> {
    let work = seed_work_dir()?;
    let stub_dir = TempDir::new()?;
    let stub = write_stub(stub_dir.path(), "exit 0")?;

    let report = clean(RUN_OK, work.path(), &CleanOptions::new(stub)).await?;
    assert_eq!(report.strategy, CleanStrategy::Native);
    assert!(report.removed.is_empty());

    // Native cleanup delegates deletion to the orchestrator; our bookkeeping
    // stays untouched.
    assert!(work.path().join(".nextflow/cache").join(SESSION_OK).is_dir());
    assert!(work.path().join(".nextflow/cache").join(SESSION_BROKEN).is_dir());
    Ok(())
}

#[tokio::test]
async fn missing_cache_index_falls_back_to_scoped_removal() -> Result<()> {
    let work = seed_work_dir()?;
    let stub_dir = TempDir::new()?;
    let stub = write_stub(
        stub_dir.path(),
        "echo 'Missing cache index file' >&2; exit 1",
    )?;

    let report = clean(RUN_BROKEN, work.path(), &CleanOptions::new(stub)).await?;
    assert_eq!(report.strategy, CleanStrategy::Fallback);

    let broken_cache = work.path().join(".nextflow/cache").join(SESSION_BROKEN);
    assert_eq!(report.removed, vec![broken_cache.clone()]);
    assert!(!broken_cache.exists(), "the broken run's cache must be gone");

    // The sibling run is untouched and still listed in the history.
    assert!(work.path().join(".nextflow/cache").join(SESSION_OK).is_dir());
    let history = fs::read_to_string(work.path().join(".nextflow/history"))?;
    assert!(history.contains(RUN_OK));
    assert!(!history.contains(RUN_BROKEN));
    Ok(())
}

#[tokio::test]
async fn fallback_refuses_an_unknown_run() -> Result<()> {
    let work = seed_work_dir()?;
    let stub_dir = TempDir::new()?;
    let stub = write_stub(stub_dir.path(), "exit 1")?;

    let err = clean("no_such_run", work.path(), &CleanOptions::new(stub))
        .await
        .expect_err("a run absent from the history cannot be cleaned");
    assert!(matches!(err, RunnerError::CleanupFailed { .. }));

    // Nothing was removed.
    assert!(work.path().join(".nextflow/cache").join(SESSION_OK).is_dir());
    assert!(work.path().join(".nextflow/cache").join(SESSION_BROKEN).is_dir());
    Ok(())
}

#[tokio::test]
async fn fallback_only_matches_the_run_name_column() -> Result<()> {
    // A sibling run whose resume command mentions the target run must not
    // be swept up by the irreversible fallback delete.
    let work = TempDir::new()?;
    let nxf = work.path().join(".nextflow");
    let history = format!(
        "2024-05-01 10:00:00\t2m\t{RUN_OK}\tOK\tabc123\t{SESSION_OK}\tnextflow run demo -resume {RUN_BROKEN}\n\
         2024-05-02 11:00:00\t3m\t{RUN_BROKEN}\tERR\tdef456\t{SESSION_BROKEN}\tnextflow run demo\n"
    );
    fs::create_dir_all(nxf.join("cache").join(SESSION_OK))?;
    fs::create_dir_all(nxf.join("cache").join(SESSION_BROKEN))?;
    fs::write(nxf.join("history"), history)?;

    let stub_dir = TempDir::new()?;
    let stub = write_stub(stub_dir.path(), "exit 1")?;
    let report = clean(RUN_BROKEN, work.path(), &CleanOptions::new(stub)).await?;

    assert_eq!(report.strategy, CleanStrategy::Fallback);
    assert_eq!(
        report.removed,
        vec![work.path().join(".nextflow/cache").join(SESSION_BROKEN)]
    );
    assert!(work.path().join(".nextflow/cache").join(SESSION_OK).is_dir());
    let rewritten = fs::read_to_string(work.path().join(".nextflow/history"))?;
    assert!(rewritten.contains(RUN_OK), "the sibling's history line must survive");
    Ok(())
}

#[tokio::test]
async fn missing_orchestrator_still_reconciles_via_fallback() -> Result<()> {
    let work = seed_work_dir()?;
    // Points at a binary that does not exist at all.
    let opts = CleanOptions::new(work.path().join("no-such-nextflow"));

    let report = clean(RUN_BROKEN, work.path(), &opts).await?;
    assert_eq!(report.strategy, CleanStrategy::Fallback);
    assert!(!work.path().join(".nextflow/cache").join(SESSION_BROKEN).exists());
    Ok(())
}

#[tokio::test]
async fn list_runs_dedups_in_order() -> Result<()> {
    let work = TempDir::new()?;
    let stub_dir = TempDir::new()?;
    let stub = write_stub(
        stub_dir.path(),
        "printf 'boring_euler\\nagitated_pasteur\\nboring_euler\\n'",
    )?;

    let runs = list_runs(work.path(), &CleanOptions::new(stub)).await?;
    assert_eq!(
        runs,
        vec!["boring_euler".to_string(), "agitated_pasteur".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn list_runs_is_empty_when_log_fails() -> Result<()> {
    let work = TempDir::new()?;
    let stub_dir = TempDir::new()?;
    let stub = write_stub(stub_dir.path(), "echo 'no history' >&2; exit 1")?;

    let runs = list_runs(work.path(), &CleanOptions::new(stub)).await?;
    assert!(runs.is_empty());
    Ok(())
}
