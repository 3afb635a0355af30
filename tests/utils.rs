#![cfg(unix)]

use anyhow::Result;
use tempfile::TempDir;

use bear_runner::{CommandLine, LogBuffer, RunnerError};
use bear_runner::utils::text::{normalize_chunk, shell_quote, strip_ansi};

#[test]
fn cursor_reads_never_lose_or_duplicate() {
    let buffer = LogBuffer::new();
    buffer.push_line("a".into());
    buffer.push_line("b".into());

    let (first, cursor) = buffer.read_from(0);
    assert_eq!(first, vec!["a".to_string(), "b".to_string()]);

    buffer.push_line("c".into());
    let (second, cursor) = buffer.read_from(cursor);
    assert_eq!(second, vec!["c".to_string()]);

    // A stale cursor replays, a fresh one returns nothing.
    let (replay, _) = buffer.read_from(0);
    assert_eq!(replay.len(), 3);
    let (nothing, _) = buffer.read_from(cursor);
    assert!(nothing.is_empty());
}

#[test]
fn push_chunk_normalizes_before_appending() {
    let buffer = LogBuffer::new();
    buffer.push_chunk("\x1b[32mgreen\x1b[0m\rprogress 50%\n");
    let (lines, _) = buffer.read_from(0);
    assert_eq!(lines, vec!["green".to_string(), "progress 50%".to_string()]);
}

#[test]
fn strip_ansi_removes_escape_sequences() {
    assert_eq!(strip_ansi("\x1b[1;31mred\x1b[0m plain"), "red plain");
    assert_eq!(strip_ansi("no escapes"), "no escapes");
}

#[test]
fn normalize_chunk_splits_nextflow_glue() {
    // Progress redraws glue "executor >" and "- [" segments on one line.
    let lines = normalize_chunk("executor >  local (3) - [ab/12cd34] process > annotate");
    assert_eq!(
        lines,
        vec![
            "executor >  local (3)".to_string(),
            "[ab/12cd34] process > annotate".to_string(),
        ]
    );
    assert!(normalize_chunk("   \r\n  \n").is_empty());
}

#[test]
fn normalize_chunk_splits_after_completion_checkmarks() {
    let lines = normalize_chunk("[ab/12cd34] process > annotate ✔ [ef/56gh78] process > summarize");
    assert_eq!(
        lines,
        vec![
            "[ab/12cd34] process > annotate ✔".to_string(),
            "[ef/56gh78] process > summarize".to_string(),
        ]
    );
    // A checkmark ending the chunk stays put.
    assert_eq!(
        normalize_chunk("[ab/12cd34] process > annotate ✔\n"),
        vec!["[ab/12cd34] process > annotate ✔".to_string()]
    );
}

#[test]
fn shell_quote_only_wraps_when_needed() {
    assert_eq!(shell_quote("--outdir"), "--outdir");
    assert_eq!(shell_quote("a b"), "'a b'");
    assert_eq!(shell_quote("it's"), r"'it'\''s'");
}

#[test]
fn command_line_rejects_an_empty_program() {
    let err = CommandLine::builder("  ")
        .build()
        .expect_err("blank programs must be rejected");
    assert!(matches!(err, RunnerError::InvalidCommand(_)));
}

#[test]
fn command_line_rejects_a_missing_cwd() {
    let err = CommandLine::builder("echo")
        .cwd("/definitely/not/a/real/dir")
        .build()
        .expect_err("a nonexistent cwd must be rejected");
    assert!(matches!(err, RunnerError::InvalidCommand(_)));
}

#[test]
fn command_line_snapshots_argv_and_env() -> Result<()> {
    let dir = TempDir::new()?;
    let cmd = CommandLine::builder("nextflow")
        .arg("run")
        .args(["bactopia/bactopia", "--samples", "fofn.txt"])
        .cwd(dir.path())
        .env("NXF_HOME", "/tmp/nxf")
        .build()?;

    assert_eq!(cmd.program(), "nextflow");
    assert_eq!(cmd.args()[0], "run");
    assert_eq!(cmd.cwd(), dir.path());
    assert_eq!(cmd.env().get("NXF_HOME").map(String::as_str), Some("/tmp/nxf"));
    assert_eq!(
        cmd.to_string(),
        "nextflow run bactopia/bactopia --samples fofn.txt"
    );
    Ok(())
}
