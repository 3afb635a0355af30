// src/utils/text.rs: Log text normalization for orchestrator output

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ANSI_ESCAPE: Regex = Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").unwrap();
    // Nextflow writes progress with " - [" glue and inline "executor >"
    // status updates on one physical line; split them for the log viewer.
    static ref NF_BRACKET_GLUE: Regex = Regex::new(r"\s+-\s+\[").unwrap();
    static ref NF_EXECUTOR_GLUE: Regex = Regex::new(r"(?i)\s+(executor\s*>)").unwrap();
    // Completed-process lines end with "✔" glued to the next "[hash]" entry.
    static ref NF_CHECKMARK_GLUE: Regex = Regex::new(r"✔\s+(\[)").unwrap();
}

/// Removes ANSI escape sequences from a string.
pub fn strip_ansi(s: &str) -> String {
    ANSI_ESCAPE.replace_all(s, "").into_owned()
}

/// Cleans one raw output chunk into zero or more display lines.
///
/// Carriage returns are treated as line breaks (Nextflow redraws its
/// progress table with `\r`), ANSI codes are stripped, and the glued
/// Nextflow status patterns are split onto their own lines. Blank lines
/// are dropped.
///
/// # Arguments
/// * `chunk` - Raw text as read from the child's stdout/stderr.
///
/// # Returns
/// Cleaned lines, in emission order.
pub fn normalize_chunk(chunk: &str) -> Vec<String> {
    if chunk.is_empty() {
        return Vec::new();
    }
    let cleaned = strip_ansi(chunk).replace('\r', "\n");
    let cleaned = NF_BRACKET_GLUE.replace_all(&cleaned, "\n[");
    let cleaned = NF_EXECUTOR_GLUE.replace_all(&cleaned, "\n$1");
    let cleaned = NF_CHECKMARK_GLUE.replace_all(&cleaned, "✔\n$1");
    cleaned
        .split('\n')
        .map(|p| p.trim_end())
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.to_string())
        .collect()
}

/// Quotes a single argv token for display, the way a shell would want it.
/// Display only; the runner never re-parses commands from strings.
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
