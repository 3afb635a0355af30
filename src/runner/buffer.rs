// src/runner/buffer.rs: Append-only log buffer shared with the stream pumps

use std::sync::Mutex;

use crate::utils::text::normalize_chunk;

/// Ordered, append-only sequence of output lines for one run.
///
/// Written by the background stream pumps, read by `Runner::drain` through
/// a monotonic cursor. Cursor reads never remove lines, so a later reader
/// (or a restarted render pass) can re-read from any earlier offset without
/// losing or duplicating output.
#[derive(Debug, Default)]
pub struct LogBuffer {
    lines: Mutex<Vec<String>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        LogBuffer {
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Normalizes one raw chunk and appends the resulting lines.
    pub fn push_chunk(&self, chunk: &str) {
        let parts = normalize_chunk(chunk);
        if parts.is_empty() {
            return;
        }
        let mut lines = self.lines.lock().unwrap();
        lines.extend(parts);
    }

    /// Appends a single pre-formatted line, bypassing normalization.
    pub fn push_line(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all lines at or past `cursor` together with the next cursor.
    ///
    /// # Arguments
    /// * `cursor` - Offset of the first line not yet delivered.
    ///
    /// # Returns
    /// The new lines and the cursor to pass on the next call.
    pub fn read_from(&self, cursor: usize) -> (Vec<String>, usize) {
        let lines = self.lines.lock().unwrap();
        if cursor >= lines.len() {
            return (Vec::new(), lines.len());
        }
        (lines[cursor..].to_vec(), lines.len())
    }

    /// Full scrollback, independent of any cursor.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}
