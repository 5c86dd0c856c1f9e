//! Debug Transcript
//!
//! Records raw protocol lines when IRC debugging is enabled. Credentials sent
//! with `PASS` or NickServ `IDENTIFY` are masked before recording.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Lines kept before the oldest are discarded.
const TRANSCRIPT_LIMIT: usize = 10_000;

const MASK: &str = "********";
const IDENTIFY_MARKER: &str = ":IDENTIFY ";

/// Mask credentials in an outgoing line.
pub fn redact(line: &str) -> Cow<'_, str> {
    if line.starts_with("PASS ") {
        return Cow::Owned(format!("PASS {MASK}"));
    }
    if let Some(idx) = line.find(IDENTIFY_MARKER) {
        let keep = idx + IDENTIFY_MARKER.len();
        return Cow::Owned(format!("{}{MASK}", &line[..keep]));
    }
    Cow::Borrowed(line)
}

#[derive(Debug, Default)]
pub struct Transcript {
    enabled: bool,
    lines: Mutex<VecDeque<String>>,
}

impl Transcript {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lines: Mutex::default(),
        }
    }

    pub fn outgoing(&self, line: &str) {
        if self.enabled {
            self.push(">> ", &redact(line));
        }
    }

    pub fn incoming(&self, line: &str) {
        if self.enabled {
            self.push("<< ", line);
        }
    }

    fn push(&self, direction: &str, line: &str) {
        debug!(target: "hubbub_server::irc::wire", "{direction}{line}");
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == TRANSCRIPT_LIMIT {
            lines.pop_front();
        }
        lines.push_back(format!("{direction}{line}"));
    }

    /// Snapshot of the recorded lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
