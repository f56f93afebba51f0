//! Console surface and localized text.
//!
//! The node only needs two things from its user interface: a place to write
//! lines and a stream of command lines. [`Console`] is the output half; the
//! app reads input lines itself.

pub mod strings;

pub use strings::*;

use std::io::Write;
use std::sync::Mutex;

/// Receives display lines
pub trait Console: Send + Sync {
    /// Show one (possibly multi-line) message
    fn add_line(&self, line: &str);
}

/// Writes lines to standard output
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn add_line(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
            log::warn!("Failed to write to console: {}", e);
        }
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemoryConsole {
    lines: Mutex<Vec<String>>,
}

impl MemoryConsole {
    /// Create an empty console
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line shown so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    /// Forget every line shown so far
    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl Console for MemoryConsole {
    fn add_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
