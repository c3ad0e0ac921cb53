//! Line-oriented log sinks for the operator audit trail.
//!
//! Every phase of an upload writes a line to the caller's [`LogSink`]: the
//! validity check, the login attempt and its result, the measurement URL, and
//! the final outcome. In a CI job these lines are the only record of what was
//! sent where.

use std::io::Write;
use std::sync::Mutex;

/// Receives human-readable progress lines.
pub trait LogSink: Send + Sync {
    /// Write a single line. Implementations add the line terminator.
    fn line(&self, line: &str);
}

/// Forwards every line to `tracing::info!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn line(&self, line: &str) {
        tracing::info!(target: "cbri::audit", "{line}");
    }
}

/// Writes lines to any `io::Write`, e.g. a build console or a file.
///
/// Write failures are dropped; losing an audit line must not fail an upload.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WriterSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn line(&self, line: &str) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the lines written so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns true if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

impl<S: LogSink + ?Sized> LogSink for &S {
    fn line(&self, line: &str) {
        (**self).line(line)
    }
}
