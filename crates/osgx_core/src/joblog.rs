//! Export-scoped diagnostics.
//!
//! Every recoverable problem met while converting one scene is recorded
//! here and forwarded to the `log` facade. When a log file is attached the
//! entries are streamed to it and the file is flushed and closed exactly
//! once, by [`ExportLog::finish`] or on drop.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::Level;

/// One recorded diagnostic.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

/// Consolidated log of one export job.
#[derive(Debug, Default)]
pub struct ExportLog {
    entries: Vec<LogEntry>,
    sink: Option<BufWriter<File>>,
}

impl ExportLog {
    /// In-memory log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that also writes to `path` (created or truncated).
    pub fn with_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            entries: Vec::new(),
            sink: Some(BufWriter::new(file)),
        })
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(Level::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(Level::Warn, message.into());
    }

    /// Record a failure that ends the job.
    pub fn error(&mut self, message: impl Into<String>) {
        self.record(Level::Error, message.into());
    }

    fn record(&mut self, level: Level, message: String) {
        log::log!(level, "{}", message);
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = writeln!(sink, "{}: {}", level, message) {
                log::error!("Failed to write export log: {}", e);
                self.sink = None;
            }
        }
        self.entries.push(LogEntry { level, message });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.level == Level::Warn)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Flush and close the attached file. Later calls do nothing.
    pub fn finish(&mut self) -> std::io::Result<()> {
        match self.sink.take() {
            Some(mut sink) => sink.flush(),
            None => Ok(()),
        }
    }

    /// Take the recorded entries, closing the log.
    pub fn into_entries(mut self) -> Vec<LogEntry> {
        if let Err(e) = self.finish() {
            log::error!("Failed to flush export log: {}", e);
        }
        std::mem::take(&mut self.entries)
    }
}

impl Drop for ExportLog {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("Failed to flush export log: {}", e);
        }
    }
}
