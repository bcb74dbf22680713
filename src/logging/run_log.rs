//! Per-run textual log
//!
//! Every run keeps a human readable log that is written as `run.log` into the
//! profile's export folder during finalization. Entries are mirrored to
//! `tracing` so they also reach the console and the JSON log file.

use crate::domain::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;

/// File name of the persisted run log
pub const RUN_LOG_FILE_NAME: &str = "run.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for RunLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunLogLevel::Info => f.write_str("INFO"),
            RunLogLevel::Warn => f.write_str("WARN"),
            RunLogLevel::Error => f.write_str("ERROR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: RunLogLevel,
    pub message: String,
}

/// In-memory log of one run
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<RunLogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "batchport::run", "{message}");
        self.push(RunLogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "batchport::run", "{message}");
        self.push(RunLogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(target: "batchport::run", "{message}");
        self.push(RunLogLevel::Error, message);
    }

    fn push(&mut self, level: RunLogLevel, message: String) {
        self.entries.push(RunLogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    pub fn entries(&self) -> &[RunLogEntry] {
        &self.entries
    }

    /// Number of entries at `level`
    pub fn count(&self, level: RunLogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    /// Renders the log as text, one line per entry
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "{} {:<5} {}\n",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                entry.level,
                entry.message
            ));
        }
        out
    }

    /// Writes the log as `run.log` into `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or the file written.
    pub async fn write_to(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(dir.join(RUN_LOG_FILE_NAME), self.render()).await?;
        Ok(())
    }
}
