//! Buffered output stream
//!
//! Providers write through an [`OutputStream`]. Bytes are collected in memory
//! and pushed to the sink whenever the buffer reaches the flush threshold, so
//! the unflushed data of a run stays bounded no matter how large the export
//! grows. A SHA-256 digest is computed while streaming.

use crate::domain::{BatchportError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

enum Sink {
    File { file: File, path: PathBuf },
    Memory(Vec<u8>),
}

/// What a finished stream produced
#[derive(Debug, Clone)]
pub struct StreamOutput {
    /// `None` for memory streams
    pub path: Option<PathBuf>,
    pub size_bytes: u64,
    pub records: u64,
    pub sha256: String,
    /// Contents of a memory stream
    pub contents: Option<Vec<u8>>,
}

/// Byte sink with a bounded write buffer
pub struct OutputStream {
    sink: Sink,
    buffer: Vec<u8>,
    flush_threshold: usize,
    bytes_written: u64,
    flushes: u64,
    records: u64,
    hasher: Sha256,
}

impl OutputStream {
    /// Creates (or truncates) the file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the parent folder or the file cannot be created.
    pub async fn create(path: &Path, flush_threshold: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(path)
            .await
            .map_err(|e| match BatchportError::from(e) {
                BatchportError::Io(message) => {
                    BatchportError::Io(format!("{}: {message}", path.display()))
                }
                other => other,
            })?;

        Ok(Self::with_sink(
            Sink::File {
                file,
                path: path.to_path_buf(),
            },
            flush_threshold,
        ))
    }

    /// Creates a stream that keeps everything in memory (preview runs)
    pub fn memory(flush_threshold: usize) -> Self {
        Self::with_sink(Sink::Memory(Vec::new()), flush_threshold)
    }

    fn with_sink(sink: Sink, flush_threshold: usize) -> Self {
        Self {
            sink,
            buffer: Vec::with_capacity(flush_threshold.min(64 * 1024)),
            flush_threshold: flush_threshold.max(1),
            bytes_written: 0,
            flushes: 0,
            records: 0,
            hasher: Sha256::new(),
        }
    }

    /// Appends bytes, flushing once the buffer reaches the threshold
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.hasher.update(data);
        self.buffer.extend_from_slice(data);
        self.bytes_written += data.len() as u64;

        if self.buffer.len() >= self.flush_threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Pushes the buffered bytes to the sink
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        match &mut self.sink {
            Sink::File { file, .. } => {
                file.write_all(&self.buffer).await?;
                file.flush().await?;
            }
            Sink::Memory(contents) => contents.extend_from_slice(&self.buffer),
        }
        self.buffer.clear();
        self.flushes += 1;
        Ok(())
    }

    /// Total bytes accepted, buffered ones included
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Bytes waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes_written == 0
    }

    /// Counts records written through this stream
    pub fn add_records(&mut self, count: u64) {
        self.records += count;
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File { path, .. } => Some(path),
            Sink::Memory(_) => None,
        }
    }

    /// Flushes and closes the stream
    pub async fn finish(mut self) -> Result<StreamOutput> {
        self.flush().await?;
        let sha256 = format!("{:x}", self.hasher.finalize());

        match self.sink {
            Sink::File { file, path } => {
                file.sync_all().await?;
                Ok(StreamOutput {
                    path: Some(path),
                    size_bytes: self.bytes_written,
                    records: self.records,
                    sha256,
                    contents: None,
                })
            }
            Sink::Memory(contents) => Ok(StreamOutput {
                path: None,
                size_bytes: self.bytes_written,
                records: self.records,
                sha256,
                contents: Some(contents),
            }),
        }
    }

    /// Drops buffered data and deletes the file
    pub async fn discard(self) -> Result<()> {
        if let Sink::File { file, path } = self.sink {
            drop(file);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            tracing::debug!(path = %path.display(), "Discarded output file");
        }
        Ok(())
    }
}
