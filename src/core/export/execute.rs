//! Output provider seam
//!
//! An [`OutputProvider`] consumes the segmenter through an
//! [`ExecuteContext`] and writes records to the context's output stream:
//!
//! ```text
//! while ctx.read_next_segment().await? {
//!     for record in ctx.current_segment() {
//!         // encode, write, then record_success / record_failure
//!     }
//! }
//! ```
//!
//! `execute` is called once per segment file, `on_executed` once per store
//! after the last segment.

use crate::core::export::context::RunContext;
use crate::core::export::files::related_file_name;
use crate::core::export::segmenter::Segmenter;
use crate::core::export::stream::{OutputStream, StreamOutput};
use crate::domain::entity::Store;
use crate::domain::errors::RecordFailure;
use crate::domain::ids::EntityId;
use crate::domain::profile::{ExportProfile, ExportProjection};
use crate::domain::record::ExportRecord;
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Serializes converted records into a concrete format
#[async_trait]
pub trait OutputProvider: Send + Sync {
    /// Name profiles refer to this provider by
    fn system_name(&self) -> &str;

    /// Extension of the files written, `None` when the provider is not file based
    fn file_extension(&self) -> Option<&str>;

    /// Writes the records of one segment file
    async fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<()>;

    /// Called once per store after all segments were written
    async fn on_executed(&self, _ctx: &mut ExecuteContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Secondary output files written next to a segment file
pub struct RelatedData {
    /// Export folder and base name of the segment file; `None` keeps units in memory
    base: Option<(PathBuf, String)>,
    extension: String,
    flush_threshold: usize,
    enabled: bool,
    units: BTreeMap<String, OutputStream>,
}

impl RelatedData {
    /// Related files `<base_name>-<unit>.<extension>` in `dir`
    pub fn files(dir: PathBuf, base_name: String, extension: &str, flush_threshold: usize) -> Self {
        Self {
            base: Some((dir, base_name)),
            extension: extension.to_string(),
            flush_threshold,
            enabled: true,
            units: BTreeMap::new(),
        }
    }

    /// Related units kept in memory
    pub fn memory(extension: &str, flush_threshold: usize) -> Self {
        Self {
            base: None,
            extension: extension.to_string(),
            flush_threshold,
            enabled: true,
            units: BTreeMap::new(),
        }
    }

    /// No related data may be written
    pub fn disabled() -> Self {
        Self {
            base: None,
            extension: String::new(),
            flush_threshold: 0,
            enabled: false,
            units: BTreeMap::new(),
        }
    }

    /// Units opened so far
    pub fn pending(&self) -> usize {
        self.units.len()
    }

    /// Returns the unit named `name`, opening it on first use
    pub async fn unit(&mut self, name: &str) -> Result<&mut OutputStream> {
        if !self.enabled {
            return Err(BatchportError::Provider(format!(
                "Related data '{name}' cannot be written here"
            )));
        }

        if !self.units.contains_key(name) {
            let stream = match &self.base {
                Some((dir, base_name)) => {
                    let file_name = related_file_name(base_name, name, &self.extension);
                    OutputStream::create(&dir.join(file_name), self.flush_threshold).await?
                }
                None => OutputStream::memory(self.flush_threshold),
            };
            self.units.insert(name.to_string(), stream);
        }

        self.units
            .get_mut(name)
            .ok_or_else(|| BatchportError::Provider(format!("Related data '{name}' is not open")))
    }

    /// Closes every unit; units nobody wrote to are deleted
    pub async fn finish_all(self) -> Result<Vec<(String, StreamOutput)>> {
        let mut outputs = Vec::with_capacity(self.units.len());
        for (name, stream) in self.units {
            if stream.is_empty() {
                stream.discard().await?;
                continue;
            }
            outputs.push((name, stream.finish().await?));
        }
        Ok(outputs)
    }

    /// Deletes every unit
    pub async fn discard_all(self) -> Result<()> {
        for (_, stream) in self.units {
            stream.discard().await?;
        }
        Ok(())
    }
}

/// What an output provider sees of a run
pub struct ExecuteContext<'a> {
    segmenter: &'a mut Segmenter,
    run: &'a mut RunContext,
    output: Option<&'a mut OutputStream>,
    related: &'a mut RelatedData,
    segment_index: u32,
}

impl<'a> ExecuteContext<'a> {
    pub fn new(
        segmenter: &'a mut Segmenter,
        run: &'a mut RunContext,
        output: Option<&'a mut OutputStream>,
        related: &'a mut RelatedData,
        segment_index: u32,
    ) -> Self {
        Self {
            segmenter,
            run,
            output,
            related,
            segment_index,
        }
    }

    /// Expected records of the current store, for progress reporting
    pub fn total_records(&self) -> u64 {
        self.segmenter.total_records()
    }

    /// Makes the next batch of the segment available
    ///
    /// Observes cancellation first; returns `false` once the run is aborted.
    pub async fn read_next_segment(&mut self) -> Result<bool> {
        if self.run.check_cancellation() {
            return Ok(false);
        }
        self.segmenter.read_next_segment(self.run).await
    }

    /// Converts and returns the records available for the segment
    pub fn current_segment(&mut self) -> Vec<ExportRecord> {
        self.segmenter.current_segment(self.run)
    }

    /// Stream of the current segment file
    ///
    /// # Errors
    ///
    /// Returns an error when no stream is open (non file based provider or
    /// the per-store completion call).
    pub fn output(&mut self) -> Result<&mut OutputStream> {
        self.output
            .as_deref_mut()
            .ok_or_else(|| BatchportError::Provider("No output stream is open".to_string()))
    }

    /// Related-data unit `name` of the current segment file
    pub async fn related_data(&mut self, name: &str) -> Result<&mut OutputStream> {
        self.related.unit(name).await
    }

    /// Counts a record written to the output
    pub fn record_success(&mut self) {
        self.run.record_success();
        if let Some(output) = self.output.as_deref_mut() {
            output.add_records(1);
        }
    }

    /// Counts a record that could not be written
    pub fn record_failure(&mut self, entity_id: Option<EntityId>, message: impl Into<String>) {
        let mut failure = RecordFailure::new(message);
        if let Some(id) = entity_id {
            failure = failure.with_entity_id(id.value());
        }
        self.run.record_failure(failure);
    }

    pub fn is_aborted(&self) -> bool {
        self.run.is_aborted()
    }

    /// 1-based index of the segment file
    pub fn segment_index(&self) -> u32 {
        self.segment_index
    }

    pub fn store(&self) -> &Store {
        &self.run.store
    }

    pub fn language(&self) -> &str {
        &self.run.store_meta.language
    }

    pub fn profile(&self) -> &ExportProfile {
        &self.run.profile
    }

    pub fn projection(&self) -> &ExportProjection {
        self.run.projection()
    }

    pub fn is_preview(&self) -> bool {
        self.run.preview
    }

    /// Appends a line to the run log
    pub fn log_info(&mut self, message: impl Into<String>) {
        self.run.log.info(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_related_units_named_after_segment() {
        let temp = TempDir::new().unwrap();
        let mut related = RelatedData::files(temp.path().to_path_buf(), "p-0-0001".to_string(), "csv", 1024);

        related.unit("media").await.unwrap().write_all(b"x\n").await.unwrap();
        related.unit("media").await.unwrap().write_all(b"y\n").await.unwrap();
        related.unit("categories").await.unwrap();
        assert_eq!(related.pending(), 2);

        let outputs = related.finish_all().await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "media");
        assert_eq!(std::fs::read_to_string(temp.path().join("p-0-0001-media.csv")).unwrap(), "x\ny\n");
        assert!(!temp.path().join("p-0-0001-categories.csv").exists());
    }

    #[tokio::test]
    async fn test_discard_all_removes_units() {
        let temp = TempDir::new().unwrap();
        let mut related = RelatedData::files(temp.path().to_path_buf(), "p-0-0001".to_string(), "csv", 1);
        related.unit("media").await.unwrap().write_all(b"x").await.unwrap();
        assert!(temp.path().join("p-0-0001-media.csv").exists());

        related.discard_all().await.unwrap();
        assert!(!temp.path().join("p-0-0001-media.csv").exists());
    }

    #[tokio::test]
    async fn test_disabled_related_data() {
        let mut related = RelatedData::disabled();
        assert!(related.unit("media").await.is_err());
    }
}
