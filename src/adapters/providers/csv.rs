//! CSV output provider
//!
//! Converted records are spooled as JSON lines while the segment is read, so
//! the header can name every field that occurs anywhere in the file: the
//! typed core columns followed by the sorted field names. The rows are then
//! replayed from the spool into the segment file. Fields a record lacks are
//! written as empty cells. Every segment starts with its own header, also in
//! preview output.
//!
//! The spool sits next to the segment file as `<file>.spool` (in memory for
//! previews) and is removed once the segment is written.
//!
//! With `projection.related_data` list fields are not inlined; each item
//! becomes a row `entity_id,value` in the related unit named after the field.

use crate::core::export::execute::{ExecuteContext, OutputProvider};
use crate::core::export::stream::{OutputStream, StreamOutput};
use crate::domain::record::{ExportRecord, FieldValue};
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub const CSV_SYSTEM_NAME: &str = "csv";

const SPOOL_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvProvider;

impl CsvProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutputProvider for CsvProvider {
    fn system_name(&self) -> &str {
        CSV_SYSTEM_NAME
    }

    fn file_extension(&self) -> Option<&str> {
        Some("csv")
    }

    async fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<()> {
        let spool_at = ctx.output()?.path().map(spool_path);
        let mut spool = match spool_at {
            Some(path) => OutputStream::create(&path, SPOOL_BUFFER_BYTES).await?,
            None => OutputStream::memory(SPOOL_BUFFER_BYTES),
        };

        let columns = match spool_segment(ctx, &mut spool).await {
            Ok(Some(columns)) => columns,
            Ok(None) => return spool.discard().await,
            Err(e) => {
                if let Err(cleanup) = spool.discard().await {
                    tracing::warn!(error = %cleanup, "Failed to remove CSV spool");
                }
                return Err(e);
            }
        };

        let spooled = spool.finish().await?;
        let outcome = replay(ctx, &spooled, &columns).await;
        if let Some(path) = &spooled.path {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove CSV spool");
            }
        }
        outcome
    }
}

fn spool_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".spool");
    PathBuf::from(name)
}

/// Spools the records of the segment and collects its field columns
///
/// Returns `None` when the run was aborted while reading.
async fn spool_segment(
    ctx: &mut ExecuteContext<'_>,
    spool: &mut OutputStream,
) -> Result<Option<Vec<String>>> {
    let related = ctx.projection().related_data;
    let mut columns = BTreeSet::new();

    while ctx.read_next_segment().await? {
        for record in ctx.current_segment() {
            if ctx.is_aborted() {
                return Ok(None);
            }
            collect_columns(&record, related, &mut columns);
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            spool.write_all(&line).await?;
            spool.add_records(1);
            if related {
                write_related(ctx, &record).await?;
            }
        }
    }

    if ctx.is_aborted() {
        return Ok(None);
    }
    Ok(Some(columns.into_iter().collect()))
}

/// Writes the header and every spooled record to the segment file
async fn replay(
    ctx: &mut ExecuteContext<'_>,
    spooled: &StreamOutput,
    fields: &[String],
) -> Result<()> {
    if spooled.records == 0 {
        return Ok(());
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send + '_> = match (&spooled.path, &spooled.contents) {
        (Some(path), _) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        (None, Some(contents)) => Box::new(contents.as_slice()),
        (None, None) => return Ok(()),
    };

    let mut header: Vec<String> = ExportRecord::core_columns()
        .iter()
        .map(|c| c.to_string())
        .collect();
    header.extend(fields.iter().cloned());
    ctx.output()?.write_all(&encode_row(&header)?).await?;

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if ctx.is_aborted() {
            return Ok(());
        }
        let record: ExportRecord = serde_json::from_str(&line)?;
        match encode_record(&record, fields) {
            Ok(row) => {
                ctx.output()?.write_all(&row).await?;
                ctx.record_success();
            }
            Err(e) => ctx.record_failure(Some(record.entity_id), e.to_string()),
        }
    }
    Ok(())
}

fn collect_columns(record: &ExportRecord, skip_lists: bool, columns: &mut BTreeSet<String>) {
    for (name, value) in &record.fields {
        if skip_lists && matches!(value, FieldValue::List(_)) {
            continue;
        }
        columns.insert(name.clone());
    }
}

fn encode_record(record: &ExportRecord, fields: &[String]) -> Result<Vec<u8>> {
    let mut cells: Vec<String> = record.core_values().into_iter().collect();
    for name in fields {
        cells.push(record.get(name).map(ToString::to_string).unwrap_or_default());
    }
    encode_row(&cells)
}

fn encode_row(cells: &[String]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(cells)?;
    writer
        .into_inner()
        .map_err(|e| BatchportError::Serialization(format!("CSV error: {e}")))
}

async fn write_related(ctx: &mut ExecuteContext<'_>, record: &ExportRecord) -> Result<()> {
    for (name, value) in &record.fields {
        let FieldValue::List(items) = value else {
            continue;
        };
        let entity_id = record.entity_id.to_string();
        let unit = ctx.related_data(name).await?;
        if unit.is_empty() {
            unit.write_all(&encode_row(&["entity_id".to_string(), "value".to_string()])?)
                .await?;
        }
        for item in items {
            unit.write_all(&encode_row(&[entity_id.clone(), item.to_string()])?)
                .await?;
        }
        unit.add_records(items.len() as u64);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::EntityKind;
    use crate::domain::ids::{EntityId, StoreId};

    fn record(id: i64) -> ExportRecord {
        let mut record = ExportRecord::new(EntityId::new(id), EntityKind::Product, StoreId::new(0), "en");
        record.set("name", format!("Product, {id}"));
        record.set("media", vec!["a.jpg", "b.jpg"]);
        record
    }

    #[test]
    fn test_collect_columns() {
        let mut second = record(2);
        second.set("sku", "S-2");

        let mut all = BTreeSet::new();
        let mut scalar = BTreeSet::new();
        for r in [record(1), second] {
            collect_columns(&r, false, &mut all);
            collect_columns(&r, true, &mut scalar);
        }

        assert_eq!(all.into_iter().collect::<Vec<_>>(), vec!["media", "name", "sku"]);
        assert_eq!(scalar.into_iter().collect::<Vec<_>>(), vec!["name", "sku"]);
    }

    #[test]
    fn test_encode_record_quotes_and_lists() {
        let fields = vec!["media".to_string(), "missing".to_string(), "name".to_string()];
        let row = String::from_utf8(encode_record(&record(7), &fields).unwrap()).unwrap();
        assert_eq!(row, "7,product,,0,en,a.jpg|b.jpg,,\"Product, 7\"\n");
    }

    #[test]
    fn test_spool_path() {
        assert_eq!(
            spool_path(Path::new("/out/products-0-0001.csv")),
            PathBuf::from("/out/products-0-0001.csv.spool")
        );
    }

    #[test]
    fn test_spooled_record_survives_json_line() {
        let mut original = record(3);
        original.set("price", 9.5);
        original.set("stock", 4);
        original.set("active", true);

        let line = serde_json::to_string(&original).unwrap();
        assert!(!line.contains('\n'));
        let restored: ExportRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(restored, original);
    }
}
