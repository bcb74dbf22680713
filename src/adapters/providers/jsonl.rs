//! JSON Lines output provider: one JSON object per record

use crate::core::export::execute::{ExecuteContext, OutputProvider};
use crate::domain::Result;
use async_trait::async_trait;

pub const JSONL_SYSTEM_NAME: &str = "jsonl";

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesProvider;

impl JsonLinesProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutputProvider for JsonLinesProvider {
    fn system_name(&self) -> &str {
        JSONL_SYSTEM_NAME
    }

    fn file_extension(&self) -> Option<&str> {
        Some("jsonl")
    }

    async fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<()> {
        while ctx.read_next_segment().await? {
            for record in ctx.current_segment() {
                if ctx.is_aborted() {
                    return Ok(());
                }
                match serde_json::to_vec(&record) {
                    Ok(mut line) => {
                        line.push(b'\n');
                        ctx.output()?.write_all(&line).await?;
                        ctx.record_success();
                    }
                    Err(e) => ctx.record_failure(Some(record.entity_id), e.to_string()),
                }
            }
        }
        Ok(())
    }
}
