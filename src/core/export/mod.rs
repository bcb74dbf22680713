//! Segmented export pipeline
//!
//! This module provides the export engine of batchport:
//! - Cursor pagination over the entity source ([`loader`])
//! - Page-scoped association caches ([`preload`])
//! - Record conversion ([`convert`])
//! - Segment cutting with record limits ([`segmenter`])
//! - The output provider seam ([`execute`]) and buffered output ([`stream`])
//! - Run orchestration, single-flight locking and summaries

pub mod context;
pub mod convert;
pub mod coordinator;
pub mod execute;
pub mod files;
pub mod loader;
pub mod lock;
pub mod preload;
pub mod segmenter;
pub mod stream;
pub mod summary;

pub use context::{AbortState, RunContext, StoreMeta};
pub use convert::{ConvertContext, FlatRecordConverter, RecordConverter};
pub use coordinator::{ExportCoordinator, ExportSettings, RunRequest};
pub use execute::{ExecuteContext, OutputProvider, RelatedData};
pub use files::ProducedFile;
pub use loader::CursorLoader;
pub use lock::{ProfileLockGuard, ProfileLocks};
pub use preload::{BatchCache, BatchPreloader, SourcePreloader};
pub use segmenter::Segmenter;
pub use stream::{OutputStream, StreamOutput};
pub use summary::{ExportError, ExportErrorType, RunSummary};
