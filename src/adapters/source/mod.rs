//! Entity sources
//!
//! - [`traits`] - The [`EntitySource`] boundary and its query types
//! - [`postgres`] - PostgreSQL implementation over a deadpool connection pool
//! - [`memory`] - In-process implementation for tests and embedders

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemorySource;
pub use postgres::PostgresSource;
pub use traits::{EntitySource, PageCursor, SourceQuery};
