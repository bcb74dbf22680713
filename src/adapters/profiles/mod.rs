//! Export profile storage
//!
//! - [`traits`] - The [`ProfileStore`] boundary
//! - [`file`] - Profiles from configuration, run records as JSON files
//! - [`memory`] - In-process store for tests and embedders

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileProfileStore;
pub use memory::MemoryProfileStore;
pub use traits::ProfileStore;
