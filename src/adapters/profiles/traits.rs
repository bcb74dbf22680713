//! Profile storage abstraction
//!
//! Profiles are read at run start and the structured run result is written
//! back next to them.

use crate::core::state::RunRecord;
use crate::domain::ids::ProfileId;
use crate::domain::profile::ExportProfile;
use crate::domain::Result;
use async_trait::async_trait;

/// Storage of export profiles and their latest run records
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Loads one profile
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::BatchportError::NotFound`] for an unknown id.
    async fn load_profile(&self, id: &ProfileId) -> Result<ExportProfile>;

    /// Every stored profile
    async fn list_profiles(&self) -> Result<Vec<ExportProfile>>;

    /// Writes the run record of a profile, replacing the previous one
    async fn save_run_record(&self, record: &RunRecord) -> Result<()>;

    /// Latest run record of a profile, if it ever ran
    async fn load_run_record(&self, id: &ProfileId) -> Result<Option<RunRecord>>;

    /// Latest run record of every profile
    async fn all_run_records(&self) -> Result<Vec<RunRecord>>;
}
