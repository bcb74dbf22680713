// State management: profiles and persisted run records

pub mod manager;
pub mod run_record;

pub use manager::StateManager;
pub use run_record::{RunRecord, RunStatus};
