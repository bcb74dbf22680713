//! Domain identifier types with validation
//!
//! Newtype wrappers keep profile, entity and store identifiers from being
//! mixed up. `EntityId` is the keyset cursor value and is totally ordered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Export profile identifier
///
/// Profile ids name the export folder and the persisted run record, so they
/// must be non-empty, free of path separators and not made of dots only.
///
/// # Examples
///
/// ```
/// use batchport::domain::ids::ProfileId;
/// use std::str::FromStr;
///
/// let id = ProfileId::from_str("products-csv").unwrap();
/// assert_eq!(id.as_str(), "products-csv");
/// assert!(ProfileId::new("../etc").is_err());
/// assert!(ProfileId::new(".").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId(String);

impl ProfileId {
    /// Creates a new ProfileId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Profile ID cannot be empty".to_string());
        }
        if trimmed.contains(['/', '\\']) || trimmed.contains("..") {
            return Err(format!(
                "Profile ID '{trimmed}' must not contain path separators or '..'"
            ));
        }
        if trimmed.chars().all(|c| c == '.') {
            return Err(format!("Profile ID '{trimmed}' must not consist of dots only"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the profile ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProfileId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProfileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source entity identifier
///
/// Identifiers are immutable and increase monotonically in the source, which
/// is what makes `id > last_id` pagination duplicate-free.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Creates a new EntityId
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| format!("Invalid entity ID '{s}': {e}"))
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Store identifier
///
/// Store `0` is the implicit default store of single-store sources.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct StoreId(i64);

impl StoreId {
    /// Creates a new StoreId
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StoreId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| format!("Invalid store ID '{s}': {e}"))
    }
}

/// Parse a comma-separated list of entity ids
///
/// Used for the `--entity-ids` override of a run.
pub fn parse_entity_ids(input: &str) -> Result<Vec<EntityId>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(EntityId::from_str)
        .collect()
}
