//! Export profiles
//!
//! A profile is the persisted description of one export: what to read
//! (filter), how to shape it (projection), how to split it (offset, limit,
//! batch size, per store) and where to deliver it (deployments).

use super::entity::EntityKind;
use super::ids::{EntityId, ProfileId, StoreId};
use crate::config::SecretString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted export profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportProfile {
    pub id: ProfileId,

    /// Display name
    #[serde(default)]
    pub name: String,

    pub entity_kind: EntityKind,

    /// System name of the output provider (`csv`, `jsonl`)
    pub provider: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub filter: ExportFilter,

    #[serde(default)]
    pub projection: ExportProjection,

    /// Source rows skipped before the first page
    #[serde(default)]
    pub offset: u64,

    /// Maximum number of exported records (0 = unlimited)
    #[serde(default)]
    pub limit: u64,

    /// Records per segment (0 = a single segment)
    #[serde(default)]
    pub batch_size: u64,

    /// Run the export once per store
    #[serde(default)]
    pub per_store: bool,

    #[serde(default)]
    pub create_zip: bool,

    /// Remove produced files once every deployment succeeded
    #[serde(default)]
    pub cleanup_after_deploy: bool,

    /// File name pattern with `{profile}`, `{store}` and `{segment}` placeholders
    #[serde(default = "default_file_name_pattern")]
    pub file_name_pattern: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotificationTarget>,

    #[serde(default)]
    pub deployments: Vec<DeploymentTarget>,
}

impl ExportProfile {
    /// Creates a profile with default options
    pub fn new(id: ProfileId, entity_kind: EntityKind, provider: impl Into<String>) -> Self {
        Self {
            name: id.to_string(),
            id,
            entity_kind,
            provider: provider.into(),
            enabled: true,
            filter: ExportFilter::default(),
            projection: ExportProjection::default(),
            offset: 0,
            limit: 0,
            batch_size: 0,
            per_store: false,
            create_zip: false,
            cleanup_after_deploy: false,
            file_name_pattern: default_file_name_pattern(),
            notify: None,
            deployments: Vec::new(),
        }
    }

    /// Validates the profile
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting
    pub fn validate(&self) -> Result<(), String> {
        if self.provider.trim().is_empty() {
            return Err(format!("profile '{}': provider cannot be empty", self.id));
        }

        if !self.file_name_pattern.contains("{segment}") {
            return Err(format!(
                "profile '{}': file_name_pattern must contain {{segment}}",
                self.id
            ));
        }
        if self.per_store && !self.file_name_pattern.contains("{store}") {
            return Err(format!(
                "profile '{}': file_name_pattern must contain {{store}} when per_store is set",
                self.id
            ));
        }
        if self.file_name_pattern.contains(['/', '\\']) {
            return Err(format!(
                "profile '{}': file_name_pattern must not contain path separators",
                self.id
            ));
        }

        if let (Some(from), Some(to)) = (self.filter.created_from, self.filter.created_to) {
            if from > to {
                return Err(format!(
                    "profile '{}': filter.created_from must not be after filter.created_to",
                    self.id
                ));
            }
        }

        if self.projection.order_status_after_export.is_some()
            && self.entity_kind != EntityKind::Order
        {
            return Err(format!(
                "profile '{}': projection.order_status_after_export requires entity_kind = 'order'",
                self.id
            ));
        }

        let mut names = std::collections::HashSet::new();
        for target in &self.deployments {
            target
                .validate()
                .map_err(|e| format!("profile '{}': {e}", self.id))?;
            if !names.insert(target.name.as_str()) {
                return Err(format!(
                    "profile '{}': duplicate deployment name '{}'",
                    self.id, target.name
                ));
            }
            if target.zip_only && !self.create_zip {
                return Err(format!(
                    "profile '{}': deployment '{}' is zip_only but create_zip is disabled",
                    self.id, target.name
                ));
            }
        }

        if let Some(notify) = &self.notify {
            validate_http_url(&notify.url)
                .map_err(|e| format!("profile '{}': notify.url {e}", self.id))?;
        }

        Ok(())
    }

    /// Deployment targets that take part in a run
    pub fn enabled_deployments(&self) -> impl Iterator<Item = &DeploymentTarget> {
        self.deployments.iter().filter(|d| d.enabled)
    }
}

/// Which source rows a profile exports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportFilter {
    /// Restrict to one store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,

    /// Explicit id subset (empty = all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_ids: Vec<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_from: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_to: Option<DateTime<Utc>>,

    /// Match the `is_active` flag of the row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// How grouped child rows relate to their parent in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildExpansion {
    /// Export parents only
    #[default]
    Keep,
    /// Export the children in place of their parent
    Replace,
    /// Export the parent followed by its children
    Supplement,
}

/// How records are shaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProjection {
    /// Output language (defaults to the store language)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default)]
    pub child_expansion: ChildExpansion,

    #[serde(default = "default_true")]
    pub include_attributes: bool,

    #[serde(default = "default_true")]
    pub include_categories: bool,

    #[serde(default = "default_true")]
    pub include_media: bool,

    /// Maximum media references per record (0 = all)
    #[serde(default)]
    pub max_media: usize,

    /// Skip customers flagged as system accounts
    #[serde(default = "default_true")]
    pub exclude_system_accounts: bool,

    /// Status written to exported orders after the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_status_after_export: Option<String>,

    /// Write list fields to related-data files instead of inline cells
    #[serde(default)]
    pub related_data: bool,
}

impl Default for ExportProjection {
    fn default() -> Self {
        Self {
            language: None,
            child_expansion: ChildExpansion::default(),
            include_attributes: true,
            include_categories: true,
            include_media: true,
            max_media: 0,
            exclude_system_accounts: true,
            order_status_after_export: None,
            related_data: false,
        }
    }
}

impl ExportProjection {
    /// Whether any associated data has to be preloaded for conversion
    pub fn needs_associations(&self) -> bool {
        self.include_attributes || self.include_categories || self.include_media
    }
}

/// Kind of deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentKind {
    FileSystem,
    Http,
}

impl std::fmt::Display for DeploymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentKind::FileSystem => f.write_str("file_system"),
            DeploymentKind::Http => f.write_str("http"),
        }
    }
}

/// A delivery destination for produced files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub name: String,
    pub kind: DeploymentKind,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Target directory for `file_system`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Base URL for `http`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Stored securely in memory and zeroized on drop
    #[serde(default, skip_serializing)]
    pub password: Option<SecretString>,

    /// Publish only the zip archive
    #[serde(default)]
    pub zip_only: bool,
}

impl DeploymentTarget {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("deployment name cannot be empty".to_string());
        }

        match self.kind {
            DeploymentKind::FileSystem => {
                if self.path.as_deref().map_or(true, |p| p.trim().is_empty()) {
                    return Err(format!(
                        "deployment '{}': path is required for file_system targets",
                        self.name
                    ));
                }
            }
            DeploymentKind::Http => {
                let url = self.url.as_deref().ok_or_else(|| {
                    format!("deployment '{}': url is required for http targets", self.name)
                })?;
                validate_http_url(url)
                    .map_err(|e| format!("deployment '{}': url {e}", self.name))?;
                if self.password.is_some() && self.username.is_none() {
                    return Err(format!(
                        "deployment '{}': password requires a username",
                        self.name
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Completion webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub url: String,

    /// Only notify when the run failed
    #[serde(default)]
    pub only_on_failure: bool,
}

fn validate_http_url(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("'{url}' is invalid: {e}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("'{url}' must start with http:// or https://"));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_file_name_pattern() -> String {
    "{profile}-{store}-{segment}".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn profile() -> ExportProfile {
        ExportProfile::new(ProfileId::new("products").unwrap(), EntityKind::Product, "csv")
    }

    fn http_target(name: &str) -> DeploymentTarget {
        DeploymentTarget {
            name: name.to_string(),
            kind: DeploymentKind::Http,
            enabled: true,
            path: None,
            url: Some("https://upload.example.com/feeds".to_string()),
            username: Some("feed".to_string()),
            password: Some(secret_string("secret".to_string())),
            zip_only: false,
        }
    }

    #[test]
    fn test_default_profile_is_valid() {
        assert!(profile().validate().is_ok());
    }

    #[test]
    fn test_file_name_pattern_requires_segment() {
        let mut p = profile();
        p.file_name_pattern = "{profile}-{store}".to_string();
        assert!(p.validate().unwrap_err().contains("{segment}"));
    }

    #[test]
    fn test_per_store_pattern_requires_store() {
        let mut p = profile();
        p.file_name_pattern = "export-{segment}".to_string();
        assert!(p.validate().is_ok());

        p.per_store = true;
        assert!(p.validate().unwrap_err().contains("{store}"));

        p.file_name_pattern = "export-{store}-{segment}".to_string();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_order_status_requires_order_kind() {
        let mut p = profile();
        p.projection.order_status_after_export = Some("exported".to_string());
        assert!(p.validate().is_err());

        p.entity_kind = EntityKind::Order;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_deployment_validation() {
        let mut p = profile();
        p.deployments.push(http_target("feed"));
        assert!(p.validate().is_ok());

        p.deployments.push(http_target("feed"));
        assert!(p.validate().unwrap_err().contains("duplicate"));

        p.deployments.pop();
        p.deployments[0].url = Some("ftp://example.com".to_string());
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_zip_only_requires_zip() {
        let mut p = profile();
        let mut target = http_target("archive");
        target.zip_only = true;
        p.deployments.push(target);
        assert!(p.validate().is_err());

        p.create_zip = true;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_filesystem_target_requires_path() {
        let mut p = profile();
        p.deployments.push(DeploymentTarget {
            name: "local".to_string(),
            kind: DeploymentKind::FileSystem,
            enabled: true,
            path: None,
            url: None,
            username: None,
            password: None,
            zip_only: false,
        });
        assert!(p.validate().unwrap_err().contains("path is required"));
    }

    #[test]
    fn test_profile_from_toml_defaults() {
        let p: ExportProfile = toml::from_str(
            r#"
id = "customers"
entity_kind = "customer"
provider = "jsonl"
"#,
        )
        .unwrap();

        assert!(p.enabled);
        assert_eq!(p.limit, 0);
        assert_eq!(p.file_name_pattern, "{profile}-{store}-{segment}");
        assert!(p.projection.exclude_system_accounts);
        assert_eq!(p.projection.child_expansion, ChildExpansion::Keep);
    }
}
