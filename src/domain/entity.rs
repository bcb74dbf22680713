//! Source entities as loaded from the entity source
//!
//! A [`SourceEntity`] is one row of the exported table. Associated data that
//! the converter needs (attributes, categories, media, localized text) is not
//! part of the row; it is preloaded per page into [`Associations`].

use super::ids::{EntityId, StoreId};
use super::record::FieldValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Kind of entity an export profile targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Order,
    Customer,
    Category,
    Manufacturer,
    NewsletterSubscription,
}

impl EntityKind {
    /// Source table holding entities of this kind
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Order => "orders",
            EntityKind::Customer => "customers",
            EntityKind::Category => "categories",
            EntityKind::Manufacturer => "manufacturers",
            EntityKind::NewsletterSubscription => "newsletter_subscriptions",
        }
    }

    /// Whether entities of this kind can own child entities of the same kind
    pub fn supports_child_expansion(&self) -> bool {
        matches!(self, EntityKind::Product)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Order => "order",
            EntityKind::Customer => "customer",
            EntityKind::Category => "category",
            EntityKind::Manufacturer => "manufacturer",
            EntityKind::NewsletterSubscription => "newsletter_subscription",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "product" => Ok(EntityKind::Product),
            "order" => Ok(EntityKind::Order),
            "customer" => Ok(EntityKind::Customer),
            "category" => Ok(EntityKind::Category),
            "manufacturer" => Ok(EntityKind::Manufacturer),
            "newsletter_subscription" => Ok(EntityKind::NewsletterSubscription),
            other => Err(format!(
                "Invalid entity kind '{other}'. Must be one of: product, order, customer, \
                 category, manufacturer, newsletter_subscription"
            )),
        }
    }
}

/// One loaded source row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntity {
    pub id: EntityId,
    pub kind: EntityKind,

    /// Parent entity for grouped records (product variants)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Column values keyed by column name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl SourceEntity {
    /// Creates an entity with no fields
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            parent_id: None,
            store_id: None,
            created_at: Utc::now(),
            updated_at: None,
            fields: BTreeMap::new(),
        }
    }

    /// Sets the parent entity
    pub fn with_parent(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the owning store
    pub fn with_store(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self
    }

    /// Adds a field value
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Reads a boolean field, treating a missing field as `false`
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(FieldValue::Bool(true)))
    }
}

/// Data preloaded for one entity alongside its page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Associations {
    /// Attribute name to value
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    #[serde(default)]
    pub categories: Vec<String>,

    /// Media URLs in display order
    #[serde(default)]
    pub media: Vec<String>,

    /// Language code to (field name to localized value)
    #[serde(default)]
    pub localized: HashMap<String, BTreeMap<String, String>>,
}

impl Associations {
    /// Localized overrides for a language, if any were loaded
    pub fn localized_for(&self, language: &str) -> Option<&BTreeMap<String, String>> {
        self.localized.get(language)
    }
}

/// A store (sales channel) whose entities are exported separately when a
/// profile runs per store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub default_language: String,
}

impl Store {
    /// The implicit store of a source that has none
    pub fn default_store() -> Self {
        Self {
            id: StoreId::default(),
            name: "default".to_string(),
            default_language: "en".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_round_trip_names() {
        for kind in [
            EntityKind::Product,
            EntityKind::Order,
            EntityKind::Customer,
            EntityKind::Category,
            EntityKind::Manufacturer,
            EntityKind::NewsletterSubscription,
        ] {
            assert_eq!(EntityKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(EntityKind::from_str("invoice").is_err());
    }

    #[test]
    fn test_entity_kind_serde_snake_case() {
        let json = serde_json::to_string(&EntityKind::NewsletterSubscription).unwrap();
        assert_eq!(json, "\"newsletter_subscription\"");
        assert_eq!(EntityKind::Order.table_name(), "orders");
    }

    #[test]
    fn test_source_entity_builders() {
        let entity = SourceEntity::new(EntityId::new(5), EntityKind::Product)
            .with_parent(EntityId::new(1))
            .with_store(StoreId::new(2))
            .with_field("name", "Shirt")
            .with_field("is_system_account", true);

        assert_eq!(entity.parent_id, Some(EntityId::new(1)));
        assert_eq!(entity.store_id, Some(StoreId::new(2)));
        assert_eq!(entity.field("name"), Some(&FieldValue::Text("Shirt".into())));
        assert!(entity.flag("is_system_account"));
        assert!(!entity.flag("missing"));
    }

    #[test]
    fn test_default_store() {
        let store = Store::default_store();
        assert_eq!(store.id.value(), 0);
    }
}
