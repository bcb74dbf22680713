//! Output providers
//!
//! - [`csv`] - Comma separated values with optional related-data files
//! - [`jsonl`] - JSON Lines

pub mod csv;
pub mod jsonl;

pub use self::csv::CsvProvider;
pub use self::jsonl::JsonLinesProvider;

use crate::core::export::execute::OutputProvider;
use crate::domain::{BatchportError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Providers keyed by system name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn OutputProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CsvProvider::new()));
        registry.register(Arc::new(JsonLinesProvider::new()));
        registry
    }

    /// Adds a provider, replacing one with the same system name
    pub fn register(&mut self, provider: Arc<dyn OutputProvider>) {
        self.providers
            .insert(provider.system_name().to_string(), provider);
    }

    /// Resolves a provider by system name
    ///
    /// # Errors
    ///
    /// Returns [`BatchportError::NotFound`] for an unknown name.
    pub fn get(&self, system_name: &str) -> Result<Arc<dyn OutputProvider>> {
        self.providers.get(system_name).cloned().ok_or_else(|| {
            BatchportError::NotFound(format!(
                "Output provider '{system_name}' (available: {})",
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_providers() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["csv", "jsonl"]);
        assert_eq!(registry.get("jsonl").unwrap().file_extension(), Some("jsonl"));

        let err = registry.get("xml").err().unwrap();
        assert!(err.to_string().contains("csv, jsonl"));
    }
}
