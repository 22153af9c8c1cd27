//! Static product catalog.

use super::ToolOutcome;
use crate::config::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One product the agent can answer questions about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(alias = "availability")]
    pub available: bool,
}

impl ProductRecord {
    /// Multi-line description returned to the agent.
    pub fn describe(&self) -> String {
        format!(
            "Product: {}\nPrice: ${:.2}\nFeatures: {}\nAvailable: {}",
            self.name,
            self.price,
            self.features.join(", "),
            if self.available { "Yes" } else { "No" }
        )
    }
}

/// Read-only product table keyed by lower-cased id.
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    products: BTreeMap<String, ProductRecord>,
}

impl ProductCatalog {
    /// The built-in mock table.
    pub fn builtin() -> Self {
        Self::with_records([ProductRecord {
            id: "product_xyz".to_string(),
            name: "Product XYZ".to_string(),
            price: 999.99,
            features: vec![
                "Feature 1".to_string(),
                "Feature 2".to_string(),
                "Feature 3".to_string(),
            ],
            available: true,
        }])
    }

    /// Build a table from records. Later records replace earlier ones with the same id.
    pub fn with_records(records: impl IntoIterator<Item = ProductRecord>) -> Self {
        let products = records
            .into_iter()
            .map(|r| (r.id.to_lowercase(), r))
            .collect();
        Self { products }
    }

    /// Built-in table with configured records merged over it.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut catalog = Self::builtin();
        for record in &settings.catalog.products {
            catalog.products.insert(record.id.to_lowercase(), record.clone());
        }
        catalog
    }

    /// Case-insensitive lookup.
    pub fn get(&self, product_id: &str) -> Option<&ProductRecord> {
        self.products.get(&product_id.trim().to_lowercase())
    }

    /// Tool entry point. A miss is a normal answer, not a failure.
    pub fn lookup(&self, product_id: &str) -> ToolOutcome {
        match self.get(product_id) {
            Some(product) => ToolOutcome::success(product.describe()),
            None => ToolOutcome::success(format!("Product {} not found", product_id)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductRecord> {
        self.products.values()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_product_any_case() {
        let catalog = ProductCatalog::builtin();
        for id in ["product_xyz", "PRODUCT_XYZ", "Product_Xyz"] {
            let outcome = catalog.lookup(id);
            assert!(outcome.ok);
            assert!(outcome.message.contains("Product XYZ"));
            assert!(outcome.message.contains("999.99"));
            assert!(outcome.message.contains("Feature 1, Feature 2, Feature 3"));
            assert!(outcome.message.contains("Available: Yes"));
        }
    }

    #[test]
    fn test_unknown_product_mentions_id() {
        let catalog = ProductCatalog::builtin();
        for id in ["product_abc", "XYZ", ""] {
            let outcome = catalog.lookup(id);
            assert_eq!(outcome.message, format!("Product {} not found", id));
        }
    }

    #[test]
    fn test_configured_products_merge() {
        let mut settings = Settings::default();
        settings.catalog.products.push(ProductRecord {
            id: "Widget".to_string(),
            name: "Widget".to_string(),
            price: 10.0,
            features: vec![],
            available: false,
        });

        let catalog = ProductCatalog::from_settings(&settings);
        assert_eq!(catalog.len(), 2);
        let message = catalog.lookup("widget").message;
        assert!(message.contains("Price: $10.00"));
        assert!(message.contains("Available: No"));
    }
}
