//! Supplier fixtures
//!
//! JSON seed data for the in-memory registry, used by the binary and tests.

use std::path::Path;

use serde::{Deserialize, Serialize};
use supplyrank_common::{Metrics, RankingError, Result, SupplierRecord};
use tracing::info;

use super::collaborators::InMemorySupplierRegistry;

/// One supplier with its metrics and product listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSupplier {
    #[serde(flatten)]
    pub record: SupplierRecord,
    /// Absent for suppliers the metrics source cannot resolve
    #[serde(default)]
    pub metrics: Option<Metrics>,
    #[serde(default)]
    pub products: Vec<String>,
}

/// A set of suppliers to seed a registry with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplierFixture {
    pub suppliers: Vec<FixtureSupplier>,
}

impl SupplierFixture {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RankingError::Config(format!("fixture: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| RankingError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Build a registry holding every fixture supplier
    pub fn into_registry(self) -> InMemorySupplierRegistry {
        let registry = InMemorySupplierRegistry::new();
        for supplier in self.suppliers {
            let id = supplier.record.id;
            if let Some(metrics) = supplier.metrics {
                registry.set_metrics(id, metrics);
            }
            for product in supplier.products {
                registry.link_product(product, id);
            }
            registry.insert_supplier(supplier.record);
        }
        info!(
            suppliers = registry.supplier_count(),
            products = registry.product_ids().len(),
            "Seeded supplier registry"
        );
        registry
    }
}
