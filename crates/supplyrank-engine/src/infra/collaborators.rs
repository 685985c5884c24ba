//! External collaborator interfaces
//!
//! The ranking core consumes three services it does not own: the supplier
//! directory, the metrics source, and the product catalog. Each is a trait
//! so deployments can plug in their own clients; [`InMemorySupplierRegistry`]
//! implements all three for tests, fixtures and local runs.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use supplyrank_common::{Metrics, RankingError, Result, SupplierId, SupplierRecord};

/// Supplier directory lookup
#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    /// Get a supplier record, `None` if the directory has no such supplier
    async fn get_supplier(&self, id: SupplierId) -> Result<Option<SupplierRecord>>;

    /// All known supplier ids, ascending
    async fn list_suppliers(&self) -> Result<Vec<SupplierId>>;
}

/// Source of combined supplier metrics
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Latest metrics for a supplier
    ///
    /// Must return clamped, complete values or fail; `UnknownSupplier` when
    /// the supplier has no metrics.
    async fn calculate_combined_metrics(&self, id: SupplierId) -> Result<Metrics>;
}

/// Candidate supplier listing per product
#[async_trait]
pub trait SupplierCatalog: Send + Sync {
    async fn get_suppliers_by_product(&self, product_id: &str) -> Result<BTreeSet<SupplierId>>;
}

/// Run a collaborator call within `budget`, mapping expiry to `Timeout`
pub async fn bounded<T, F>(budget: Duration, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(RankingError::Timeout(format!(
            "{} exceeded {}ms",
            what,
            budget.as_millis()
        ))),
    }
}

/// In-memory directory, metrics source and catalog
#[derive(Debug, Default)]
pub struct InMemorySupplierRegistry {
    records: DashMap<SupplierId, SupplierRecord>,
    metrics: DashMap<SupplierId, Metrics>,
    products: DashMap<String, BTreeSet<SupplierId>>,
}

impl InMemorySupplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a directory record
    pub fn insert_supplier(&self, record: SupplierRecord) {
        self.records.insert(record.id, record);
    }

    /// Record the latest metrics for a supplier
    pub fn set_metrics(&self, id: SupplierId, metrics: Metrics) {
        self.metrics.insert(id, metrics);
    }

    /// List a supplier as a candidate for a product
    pub fn link_product(&self, product_id: impl Into<String>, id: SupplierId) {
        self.products.entry(product_id.into()).or_default().insert(id);
    }

    pub fn supplier_count(&self) -> usize {
        self.records.len()
    }

    /// Known product ids, sorted
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.products.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl SupplierDirectory for InMemorySupplierRegistry {
    async fn get_supplier(&self, id: SupplierId) -> Result<Option<SupplierRecord>> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn list_suppliers(&self) -> Result<Vec<SupplierId>> {
        let mut ids: Vec<SupplierId> = self.records.iter().map(|e| *e.key()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl MetricsSource for InMemorySupplierRegistry {
    async fn calculate_combined_metrics(&self, id: SupplierId) -> Result<Metrics> {
        self.metrics
            .get(&id)
            .map(|m| *m)
            .ok_or(RankingError::UnknownSupplier(id))
    }
}

#[async_trait]
impl SupplierCatalog for InMemorySupplierRegistry {
    async fn get_suppliers_by_product(&self, product_id: &str) -> Result<BTreeSet<SupplierId>> {
        Ok(self
            .products
            .get(product_id)
            .map(|ids| ids.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_lookups() {
        let registry = InMemorySupplierRegistry::new();
        registry.insert_supplier(SupplierRecord::new(SupplierId(2)).with_company_name("Beta"));
        registry.insert_supplier(SupplierRecord::new(SupplierId(1)).with_company_name("Alpha"));
        registry.set_metrics(SupplierId(1), Metrics::new(5.0, 5.0, 5.0, 5.0).unwrap());
        registry.link_product("widget", SupplierId(2));
        registry.link_product("widget", SupplierId(1));

        assert_eq!(
            registry.list_suppliers().await.unwrap(),
            vec![SupplierId(1), SupplierId(2)]
        );
        assert!(registry.get_supplier(SupplierId(3)).await.unwrap().is_none());
        assert_eq!(
            registry.get_suppliers_by_product("widget").await.unwrap().len(),
            2
        );
        assert!(registry
            .get_suppliers_by_product("gadget")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_missing_metrics_is_unknown_supplier() {
        let registry = InMemorySupplierRegistry::new();
        let err = registry
            .calculate_combined_metrics(SupplierId(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownSupplier");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, RankingError>(())
        };
        let err = bounded(Duration::from_millis(50), "metrics lookup", slow)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "Timeout");
        assert!(err.to_string().contains("metrics lookup"));
    }
}
