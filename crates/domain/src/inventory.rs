//! Stock accounting over the product catalog.

use common::{Product, ProductId};
use metrics::counter;
use store::{ProductStore, StoreError};
use tracing::debug;

use crate::error::{DomainError, Result};

/// The single writer of product stock.
///
/// Every mutation re-reads the product and persists it at the version it was
/// read at; a `VersionConflict` means another writer landed first, in which
/// case the mutation is retried against the fresh row. Each retry only
/// happens because some other write made progress, so the loop terminates
/// under contention.
#[derive(Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S: ProductStore> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Atomically reserves `quantity` units of a product.
    ///
    /// Fails with `InsufficientStock` if the product cannot cover the
    /// request, leaving stock untouched. Returns the product as persisted
    /// after the decrement.
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    pub async fn decrement(&self, product_id: &ProductId, quantity: u32) -> Result<Product> {
        loop {
            let product = self.load(product_id).await?;
            if product.stock < quantity {
                return Err(DomainError::InsufficientStock {
                    name: product.name,
                    requested: quantity,
                    available: product.stock,
                });
            }

            let mut updated = product;
            updated.stock -= quantity;
            match self.store.persist_product(updated).await {
                Ok(product) => {
                    counter!("inventory_units_reserved_total").increment(u64::from(quantity));
                    return Ok(product);
                }
                Err(StoreError::VersionConflict { expected, actual, .. }) => {
                    counter!("inventory_version_conflicts_total").increment(1);
                    debug!(%product_id, expected, actual, "stock write conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Returns `quantity` units of a product to stock.
    ///
    /// Used when an order is cancelled and when a partially applied checkout
    /// is unwound.
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    pub async fn restore(&self, product_id: &ProductId, quantity: u32) -> Result<Product> {
        loop {
            let mut updated = self.load(product_id).await?;
            updated.stock += quantity;
            match self.store.persist_product(updated).await {
                Ok(product) => {
                    counter!("inventory_units_restored_total").increment(u64::from(quantity));
                    return Ok(product);
                }
                Err(StoreError::VersionConflict { expected, actual, .. }) => {
                    counter!("inventory_version_conflicts_total").increment(1);
                    debug!(%product_id, expected, actual, "stock write conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn load(&self, product_id: &ProductId) -> Result<Product> {
        self.store
            .lookup_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use store::InMemoryStore;

    async fn seeded_ledger(stock: u32) -> (InventoryLedger<InMemoryStore>, ProductId) {
        let store = InMemoryStore::new();
        let id = ProductId::new("product-1");
        store
            .insert_product(Product::new(id.clone(), "Widget", Money::from_cents(1000), stock))
            .await
            .unwrap();
        (InventoryLedger::new(store), id)
    }

    #[tokio::test]
    async fn decrement_reduces_stock() {
        let (ledger, id) = seeded_ledger(5).await;
        let product = ledger.decrement(&id, 2).await.unwrap();
        assert_eq!(product.stock, 3);
    }

    #[tokio::test]
    async fn decrement_past_zero_is_rejected() {
        let (ledger, id) = seeded_ledger(1).await;
        let result = ledger.decrement(&id, 2).await;
        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));

        // Stock unchanged after the failed reservation.
        let product = ledger.decrement(&id, 1).await.unwrap();
        assert_eq!(product.stock, 0);
    }

    #[tokio::test]
    async fn restore_returns_units() {
        let (ledger, id) = seeded_ledger(5).await;
        ledger.decrement(&id, 4).await.unwrap();
        let product = ledger.restore(&id, 4).await.unwrap();
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (ledger, _) = seeded_ledger(5).await;
        let result = ledger.decrement(&ProductId::new("product-x"), 1).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn concurrent_decrements_never_oversell() {
        let (ledger, id) = seeded_ledger(3).await;

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let ledger = ledger.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move { ledger.decrement(&id, 1).await }));
        }

        let mut ok = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DomainError::InsufficientStock { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 3);
        assert_eq!(rejected, 1);

        let result = ledger.decrement(&id, 1).await;
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
    }
}
