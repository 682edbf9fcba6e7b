//! Catalog products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ProductId;
use crate::money::Money;

/// A sellable product.
///
/// `stock` is the non-negative count of sellable units and is only ever
/// written through the inventory ledger. `version` is the optimistic
/// concurrency token: every persisted write must name the version it read,
/// and the store rejects the write if the row has moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
    pub image_url: Option<String>,
    /// Optimistic concurrency version, bumped by the store on each persist.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product at version 0 with the current timestamp.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            price,
            stock,
            image_url: None,
            version: 0,
            created_at: Utc::now(),
        }
    }
}
