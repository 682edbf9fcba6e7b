use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with an aggregate store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An optimistic write lost the race: the row's version moved on between
    /// the read and the write.
    #[error("Version conflict for product {product_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        product_id: ProductId,
        expected: i64,
        actual: i64,
    },

    /// A write targeted a row that does not exist.
    #[error("{entity} not found: {id}")]
    RowNotFound { entity: &'static str, id: String },

    /// A unique constraint was violated.
    #[error("Duplicate {entity} {field}")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
    },

    /// A stored value could not be mapped back into the model.
    #[error("Invalid stored value: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
