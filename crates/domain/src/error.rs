use common::OrderStatus;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the domain services.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(
        "insufficient stock for {name}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("cart is empty")]
    EmptyCart,

    #[error("cannot {action} an order in {status} status")]
    InvalidState { status: OrderStatus, action: String },

    #[error("{0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Shorthand for a not-found error on a typed entity id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
