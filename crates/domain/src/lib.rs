//! Domain services for the retail backend.
//!
//! Each service is generic over the storage traits it needs, so the same
//! code runs against the in-memory store in tests and PostgreSQL in
//! production.

pub mod cart;
pub mod error;
pub mod inventory;
pub mod order;
pub mod user;

pub use cart::CartService;
pub use error::{DomainError, Result};
pub use inventory::InventoryLedger;
pub use order::{OrderService, OrderUpdate};
pub use user::UserDirectory;
