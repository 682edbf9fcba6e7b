//! Aggregate store boundary for the retail backend.
//!
//! Defines one trait per aggregate (users, products, carts, orders) and two
//! implementations: [`InMemoryStore`] for tests and default runtime, and
//! [`PostgresStore`] backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use traits::{CartStore, OrderStore, ProductStore, Stores, UserStore};
