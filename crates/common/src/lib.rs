//! Shared model types for the retail backend.
//!
//! This crate holds everything the storage and service layers agree on:
//! - typed entity identifiers and the [`IdGenerator`] capability
//! - [`Money`], an exact 2-decimal currency amount
//! - the entity structs (`User`, `Product`, `Cart`, `Order`, ...)
//! - the [`OrderStatus`] state machine

pub mod cart;
pub mod ids;
pub mod money;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem};
pub use ids::{CartId, CartItemId, IdGenerator, OrderId, OrderItemId, ProductId, RandomIds, UserId};
pub use money::Money;
pub use order::{Order, OrderItem, OrderStatus};
pub use product::Product;
pub use user::User;
