//! Checkout orchestration.
//!
//! Coordinates the cart, inventory, and order stores so that a checkout
//! either fully succeeds or leaves no trace.

pub mod orchestrator;

pub use orchestrator::{CheckoutOrchestrator, CheckoutRequest};
