//! Typed entity identifiers and the id-minting capability.
//!
//! Every entity id is an opaque string of the form `"{prefix}-{suffix}"`,
//! assigned once at creation and never reassigned. Minting goes through the
//! [`IdGenerator`] capability so stores and services never invent ids on
//! their own.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability for minting unique, type-prefixed entity ids.
///
/// Injected into every service that creates entities, so tests can swap in
/// a deterministic generator.
pub trait IdGenerator: Send + Sync {
    /// Mints a unique opaque id string starting with `prefix` and a dash.
    fn mint(&self, prefix: &'static str) -> String;
}

/// Default generator backed by random UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn mint(&self, prefix: &'static str) -> String {
        format!("{prefix}-{}", Uuid::new_v4().simple())
    }
}

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Type prefix carried by every id of this kind.
            pub const PREFIX: &'static str = $prefix;

            /// Wraps an existing id string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mints a fresh id through the given generator.
            pub fn mint(ids: &dyn IdGenerator) -> Self {
                Self(ids.mint(Self::PREFIX))
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_id!(
    /// Identifier for a registered user.
    UserId,
    "user"
);
entity_id!(
    /// Identifier for a catalog product.
    ProductId,
    "product"
);
entity_id!(
    /// Identifier for a user's cart.
    CartId,
    "cart"
);
entity_id!(
    /// Identifier for a single cart line.
    CartItemId,
    "cart-item"
);
entity_id!(
    /// Identifier for an order.
    OrderId,
    "order"
);
entity_id!(
    /// Identifier for an order line snapshot.
    OrderItemId,
    "order-item"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_applies_type_prefix() {
        let ids = RandomIds;
        let id = CartItemId::mint(&ids);
        assert!(id.as_str().starts_with("cart-item-"));

        let id = OrderId::mint(&ids);
        assert!(id.as_str().starts_with("order-"));
    }

    #[test]
    fn mint_creates_unique_ids() {
        let ids = RandomIds;
        let a = ProductId::mint(&ids);
        let b = ProductId::mint(&ids);
        assert_ne!(a, b);
    }

    #[test]
    fn id_string_conversions() {
        let id = UserId::new("user-abc");
        assert_eq!(id.as_str(), "user-abc");

        let id2: UserId = "user-def".into();
        assert_eq!(id2.to_string(), "user-def");
    }

    #[test]
    fn serialization_is_transparent() {
        let id = OrderItemId::new("order-item-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"order-item-42\"");
        let back: OrderItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
