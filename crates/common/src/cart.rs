//! Carts and cart line aggregation.

use serde::{Deserialize, Serialize};

use crate::ids::{CartId, CartItemId, ProductId, UserId};
use crate::money::Money;

/// A single line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    /// Always ≥ 1; a removal deletes the line instead of zeroing it.
    pub quantity: u32,
    pub unit_price: Money,
    /// Invariant: `subtotal == unit_price × quantity`.
    pub subtotal: Money,
}

impl CartItem {
    fn new(id: CartItemId, cart_id: CartId, product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            id,
            cart_id,
            product_id,
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        }
    }
}

/// A user's mutable, in-progress collection of intended purchases.
///
/// Mutations must go through the methods below, which keep the running
/// invariant `total == Σ item.subtotal` after every change. A cart is
/// created lazily per user and cleared, never deleted, after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub total: Money,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(id: CartId, user_id: UserId) -> Self {
        Self {
            id,
            user_id,
            items: Vec::new(),
            total: Money::zero(),
        }
    }

    /// Returns the line holding the given product, if any.
    pub fn line_for_product(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    /// Returns a line by its item id.
    pub fn item(&self, item_id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.id == item_id)
    }

    /// Merges a quantity of a product into the cart at the given unit price.
    ///
    /// If a line for the product already exists, the quantity is added to it
    /// (saturating, never wrapping past `u32::MAX`) and both unit price and
    /// subtotal are refreshed from `unit_price` (the product's current
    /// price). Otherwise a new line is appended under `item_id`. The cart
    /// total is recomputed either way.
    pub fn add_line(
        &mut self,
        item_id: CartItemId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) {
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(quantity);
                line.unit_price = unit_price;
                line.subtotal = unit_price.multiply(line.quantity);
            }
            None => {
                let cart_id = self.id.clone();
                self.items
                    .push(CartItem::new(item_id, cart_id, product_id, quantity, unit_price));
            }
        }
        self.recompute_total();
    }

    /// Sets the quantity of an existing line, recomputing its subtotal from
    /// the *stored* unit price (no fresh price lookup).
    ///
    /// Returns false if no such line exists.
    pub fn set_line_quantity(&mut self, item_id: &CartItemId, quantity: u32) -> bool {
        let Some(line) = self.items.iter_mut().find(|i| &i.id == item_id) else {
            return false;
        };
        line.quantity = quantity;
        line.subtotal = line.unit_price.multiply(quantity);
        self.recompute_total();
        true
    }

    /// Removes a line, returning it if present.
    pub fn remove_line(&mut self, item_id: &CartItemId) -> Option<CartItem> {
        let pos = self.items.iter().position(|i| &i.id == item_id)?;
        let removed = self.items.remove(pos);
        self.recompute_total();
        Some(removed)
    }

    /// Removes every line and resets the total to zero. Idempotent.
    pub fn clear(&mut self) {
        self.items.clear();
        self.total = Money::zero();
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of lines.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    fn recompute_total(&mut self) {
        self.total = self.items.iter().map(|i| i.subtotal).sum();
    }
}
