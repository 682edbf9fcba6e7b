//! Cart retrieval and mutation.

use std::sync::Arc;

use common::{Cart, CartId, CartItemId, IdGenerator, Product, ProductId, UserId};
use store::{CartStore, ProductStore, UserStore};
use tracing::info;

use crate::error::{DomainError, Result};

/// Serves and mutates per-user carts.
///
/// Carts are created lazily on first access and persisted as whole
/// aggregates; the line-total invariant lives in the model. Stock is checked
/// here only as a courtesy preflight against the quantity being put in the
/// cart; the authoritative check happens at checkout.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    ids: Arc<dyn IdGenerator>,
}

impl<S> CartService<S>
where
    S: UserStore + ProductStore + CartStore,
{
    pub fn new(store: S, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Returns the user's cart, creating an empty one on first access.
    ///
    /// Fails with `NotFound` if the user does not exist.
    pub async fn get_or_create(&self, user_id: &UserId) -> Result<Cart> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(DomainError::not_found("user", user_id));
        }

        if let Some(cart) = self.store.find_cart_by_user(user_id).await? {
            return Ok(cart);
        }

        let cart = Cart::new(CartId::mint(self.ids.as_ref()), user_id.clone());
        Ok(self.store.upsert_cart(cart).await?)
    }

    /// Adds a quantity of a product to the user's cart.
    ///
    /// An existing line for the product is merged and repriced at the
    /// product's current price; otherwise a new line is appended. The stock
    /// preflight counts what the line already holds, so a merge can never
    /// cart more units than the product has (a stricter check than testing
    /// the increment alone).
    #[tracing::instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let product = self.load_product(product_id).await?;
        let mut cart = self.get_or_create(user_id).await?;

        // A merged quantity past u32::MAX can never be covered by stock;
        // saturating keeps the comparison meaningful instead of wrapping.
        let in_cart = cart
            .line_for_product(product_id)
            .map_or(0, |line| line.quantity);
        let requested = quantity.saturating_add(in_cart);
        self.check_stock(&product, requested)?;

        cart.add_line(
            CartItemId::mint(self.ids.as_ref()),
            product_id.clone(),
            quantity,
            product.price,
        );
        let cart = self.store.upsert_cart(cart).await?;
        info!(cart_id = %cart.id, total = %cart.total, "added cart line");
        Ok(cart)
    }

    /// Sets the quantity of an existing cart line.
    ///
    /// The line keeps its stored unit price; only the subtotal and cart
    /// total are recomputed.
    #[tracing::instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_item(&self, item_id: &CartItemId, quantity: u32) -> Result<Cart> {
        let mut cart = self
            .store
            .find_cart_by_item(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart item", item_id))?;

        let product_id = cart
            .item(item_id)
            .map(|line| line.product_id.clone())
            .ok_or_else(|| DomainError::not_found("cart item", item_id))?;
        let product = self.load_product(&product_id).await?;
        self.check_stock(&product, quantity)?;

        cart.set_line_quantity(item_id, quantity);
        Ok(self.store.upsert_cart(cart).await?)
    }

    /// Removes a cart line.
    #[tracing::instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_item(&self, item_id: &CartItemId) -> Result<Cart> {
        let mut cart = self
            .store
            .find_cart_by_item(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart item", item_id))?;

        cart.remove_line(item_id);
        Ok(self.store.upsert_cart(cart).await?)
    }

    /// Empties the user's cart. Idempotent: clearing an empty cart succeeds.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: &UserId) -> Result<Cart> {
        let mut cart = self.get_or_create(user_id).await?;
        cart.clear();
        Ok(self.store.upsert_cart(cart).await?)
    }

    async fn load_product(&self, product_id: &ProductId) -> Result<Product> {
        self.store
            .lookup_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id))
    }

    fn check_stock(&self, product: &Product, requested: u32) -> Result<()> {
        if product.stock < requested {
            return Err(DomainError::InsufficientStock {
                name: product.name.clone(),
                requested,
                available: product.stock,
            });
        }
        Ok(())
    }
}
