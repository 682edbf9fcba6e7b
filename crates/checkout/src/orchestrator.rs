//! The checkout flow from cart to order.

use std::sync::Arc;
use std::time::Instant;

use common::{IdGenerator, Order, OrderId, OrderItem, OrderItemId, ProductId, UserId};
use domain::{CartService, DomainError, InventoryLedger, Result, UserDirectory};
use metrics::{counter, histogram};
use store::{OrderStore, Stores};
use tracing::{error, info, warn};

/// Optional fields a checkout request may carry onto the order.
#[derive(Debug, Default, Clone)]
pub struct CheckoutRequest {
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Turns a user's cart into a pending order.
///
/// Stock is reserved line by line through the inventory ledger before the
/// order is written. If any reservation or the order write fails, every
/// reservation already applied is returned to stock and no order exists;
/// checkout either fully succeeds or leaves the system as it found it.
#[derive(Clone)]
pub struct CheckoutOrchestrator<S> {
    store: S,
    users: UserDirectory<S>,
    carts: CartService<S>,
    ledger: InventoryLedger<S>,
    ids: Arc<dyn IdGenerator>,
}

impl<S: Stores> CheckoutOrchestrator<S> {
    pub fn new(store: S, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            users: UserDirectory::new(store.clone(), ids.clone()),
            carts: CartService::new(store.clone(), ids.clone()),
            ledger: InventoryLedger::new(store.clone()),
            store,
            ids,
        }
    }

    /// Runs the full checkout for a user's cart.
    ///
    /// On success the cart is emptied and the pending order returned. An
    /// empty cart is rejected with `EmptyCart` before any stock is touched.
    #[tracing::instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn checkout(&self, user_id: &UserId, request: CheckoutRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.run(user_id, request).await;

        match &result {
            Ok(order) => {
                counter!("checkouts_total").increment(1);
                histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
                info!(order_id = %order.id, total = %order.total, "checkout complete");
            }
            Err(e) => {
                counter!("checkouts_failed_total").increment(1);
                warn!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn run(&self, user_id: &UserId, request: CheckoutRequest) -> Result<Order> {
        let user = self.users.resolve(user_id).await?;
        let cart = self.carts.get_or_create(user_id).await?;
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        // Reserve stock per line, remembering what to hand back on failure.
        let mut applied: Vec<(ProductId, u32)> = Vec::with_capacity(cart.line_count());
        let mut items = Vec::with_capacity(cart.line_count());
        let order_id = OrderId::mint(self.ids.as_ref());

        for line in &cart.items {
            let product = match self.ledger.decrement(&line.product_id, line.quantity).await {
                Ok(product) => product,
                Err(e) => {
                    self.unwind(&applied).await;
                    return Err(e);
                }
            };
            applied.push((line.product_id.clone(), line.quantity));

            items.push(OrderItem {
                id: OrderItemId::mint(self.ids.as_ref()),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                product_name: product.name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
            });
        }

        let order = Order::new(
            order_id,
            user.id,
            items,
            cart.total,
            request.shipping_address,
            request.notes,
        );
        let order = match self.store.insert_order(order).await {
            Ok(order) => order,
            Err(e) => {
                self.unwind(&applied).await;
                return Err(e.into());
            }
        };

        // The order exists from here on; a failed cart clear must not be
        // reported as a failed checkout or a retry would double-order.
        if let Err(e) = self.carts.clear(user_id).await {
            warn!(order_id = %order.id, error = %e, "cart clear after checkout failed");
        }

        Ok(order)
    }

    /// Returns already-reserved units to stock after a mid-flight failure.
    async fn unwind(&self, applied: &[(ProductId, u32)]) {
        for (product_id, quantity) in applied {
            if let Err(e) = self.ledger.restore(product_id, *quantity).await {
                error!(%product_id, quantity, error = %e, "failed to unwind stock reservation");
            }
        }
    }
}
