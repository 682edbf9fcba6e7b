//! Order lifecycle: lookup, listing, status transitions, cancellation.

use chrono::Utc;
use common::{Order, OrderId, OrderStatus, UserId};
use metrics::counter;
use store::{OrderStore, ProductStore, UserStore};
use tracing::info;

use crate::error::{DomainError, Result};
use crate::inventory::InventoryLedger;

/// Mutable order fields accepted by [`OrderService::update`].
#[derive(Debug, Default, Clone)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Serves orders after checkout has created them.
///
/// Status changes are validated against the fulfillment state machine;
/// cancellation additionally returns every line's units to stock and keeps
/// the order on record in `cancelled` status.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    ledger: InventoryLedger<S>,
}

impl<S> OrderService<S>
where
    S: UserStore + ProductStore + OrderStore + Clone,
{
    pub fn new(store: S) -> Self {
        let ledger = InventoryLedger::new(store.clone());
        Self { store, ledger }
    }

    /// Returns the order with the given id, items included.
    pub async fn get(&self, id: &OrderId) -> Result<Order> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id))
    }

    /// Lists all orders, newest first.
    pub async fn list(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_orders().await?)
    }

    /// Lists a user's orders, newest first.
    ///
    /// Fails with `NotFound` if the user does not exist.
    pub async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(DomainError::not_found("user", user_id));
        }
        Ok(self.store.list_orders_by_user(user_id).await?)
    }

    /// Applies a partial update to an order.
    ///
    /// A status change must follow the state machine and is written with a
    /// conditional transition, so it cannot clobber a concurrent one; a
    /// change to `cancelled` goes through [`Self::cancel`] so stock is
    /// restored.
    #[tracing::instrument(skip(self, update), fields(order_id = %id))]
    pub async fn update(&self, id: &OrderId, update: OrderUpdate) -> Result<Order> {
        let mut order = self.get(id).await?;

        if let Some(next) = update.status
            && next != order.status
        {
            if !order.status.can_transition_to(next) {
                return Err(DomainError::InvalidState {
                    status: order.status,
                    action: format!("move to {next}"),
                });
            }
            order = if next == OrderStatus::Cancelled {
                self.cancel(id).await?
            } else {
                self.transition(id, order.status, next).await?
            };
        }

        if update.shipping_address.is_none() && update.notes.is_none() {
            return Ok(order);
        }

        if let Some(address) = update.shipping_address {
            order.shipping_address = Some(address);
        }
        if let Some(notes) = update.notes {
            order.notes = Some(notes);
        }
        order.updated_at = Utc::now();

        Ok(self.store.update_order(order).await?)
    }

    /// Cancels a pending order, restoring stock for every line.
    ///
    /// The order is retained in `cancelled` status for auditability, never
    /// deleted. Fails with `InvalidState` once fulfillment has started or
    /// when another cancellation got there first; stock is only restored
    /// after this call wins the status write, so a lost race restores
    /// nothing.
    #[tracing::instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel(&self, id: &OrderId) -> Result<Order> {
        let order = self.get(id).await?;
        if !order.status.can_cancel() {
            return Err(DomainError::InvalidState {
                status: order.status,
                action: "cancel".to_string(),
            });
        }

        let order = self
            .transition(id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await?;

        for item in &order.items {
            self.ledger.restore(&item.product_id, item.quantity).await?;
        }

        counter!("orders_cancelled_total").increment(1);
        info!(total = %order.total, "cancelled order");
        Ok(order)
    }

    /// Runs one conditional status write, re-reading on a lost race so the
    /// error names the status that actually won.
    async fn transition(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order> {
        match self.store.transition_order(id, from, to).await? {
            Some(order) => Ok(order),
            None => {
                let current = self.get(id).await?;
                Err(DomainError::InvalidState {
                    status: current.status,
                    action: format!("move to {to}"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderItem, OrderItemId, Product, ProductId, User};
    use store::InMemoryStore;

    async fn seeded() -> (OrderService<InMemoryStore>, InMemoryStore, OrderId) {
        let store = InMemoryStore::new();
        store
            .insert_user(User::new(UserId::new("user-1"), "Alice", "alice@example.com"))
            .await
            .unwrap();
        store
            .insert_product(Product::new(
                ProductId::new("product-1"),
                "Widget",
                Money::from_cents(10_000),
                3,
            ))
            .await
            .unwrap();

        let order_id = OrderId::new("order-1");
        let order = Order::new(
            order_id.clone(),
            UserId::new("user-1"),
            vec![OrderItem {
                id: OrderItemId::new("order-item-1"),
                order_id: order_id.clone(),
                product_id: ProductId::new("product-1"),
                product_name: "Widget".to_string(),
                quantity: 2,
                unit_price: Money::from_cents(10_000),
                subtotal: Money::from_cents(20_000),
            }],
            Money::from_cents(20_000),
            None,
            None,
        );
        store.insert_order(order).await.unwrap();

        (OrderService::new(store.clone()), store, order_id)
    }

    #[tokio::test]
    async fn get_unknown_order_is_not_found() {
        let (service, _, _) = seeded().await;
        let result = service.get(&OrderId::new("order-x")).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_by_unknown_user_is_not_found() {
        let (service, _, _) = seeded().await;
        let result = service.list_by_user(&UserId::new("user-x")).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn update_walks_the_state_machine() {
        let (service, _, order_id) = seeded().await;

        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let order = service
                .update(
                    &order_id,
                    OrderUpdate {
                        status: Some(next),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(order.status, next);
        }
    }

    #[tokio::test]
    async fn update_rejects_skipped_states() {
        let (service, _, order_id) = seeded().await;

        let result = service
            .update(
                &order_id,
                OrderUpdate {
                    status: Some(OrderStatus::Delivered),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::InvalidState { .. })));

        // The failed transition leaves the order untouched.
        let order = service.get(&order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn update_same_status_is_noop_transition() {
        let (service, _, order_id) = seeded().await;
        let order = service
            .update(
                &order_id,
                OrderUpdate {
                    status: Some(OrderStatus::Pending),
                    notes: Some("gift wrap".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.notes.as_deref(), Some("gift wrap"));
    }

    #[tokio::test]
    async fn update_address_and_notes_without_status() {
        let (service, _, order_id) = seeded().await;
        let order = service
            .update(
                &order_id,
                OrderUpdate {
                    shipping_address: Some("1 Main St".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(order.shipping_address.as_deref(), Some("1 Main St"));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_restores_stock_and_retains_order() {
        let (service, store, order_id) = seeded().await;

        let order = service.cancel(&order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let product = store
            .lookup_product(&ProductId::new("product-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 5);

        // The record survives cancellation.
        let retained = service.get(&order_id).await.unwrap();
        assert_eq!(retained.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_twice_restores_stock_once() {
        let (service, store, order_id) = seeded().await;

        service.cancel(&order_id).await.unwrap();
        let result = service.cancel(&order_id).await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidState {
                status: OrderStatus::Cancelled,
                ..
            })
        ));

        // Only the first cancel returned the order's units.
        let product = store
            .lookup_product(&ProductId::new("product-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn concurrent_cancels_restore_stock_once() {
        let (service, store, order_id) = seeded().await;

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let service = service.clone();
            let order_id = order_id.clone();
            tasks.push(tokio::spawn(async move { service.cancel(&order_id).await }));
        }

        let mut ok = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(order) => {
                    assert_eq!(order.status, OrderStatus::Cancelled);
                    ok += 1;
                }
                Err(DomainError::InvalidState { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(rejected, 1);

        let product = store
            .lookup_product(&ProductId::new("product-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn confirm_after_cancel_is_rejected() {
        let (service, _, order_id) = seeded().await;
        service.cancel(&order_id).await.unwrap();

        let result = service
            .update(
                &order_id,
                OrderUpdate {
                    status: Some(OrderStatus::Confirmed),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidState {
                status: OrderStatus::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn cancel_after_confirmation_is_rejected() {
        let (service, store, order_id) = seeded().await;
        service
            .update(
                &order_id,
                OrderUpdate {
                    status: Some(OrderStatus::Confirmed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = service.cancel(&order_id).await;
        assert!(matches!(result, Err(DomainError::InvalidState { .. })));

        // No stock came back from the failed cancel.
        let product = store
            .lookup_product(&ProductId::new("product-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 3);
    }

    #[tokio::test]
    async fn cancel_via_update_also_restores_stock() {
        let (service, store, order_id) = seeded().await;

        let order = service
            .update(
                &order_id,
                OrderUpdate {
                    status: Some(OrderStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let product = store
            .lookup_product(&ProductId::new("product-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 5);
    }
}
