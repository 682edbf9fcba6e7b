use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{
    Cart, CartId, CartItemId, Order, OrderId, OrderStatus, Product, ProductId, User, UserId,
};

use crate::{
    Result, StoreError,
    traits::{CartStore, OrderStore, ProductStore, UserStore},
};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    products: HashMap<ProductId, Product>,
    carts: HashMap<CartId, Cart>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory store implementation.
///
/// Holds every aggregate behind a single `RwLock` and provides the same
/// interface and conflict behavior as the PostgreSQL implementation,
/// including the version check on product persists.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate {
                entity: "user",
                field: "email",
            });
        }
        inner.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        self.inner
            .write()
            .await
            .products
            .insert(product.id.clone(), product.clone());
        Ok(product)
    }

    async fn lookup_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.get(id).cloned())
    }

    async fn persist_product(&self, mut product: Product) -> Result<Product> {
        let mut inner = self.inner.write().await;
        let current = inner
            .products
            .get(&product.id)
            .ok_or_else(|| StoreError::RowNotFound {
                entity: "product",
                id: product.id.to_string(),
            })?;

        if current.version != product.version {
            return Err(StoreError::VersionConflict {
                product_id: product.id.clone(),
                expected: product.version,
                actual: current.version,
            });
        }

        product.version += 1;
        inner.products.insert(product.id.clone(), product.clone());
        Ok(product)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn find_cart_by_user(&self, user_id: &UserId) -> Result<Option<Cart>> {
        Ok(self
            .inner
            .read()
            .await
            .carts
            .values()
            .find(|c| &c.user_id == user_id)
            .cloned())
    }

    async fn find_cart_by_item(&self, item_id: &CartItemId) -> Result<Option<Cart>> {
        Ok(self
            .inner
            .read()
            .await
            .carts
            .values()
            .find(|c| c.items.iter().any(|i| &i.id == item_id))
            .cloned())
    }

    async fn upsert_cart(&self, cart: Cart) -> Result<Cart> {
        self.inner
            .write()
            .await
            .carts
            .insert(cart.id.clone(), cart.clone());
        Ok(cart)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<Order> {
        self.inner
            .write()
            .await
            .orders
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<_> = inner.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.as_str().cmp(b.id.as_str())));
        Ok(orders)
    }

    async fn list_orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let mut orders = self.list_orders().await?;
        orders.retain(|o| &o.user_id == user_id);
        Ok(orders)
    }

    async fn update_order(&self, order: Order) -> Result<Order> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.orders.get_mut(&order.id) else {
            return Err(StoreError::RowNotFound {
                entity: "order",
                id: order.id.to_string(),
            });
        };
        // Status and items stay as stored; see the trait contract.
        stored.shipping_address = order.shipping_address;
        stored.notes = order.notes;
        stored.updated_at = order.updated_at;
        Ok(stored.clone())
    }

    async fn transition_order(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.orders.get_mut(id) else {
            return Err(StoreError::RowNotFound {
                entity: "order",
                id: id.to_string(),
            });
        };
        if stored.status != from {
            return Ok(None);
        }
        stored.status = to;
        stored.updated_at = chrono::Utc::now();
        Ok(Some(stored.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{IdGenerator, Money, RandomIds};

    fn product(id: &str, stock: u32) -> Product {
        Product::new(ProductId::new(id), "Widget", Money::from_cents(1000), stock)
    }

    #[tokio::test]
    async fn insert_and_get_user() {
        let store = InMemoryStore::new();
        let user = User::new(UserId::new("user-1"), "Alice", "alice@example.com");
        store.insert_user(user.clone()).await.unwrap();

        let found = store.get_user(&UserId::new("user-1")).await.unwrap();
        assert_eq!(found, Some(user));

        let by_email = store
            .find_user_by_email("alice@example.com")
            .await
            .unwrap();
        assert!(by_email.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let store = InMemoryStore::new();
        store
            .insert_user(User::new(UserId::new("user-1"), "Alice", "a@example.com"))
            .await
            .unwrap();

        let result = store
            .insert_user(User::new(UserId::new("user-2"), "Alex", "a@example.com"))
            .await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn persist_product_bumps_version() {
        let store = InMemoryStore::new();
        store.insert_product(product("product-1", 5)).await.unwrap();

        let mut p = store
            .lookup_product(&ProductId::new("product-1"))
            .await
            .unwrap()
            .unwrap();
        p.stock = 3;
        let updated = store.persist_product(p).await.unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.stock, 3);
    }

    #[tokio::test]
    async fn persist_product_stale_version_conflicts() {
        let store = InMemoryStore::new();
        store.insert_product(product("product-1", 5)).await.unwrap();

        let stale = store
            .lookup_product(&ProductId::new("product-1"))
            .await
            .unwrap()
            .unwrap();

        // A concurrent writer lands first.
        let mut fresh = stale.clone();
        fresh.stock = 4;
        store.persist_product(fresh).await.unwrap();

        let mut late = stale;
        late.stock = 2;
        let result = store.persist_product(late).await;
        assert!(matches!(
            result,
            Err(StoreError::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn persist_unknown_product_is_row_not_found() {
        let store = InMemoryStore::new();
        let result = store.persist_product(product("product-x", 1)).await;
        assert!(matches!(result, Err(StoreError::RowNotFound { .. })));
    }

    #[tokio::test]
    async fn cart_found_by_user_and_by_item() {
        let store = InMemoryStore::new();
        let ids = RandomIds;
        let mut cart = Cart::new(CartId::mint(&ids), UserId::new("user-1"));
        let item_id = CartItemId::mint(&ids);
        cart.add_line(item_id.clone(), ProductId::new("product-1"), 2, Money::from_cents(1000));
        store.upsert_cart(cart.clone()).await.unwrap();

        let by_user = store
            .find_cart_by_user(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(by_user.as_ref().map(|c| &c.id), Some(&cart.id));

        let by_item = store.find_cart_by_item(&item_id).await.unwrap();
        assert_eq!(by_item.map(|c| c.id), Some(cart.id));

        let missing = store
            .find_cart_by_item(&CartItemId::new("cart-item-x"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn orders_listed_newest_first() {
        let store = InMemoryStore::new();
        let ids = RandomIds;
        for n in 0..3 {
            let mut order = Order::new(
                OrderId::mint(&ids),
                UserId::new("user-1"),
                vec![],
                Money::from_cents(100 * n),
                None,
                None,
            );
            order.created_at = chrono::Utc::now() + chrono::Duration::seconds(n);
            store.insert_order(order).await.unwrap();
        }

        let orders = store.list_orders().await.unwrap();
        assert_eq!(orders.len(), 3);
        assert!(orders[0].created_at >= orders[1].created_at);
        assert!(orders[1].created_at >= orders[2].created_at);
    }

    #[tokio::test]
    async fn transition_is_conditional_on_current_status() {
        let store = InMemoryStore::new();
        let order = Order::new(
            OrderId::new("order-1"),
            UserId::new("user-1"),
            vec![],
            Money::zero(),
            None,
            None,
        );
        store.insert_order(order).await.unwrap();

        let won = store
            .transition_order(
                &OrderId::new("order-1"),
                OrderStatus::Pending,
                OrderStatus::Cancelled,
            )
            .await
            .unwrap();
        assert_eq!(won.unwrap().status, OrderStatus::Cancelled);

        // The second writer's expected status is stale.
        let lost = store
            .transition_order(
                &OrderId::new("order-1"),
                OrderStatus::Pending,
                OrderStatus::Cancelled,
            )
            .await
            .unwrap();
        assert!(lost.is_none());

        let missing = store
            .transition_order(
                &OrderId::new("order-x"),
                OrderStatus::Pending,
                OrderStatus::Cancelled,
            )
            .await;
        assert!(matches!(missing, Err(StoreError::RowNotFound { .. })));
    }

    #[tokio::test]
    async fn update_order_never_writes_status() {
        let store = InMemoryStore::new();
        let order = Order::new(
            OrderId::new("order-1"),
            UserId::new("user-1"),
            vec![],
            Money::zero(),
            None,
            None,
        );
        store.insert_order(order.clone()).await.unwrap();
        store
            .transition_order(
                &OrderId::new("order-1"),
                OrderStatus::Pending,
                OrderStatus::Confirmed,
            )
            .await
            .unwrap();

        // A field update carrying a stale status must not roll it back.
        let mut stale = order;
        stale.notes = Some("leave at door".to_string());
        let updated = store.update_order(stale).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(updated.notes.as_deref(), Some("leave at door"));
    }

    #[tokio::test]
    async fn update_missing_order_is_row_not_found() {
        let store = InMemoryStore::new();
        let order = Order::new(
            OrderId::new("order-x"),
            UserId::new("user-1"),
            vec![],
            Money::zero(),
            None,
            None,
        );
        let result = store.update_order(order).await;
        assert!(matches!(result, Err(StoreError::RowNotFound { .. })));
    }

    #[tokio::test]
    async fn minted_ids_carry_prefixes() {
        // The store never mints ids itself; generators do.
        let ids = RandomIds;
        assert!(ids.mint(CartId::PREFIX).starts_with("cart-"));
    }
}
