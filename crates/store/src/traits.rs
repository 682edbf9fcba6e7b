use async_trait::async_trait;

use common::{Cart, CartItemId, Order, OrderId, OrderStatus, Product, ProductId, User, UserId};

use crate::Result;

/// Storage boundary for user records.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user.
    ///
    /// Fails with `Duplicate` if the email is already registered.
    async fn insert_user(&self, user: User) -> Result<User>;

    /// Looks up a user by id.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Looks up a user by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Storage boundary for catalog products.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Inserts a new product at version 0.
    async fn insert_product(&self, product: Product) -> Result<Product>;

    /// Looks up a product by id.
    async fn lookup_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Persists a product read at `product.version`.
    ///
    /// This is the optimistic write used to serialize stock mutations: if
    /// the stored row is no longer at that version the write fails with
    /// `VersionConflict` and the caller must re-read and retry. On success
    /// the stored version is bumped and the updated product returned.
    async fn persist_product(&self, product: Product) -> Result<Product>;
}

/// Storage boundary for carts and their lines.
///
/// A cart is stored and replaced as a whole aggregate (lines included); the
/// line-total invariant is maintained by the model, not the store.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Finds a user's cart. At most one exists per user.
    async fn find_cart_by_user(&self, user_id: &UserId) -> Result<Option<Cart>>;

    /// Finds the cart owning the given line.
    async fn find_cart_by_item(&self, item_id: &CartItemId) -> Result<Option<Cart>>;

    /// Inserts or fully replaces a cart aggregate.
    async fn upsert_cart(&self, cart: Cart) -> Result<Cart>;
}

/// Storage boundary for orders and their line snapshots.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order with its items.
    async fn insert_order(&self, order: Order) -> Result<Order>;

    /// Looks up an order by id, items included.
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Lists all orders, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>>;

    /// Updates an order's shipping address and notes.
    ///
    /// Status is deliberately not written here: every status change goes
    /// through [`OrderStore::transition_order`], so a plain field update can
    /// never clobber a concurrent transition. Fails with `RowNotFound` if
    /// the order does not exist. Item snapshots are immutable and never
    /// rewritten.
    async fn update_order(&self, order: Order) -> Result<Order>;

    /// Atomically moves an order's status from `from` to `to`.
    ///
    /// The write lands only while the stored status still equals `from`;
    /// losing a race against a concurrent transition returns `Ok(None)` and
    /// the caller must re-read. On success `updated_at` is stamped and the
    /// full order returned. Fails with `RowNotFound` if the order does not
    /// exist.
    async fn transition_order(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>>;
}

/// Convenience bound for code that needs the full storage suite.
pub trait Stores: UserStore + ProductStore + CartStore + OrderStore + Clone + 'static {}

impl<T> Stores for T where T: UserStore + ProductStore + CartStore + OrderStore + Clone + 'static {}
