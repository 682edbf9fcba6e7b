use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use common::{
    Cart, CartId, CartItem, CartItemId, Money, Order, OrderId, OrderItem, OrderItemId, OrderStatus,
    Product, ProductId, User, UserId,
};

use crate::{
    Result, StoreError,
    traits::{CartStore, OrderStore, ProductStore, UserStore},
};

/// PostgreSQL-backed aggregate store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the given database URL with a small pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_cart_items(&self, cart_id: &CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cart_id, product_id, quantity, unit_price_cents, subtotal_cents
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(cart_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_cart_item).collect()
    }

    async fn load_order(&self, row: PgRow) -> Result<Order> {
        let mut order = row_to_order(row)?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price_cents, subtotal_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order.id.as_str())
        .fetch_all(&self.pool)
        .await?;

        order.items = item_rows
            .into_iter()
            .map(row_to_order_item)
            .collect::<Result<_>>()?;
        Ok(order)
    }
}

fn to_quantity(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} out of range: {value}")))
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: UserId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_quantity(row.try_get("stock")?, "stock")?,
        image_url: row.try_get("image_url")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::new(row.try_get::<String, _>("id")?),
        cart_id: CartId::new(row.try_get::<String, _>("cart_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: to_quantity(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get::<String, _>("id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        items: Vec::new(),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: status.parse::<OrderStatus>().map_err(StoreError::Decode)?,
        shipping_address: row.try_get("shipping_address")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get::<String, _>("id")?),
        order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: to_quantity(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
    })
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("users_email_unique")
            {
                return StoreError::Duplicate {
                    entity: "user",
                    field: "email",
                };
            }
            StoreError::Database(e)
        })?;

        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, created_at FROM users WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, created_at FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock, image_url, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(&product.image_url)
        .bind(product.version)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    async fn lookup_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, image_url, version, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn persist_product(&self, mut product: Product) -> Result<Product> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price_cents = $4, stock = $5,
                image_url = $6, version = version + 1
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(&product.image_url)
        .bind(product.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a lost optimistic race.
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM products WHERE id = $1")
                    .bind(product.id.as_str())
                    .fetch_optional(&self.pool)
                    .await?;

            return match actual {
                Some(actual) => Err(StoreError::VersionConflict {
                    product_id: product.id,
                    expected: product.version,
                    actual,
                }),
                None => Err(StoreError::RowNotFound {
                    entity: "product",
                    id: product.id.to_string(),
                }),
            };
        }

        product.version += 1;
        Ok(product)
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn find_cart_by_user(&self, user_id: &UserId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT id, user_id, total_cents FROM carts WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id = CartId::new(row.try_get::<String, _>("id")?);
        let items = self.load_cart_items(&id).await?;
        Ok(Some(Cart {
            id,
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            items,
            total: Money::from_cents(row.try_get("total_cents")?),
        }))
    }

    async fn find_cart_by_item(&self, item_id: &CartItemId) -> Result<Option<Cart>> {
        let cart_id: Option<String> =
            sqlx::query_scalar("SELECT cart_id FROM cart_items WHERE id = $1")
                .bind(item_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        let Some(cart_id) = cart_id else {
            return Ok(None);
        };

        let row = sqlx::query("SELECT id, user_id, total_cents FROM carts WHERE id = $1")
            .bind(&cart_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id = CartId::new(cart_id);
        let items = self.load_cart_items(&id).await?;
        Ok(Some(Cart {
            id,
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            items,
            total: Money::from_cents(row.try_get("total_cents")?),
        }))
    }

    async fn upsert_cart(&self, cart: Cart) -> Result<Cart> {
        // The aggregate is replaced as a whole: cart row upserted, lines
        // rewritten, all inside one transaction.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, total_cents)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET total_cents = EXCLUDED.total_cents
            "#,
        )
        .bind(cart.id.as_str())
        .bind(cart.user_id.as_str())
        .bind(cart.total.cents())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart.id.as_str())
            .execute(&mut *tx)
            .await?;

        for item in &cart.items {
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price_cents, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id.as_str())
            .bind(item.cart_id.as_str())
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .bind(item.subtotal.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(cart)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: Order) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, status, shipping_address, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.user_id.as_str())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(&order.shipping_address)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price_cents, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_str())
            .bind(item.order_id.as_str())
            .bind(item.product_id.as_str())
            .bind(&item.product_name)
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .bind(item.subtotal.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, shipping_address, notes, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, shipping_address, notes, created_at, updated_at
            FROM orders
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.load_order(row).await?);
        }
        Ok(orders)
    }

    async fn list_orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, shipping_address, notes, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.load_order(row).await?);
        }
        Ok(orders)
    }

    async fn update_order(&self, order: Order) -> Result<Order> {
        // Status stays whatever the row holds; see the trait contract.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET shipping_address = $2, notes = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_str())
        .bind(&order.shipping_address)
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound {
                entity: "order",
                id: order.id.to_string(),
            });
        }

        self.get_order(&order.id)
            .await?
            .ok_or_else(|| StoreError::RowNotFound {
                entity: "order",
                id: order.id.to_string(),
            })
    }

    async fn transition_order(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_str())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a lost race on the status.
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

            return match exists {
                Some(_) => Ok(None),
                None => Err(StoreError::RowNotFound {
                    entity: "order",
                    id: id.to_string(),
                }),
            };
        }

        self.get_order(id).await
    }
}
