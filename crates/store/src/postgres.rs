use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, OrderId, OrderItemId, PaymentId, ProductId, UserId, VariantId};
use domain::{
    Cart, CartItem, Money, Order, OrderItem, Payment, PaymentSession, Product, ProductVariant,
    StockPolicy, StockRef,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{StockChange, Store, Transaction},
};

const ORDER_COLUMNS: &str = "id, user_id, order_code, status, payment_status, is_paid, \
     total_amount_cents, total_weight_grams, payment_token, payment_url, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, order_id, transaction_id, transaction_status, status_code, \
     payment_type, fraud_status, amount_cents, currency, payload, created_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// A database transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn to_u32(value: i32, table: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::corrupt(table, format!("negative value {value}")))
}

/// `INTEGER` columns hold at most `i32::MAX`.
fn to_i32(value: u32, field: &'static str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::out_of_range(field, value))
}

fn to_u64(value: i64, table: &'static str) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::corrupt(table, format!("negative value {value}")))
}

fn parse_column<T: std::str::FromStr>(value: String, table: &'static str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| StoreError::corrupt(table, e))
}

/// Turns a unique violation on `constraint` into a [`StoreError::Conflict`].
fn unique_violation(e: sqlx::Error, constraint: &str, message: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.constraint() == Some(constraint)
    {
        return StoreError::Conflict(message());
    }
    StoreError::Database(e)
}

fn row_to_cart(row: PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        status: parse_column(row.try_get("status")?, "carts")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        cart_id: CartId::from_uuid(row.try_get("cart_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        variant_id: row
            .try_get::<Option<Uuid>, _>("product_variant_id")?
            .map(VariantId::from_uuid),
        quantity: to_u32(row.try_get("quantity")?, "cart_items")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        variant_id: row
            .try_get::<Option<Uuid>, _>("product_variant_id")?
            .map(VariantId::from_uuid),
        product_name: row.try_get("product_name")?,
        variant_label: row.try_get("variant_label")?,
        quantity: to_u32(row.try_get("quantity")?, "order_items")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        weight_grams: to_u32(row.try_get("weight_grams")?, "order_items")?,
        note: row.try_get("note")?,
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        down_payment: Money::from_cents(row.try_get("down_payment_cents")?),
        unit_down_payment: Money::from_cents(row.try_get("unit_down_payment_cents")?),
    })
}

fn row_to_order(row: PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let token: Option<String> = row.try_get("payment_token")?;
    let url: Option<String> = row.try_get("payment_url")?;
    let payment_session = match (token, url) {
        (Some(token), Some(redirect_url)) => Some(PaymentSession {
            token,
            redirect_url,
        }),
        _ => None,
    };

    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        code: row.try_get("order_code")?,
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        status: parse_column(row.try_get("status")?, "orders")?,
        payment_status: parse_column(row.try_get("payment_status")?, "orders")?,
        is_paid: row.try_get("is_paid")?,
        total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        total_weight_grams: to_u64(row.try_get("total_weight_grams")?, "orders")?,
        payment_session,
        items,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        transaction_id: row.try_get("transaction_id")?,
        transaction_status: row.try_get("transaction_status")?,
        status_code: row.try_get("status_code")?,
        payment_type: row.try_get("payment_type")?,
        fraud_status: row.try_get("fraud_status")?,
        amount: Money::from_cents(row.try_get("amount_cents")?),
        currency: row.try_get("currency")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
    })
}

impl PostgresTransaction {
    /// Loads items for a batch of orders and attaches them.
    async fn hydrate_orders(&mut self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<_, _>>()?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_variant_id, product_name, variant_label,
                   quantity, unit_price_cents, weight_grams, note, subtotal_cents,
                   down_payment_cents, unit_down_payment_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items
                .entry(order_id)
                .or_default()
                .push(row_to_order_item(row)?);
        }

        rows.into_iter()
            .zip(ids)
            .map(|(row, id)| row_to_order(row, items.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn fetch_orders(&mut self, sql: &str, bind: Option<Uuid>) -> Result<Vec<Order>> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&mut *self.tx).await?;
        self.hydrate_orders(rows).await
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        let (has_variant, stock) = match &product.policy {
            StockPolicy::Simple { stock } => (false, to_i32(*stock, "stock")?),
            StockPolicy::Varianted { .. } => (true, 0),
        };

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, weight_grams, has_variant, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(to_i32(product.weight_grams, "weight_grams")?)
        .bind(has_variant)
        .bind(stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, "products_pkey", || format!("product {} already exists", product.id)))?;

        for (position, variant) in product.variants().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, color, size, stock, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(variant.id.as_uuid())
            .bind(product.id.as_uuid())
            .bind(&variant.color)
            .bind(&variant.size)
            .bind(to_i32(variant.stock, "stock")?)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                unique_violation(e, "unique_variant_color_size", || {
                    format!("duplicate variant {}/{}", variant.color, variant.size)
                })
            })?;
        }

        Ok(())
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, name, price_cents, weight_grams, has_variant, stock, created_at, updated_at
            FROM products
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(None);
        };

        let policy = if row.try_get::<bool, _>("has_variant")? {
            let variant_rows = sqlx::query(
                r#"
                SELECT id, color, size, stock
                FROM product_variants
                WHERE product_id = $1
                ORDER BY position ASC
                "#,
            )
            .bind(id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;

            let variants = variant_rows
                .into_iter()
                .map(|v| -> Result<ProductVariant> {
                    Ok(ProductVariant {
                        id: VariantId::from_uuid(v.try_get("id")?),
                        color: v.try_get("color")?,
                        size: v.try_get("size")?,
                        stock: to_u32(v.try_get("stock")?, "product_variants")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            StockPolicy::Varianted { variants }
        } else {
            StockPolicy::Simple {
                stock: to_u32(row.try_get("stock")?, "products")?,
            }
        };

        Ok(Some(Product {
            id,
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            weight_grams: to_u32(row.try_get("weight_grams")?, "products")?,
            policy,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn soft_delete_product(&mut self, id: ProductId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn stock_level(&mut self, stock: StockRef) -> Result<Option<u32>> {
        let level: Option<i32> = match stock {
            StockRef::Product(id) => sqlx::query_scalar(
                r#"
                SELECT stock FROM products
                WHERE id = $1 AND has_variant = FALSE AND deleted_at IS NULL
                "#,
            )
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?,
            StockRef::Variant(id) => sqlx::query_scalar(
                r#"
                SELECT v.stock FROM product_variants v
                JOIN products p ON p.id = v.product_id
                WHERE v.id = $1 AND p.deleted_at IS NULL
                "#,
            )
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?,
        };
        level.map(|l| to_u32(l, "stock")).transpose()
    }

    async fn decrement_stock(&mut self, stock: StockRef, quantity: u32) -> Result<StockChange> {
        // Conditional update: the row lock taken by UPDATE makes check-and-decrement atomic.
        let remaining: Option<i32> = match stock {
            StockRef::Product(id) => sqlx::query_scalar(
                r#"
                UPDATE products SET stock = stock - $2, updated_at = NOW()
                WHERE id = $1 AND has_variant = FALSE AND deleted_at IS NULL AND stock >= $2
                RETURNING stock
                "#,
            )
            .bind(id.as_uuid())
            .bind(to_i32(quantity, "quantity")?)
            .fetch_optional(&mut *self.tx)
            .await?,
            StockRef::Variant(id) => sqlx::query_scalar(
                r#"
                UPDATE product_variants v SET stock = v.stock - $2
                FROM products p
                WHERE v.id = $1 AND p.id = v.product_id AND p.deleted_at IS NULL AND v.stock >= $2
                RETURNING v.stock
                "#,
            )
            .bind(id.as_uuid())
            .bind(to_i32(quantity, "quantity")?)
            .fetch_optional(&mut *self.tx)
            .await?,
        };

        if let Some(remaining) = remaining {
            return Ok(StockChange::Applied {
                remaining: to_u32(remaining, "stock")?,
            });
        }
        Ok(match self.stock_level(stock).await? {
            Some(available) => StockChange::Insufficient { available },
            None => StockChange::Missing,
        })
    }

    async fn increment_stock(&mut self, stock: StockRef, quantity: u32) -> Result<Option<u32>> {
        let level: Option<i32> = match stock {
            StockRef::Product(id) => sqlx::query_scalar(
                r#"
                UPDATE products SET stock = stock + $2, updated_at = NOW()
                WHERE id = $1 AND has_variant = FALSE AND deleted_at IS NULL
                RETURNING stock
                "#,
            )
            .bind(id.as_uuid())
            .bind(to_i32(quantity, "quantity")?)
            .fetch_optional(&mut *self.tx)
            .await?,
            StockRef::Variant(id) => sqlx::query_scalar(
                r#"
                UPDATE product_variants v SET stock = v.stock + $2
                FROM products p
                WHERE v.id = $1 AND p.id = v.product_id AND p.deleted_at IS NULL
                RETURNING v.stock
                "#,
            )
            .bind(id.as_uuid())
            .bind(to_i32(quantity, "quantity")?)
            .fetch_optional(&mut *self.tx)
            .await?,
        };
        level.map(|l| to_u32(l, "stock")).transpose()
    }

    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        let fresh = Cart::open(user_id);
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(fresh.id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(fresh.status.as_str())
        .bind(fresh.created_at)
        .execute(&mut *self.tx)
        .await?;

        let row = sqlx::query(
            "SELECT id, user_id, status, created_at, updated_at FROM carts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_cart(row)
    }

    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        sqlx::query("SELECT id, user_id, status, created_at, updated_at FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_cart)
            .transpose()
    }

    async fn list_cart_items(&mut self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cart_id, product_id, product_variant_id, quantity, note, created_at, updated_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_cart_item).collect()
    }

    async fn get_cart_item(
        &mut self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<Option<CartItem>> {
        sqlx::query(
            r#"
            SELECT id, cart_id, product_id, product_variant_id, quantity, note, created_at, updated_at
            FROM cart_items
            WHERE cart_id = $1 AND id = $2
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_cart_item)
        .transpose()
    }

    async fn find_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<CartItem>> {
        sqlx::query(
            r#"
            SELECT id, cart_id, product_id, product_variant_id, quantity, note, created_at, updated_at
            FROM cart_items
            WHERE cart_id = $1 AND product_id = $2 AND product_variant_id IS NOT DISTINCT FROM $3
            FOR UPDATE
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(variant_id.map(|v| v.as_uuid()))
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_cart_item)
        .transpose()
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, product_variant_id, quantity, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.cart_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.variant_id.map(|v| v.as_uuid()))
        .bind(to_i32(item.quantity, "quantity")?)
        .bind(&item.note)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_violation(e, "unique_cart_line", || {
                format!("cart {} already has a line for product {}", item.cart_id, item.product_id)
            })
        })?;
        Ok(())
    }

    async fn update_cart_item(&mut self, item: &CartItem) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE cart_items
            SET product_variant_id = $3, quantity = $4, note = $5, updated_at = $6
            WHERE id = $1 AND cart_id = $2
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.cart_id.as_uuid())
        .bind(item.variant_id.map(|v| v.as_uuid()))
        .bind(to_i32(item.quantity, "quantity")?)
        .bind(&item.note)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_violation(e, "unique_cart_line", || {
                format!("cart {} already has a line for product {}", item.cart_id, item.product_id)
            })
        })?;
        Ok(())
    }

    async fn delete_cart_items(&mut self, cart_id: CartId, ids: &[CartItemId]) -> Result<u64> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = ANY($2)")
            .bind(cart_id.as_uuid())
            .bind(&ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, order_code, status, payment_status, is_paid,
                                total_amount_cents, total_weight_grams, payment_token, payment_url,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(&order.code)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.is_paid)
        .bind(order.total_amount.cents())
        .bind(i64::try_from(order.total_weight_grams).map_err(|_| {
            StoreError::out_of_range("total_weight_grams", order.total_weight_grams)
        })?)
        .bind(order.payment_session.as_ref().map(|s| s.token.as_str()))
        .bind(order.payment_session.as_ref().map(|s| s.redirect_url.as_str()))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_violation(e, "unique_order_code", || {
                format!("order code {} already used", order.code)
            })
        })?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_variant_id, product_name,
                                         variant_label, quantity, unit_price_cents, weight_grams, note,
                                         subtotal_cents, down_payment_cents, unit_down_payment_cents,
                                         position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.variant_id.map(|v| v.as_uuid()))
            .bind(&item.product_name)
            .bind(&item.variant_label)
            .bind(to_i32(item.quantity, "quantity")?)
            .bind(item.unit_price.cents())
            .bind(to_i32(item.weight_grams, "weight_grams")?)
            .bind(&item.note)
            .bind(item.subtotal.cents())
            .bind(item.down_payment.cents())
            .bind(item.unit_down_payment.cents())
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND deleted_at IS NULL FOR UPDATE");
        Ok(self.fetch_orders(&sql, Some(id.as_uuid())).await?.pop())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND deleted_at IS NULL");
        Ok(self.fetch_orders(&sql, Some(id.as_uuid())).await?.pop())
    }

    async fn find_pending_payment_order(&mut self, user_id: UserId) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = $1 AND payment_status = 'pending' AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT 1"
        );
        Ok(self.fetch_orders(&sql, Some(user_id.as_uuid())).await?.pop())
    }

    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC"
        );
        self.fetch_orders(&sql, Some(user_id.as_uuid())).await
    }

    async fn list_orders(&mut self) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE deleted_at IS NULL ORDER BY created_at DESC"
        );
        self.fetch_orders(&sql, None).await
    }

    async fn list_stale_pending_orders(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<OrderId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM orders
            WHERE payment_status = 'pending' AND deleted_at IS NULL AND created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids.into_iter().map(OrderId::from_uuid).collect())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_status = $3, is_paid = $4,
                payment_token = $5, payment_url = $6, updated_at = $7
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.is_paid)
        .bind(order.payment_session.as_ref().map(|s| s.token.as_str()))
        .bind(order.payment_session.as_ref().map(|s| s.redirect_url.as_str()))
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn soft_delete_order(&mut self, id: OrderId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE orders SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id.as_uuid())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, transaction_id, transaction_status, status_code,
                                  payment_type, fraud_status, amount_cents, currency, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(&payment.transaction_id)
        .bind(&payment.transaction_status)
        .bind(&payment.status_code)
        .bind(&payment.payment_type)
        .bind(&payment.fraud_status)
        .bind(payment.amount.cents())
        .bind(&payment.currency)
        .bind(&payment.payload)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(row_to_payment).collect()
    }

    async fn list_payments(&mut self) -> Result<Vec<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC");
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        rows.into_iter().map(row_to_payment).collect()
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
