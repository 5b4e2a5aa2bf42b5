use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, OrderId, ProductId, UserId, VariantId};
use domain::{Cart, CartItem, Order, Payment, Product, StockRef};

use crate::Result;

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    /// The decrement was applied; `remaining` units are left.
    Applied { remaining: u32 },
    /// Not enough stock; nothing changed.
    Insufficient { available: u32 },
    /// The pool does not exist (or its product was soft-deleted).
    Missing,
}

/// Entry point to a backing store.
///
/// All reads and writes happen through a [`Transaction`]. Implementations must be
/// cheap to clone and thread-safe.
#[async_trait]
pub trait Store: Send + Sync + Clone + 'static {
    type Tx: Transaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A unit of work against the store.
///
/// Nothing written through a transaction is visible to others until [`commit`].
/// Dropping a transaction without committing rolls it back, so every early
/// return or `?` leaves the store untouched.
///
/// [`commit`]: Transaction::commit
#[async_trait]
pub trait Transaction: Send + Sized {
    // -- Catalog --

    async fn insert_product(&mut self, product: &Product) -> Result<()>;

    /// Loads a live (not soft-deleted) product.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Soft-deletes a product. Returns false if it was not live.
    async fn soft_delete_product(&mut self, id: ProductId) -> Result<bool>;

    // -- Inventory --

    /// Current stock of a live pool.
    async fn stock_level(&mut self, stock: StockRef) -> Result<Option<u32>>;

    /// Atomically decrements a pool if it holds at least `quantity` units.
    async fn decrement_stock(&mut self, stock: StockRef, quantity: u32) -> Result<StockChange>;

    /// Adds units back to a pool. Returns the new level, or `None` if the pool is gone.
    async fn increment_stock(&mut self, stock: StockRef, quantity: u32) -> Result<Option<u32>>;

    // -- Carts --

    /// Returns the user's cart, creating an empty active one if needed.
    ///
    /// Safe under concurrent first calls: exactly one cart exists per user.
    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart>;

    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Lines of a cart, oldest first.
    async fn list_cart_items(&mut self, cart_id: CartId) -> Result<Vec<CartItem>>;

    async fn get_cart_item(&mut self, cart_id: CartId, item_id: CartItemId)
    -> Result<Option<CartItem>>;

    /// The line holding `(product, variant)`, if any.
    async fn find_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<CartItem>>;

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<()>;

    async fn update_cart_item(&mut self, item: &CartItem) -> Result<()>;

    /// Removes lines from a cart. Returns how many were removed.
    async fn delete_cart_items(&mut self, cart_id: CartId, ids: &[CartItemId]) -> Result<u64>;

    // -- Orders --

    /// Inserts an order together with its items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Loads a live order and locks it for the rest of the transaction.
    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Loads a live order without locking.
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Most recent live order of the user whose payment is still pending.
    async fn find_pending_payment_order(&mut self, user_id: UserId) -> Result<Option<Order>>;

    /// Live orders of a user, newest first.
    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    /// All live orders, newest first.
    async fn list_orders(&mut self) -> Result<Vec<Order>>;

    /// Ids of live orders still pending payment that were created before `cutoff`.
    async fn list_stale_pending_orders(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<OrderId>>;

    /// Persists the mutable part of an order: status, payment state and session.
    /// Items are never rewritten.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Soft-deletes an order. Returns false if it was not live.
    async fn soft_delete_order(&mut self, id: OrderId) -> Result<bool>;

    // -- Payments --

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    /// Payments recorded for an order, oldest first.
    async fn list_payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>>;

    /// All payments, newest first.
    async fn list_payments(&mut self) -> Result<Vec<Payment>>;

    // -- Lifecycle --

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
