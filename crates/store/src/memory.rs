use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, OrderId, ProductId, UserId, VariantId};
use domain::{Cart, CartItem, Order, Payment, PaymentStatus, Product, StockRef};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{StockChange, Store, Transaction},
};

#[derive(Debug, Clone)]
struct Row<T> {
    value: T,
    deleted: bool,
}

impl<T> Row<T> {
    fn live(value: T) -> Self {
        Self {
            value,
            deleted: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, Row<Product>>,
    carts: HashMap<CartId, Cart>,
    cart_items: Vec<CartItem>,
    orders: Vec<Row<Order>>,
    payments: Vec<Payment>,
}

impl Tables {
    fn live_product_mut(&mut self, stock: StockRef) -> Option<&mut Product> {
        self.products
            .values_mut()
            .filter(|row| !row.deleted)
            .map(|row| &mut row.value)
            .find(|p| p.stock_of(stock).is_some())
    }

    fn live_order(&self, id: OrderId) -> Option<&Order> {
        self.orders
            .iter()
            .find(|row| !row.deleted && row.value.id == id)
            .map(|row| &row.value)
    }

    fn live_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|row| !row.deleted).map(|row| &row.value)
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

/// In-memory store for tests and local runs.
///
/// Transactions are fully serialised: `begin` takes an exclusive lock and works
/// on a private copy of every table, which replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stock of a pool, ignoring soft deletes.
    pub async fn stock_of(&self, stock: StockRef) -> Option<u32> {
        let tables = self.tables.lock().await;
        tables
            .products
            .values()
            .find_map(|row| row.value.stock_of(stock))
    }

    /// Returns the number of live orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.live_orders().count()
    }

    /// Returns the number of payment records.
    pub async fn payment_count(&self) -> usize {
        self.tables.lock().await.payments.len()
    }

    /// Returns the number of cart lines across all carts.
    pub async fn cart_item_count(&self) -> usize {
        self.tables.lock().await.cart_items.len()
    }

    /// Returns the number of carts.
    pub async fn cart_count(&self) -> usize {
        self.tables.lock().await.carts.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

/// A serialised transaction over [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        if self.working.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        self.working
            .products
            .insert(product.id, Row::live(product.clone()));
        Ok(())
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self
            .working
            .products
            .get(&id)
            .filter(|row| !row.deleted)
            .map(|row| row.value.clone()))
    }

    async fn soft_delete_product(&mut self, id: ProductId) -> Result<bool> {
        match self.working.products.get_mut(&id) {
            Some(row) if !row.deleted => {
                row.deleted = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stock_level(&mut self, stock: StockRef) -> Result<Option<u32>> {
        Ok(self
            .working
            .live_product_mut(stock)
            .and_then(|p| p.stock_of(stock)))
    }

    async fn decrement_stock(&mut self, stock: StockRef, quantity: u32) -> Result<StockChange> {
        let Some(level) = self
            .working
            .live_product_mut(stock)
            .and_then(|p| p.stock_mut(stock))
        else {
            return Ok(StockChange::Missing);
        };

        if *level < quantity {
            return Ok(StockChange::Insufficient { available: *level });
        }
        *level -= quantity;
        Ok(StockChange::Applied { remaining: *level })
    }

    async fn increment_stock(&mut self, stock: StockRef, quantity: u32) -> Result<Option<u32>> {
        Ok(self
            .working
            .live_product_mut(stock)
            .and_then(|p| p.stock_mut(stock))
            .map(|level| {
                *level += quantity;
                *level
            }))
    }

    async fn find_or_create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        if let Some(cart) = self.find_cart(user_id).await? {
            return Ok(cart);
        }
        let cart = Cart::open(user_id);
        self.working.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn find_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self
            .working
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn list_cart_items(&mut self, cart_id: CartId) -> Result<Vec<CartItem>> {
        Ok(self
            .working
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn get_cart_item(
        &mut self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<Option<CartItem>> {
        Ok(self
            .working
            .cart_items
            .iter()
            .find(|i| i.cart_id == cart_id && i.id == item_id)
            .cloned())
    }

    async fn find_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<CartItem>> {
        Ok(self
            .working
            .cart_items
            .iter()
            .find(|i| i.cart_id == cart_id && i.matches(product_id, variant_id))
            .cloned())
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<()> {
        let duplicate = self
            .working
            .cart_items
            .iter()
            .any(|i| i.cart_id == item.cart_id && i.matches(item.product_id, item.variant_id));
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "cart {} already has a line for product {}",
                item.cart_id, item.product_id
            )));
        }
        self.working.cart_items.push(item.clone());
        Ok(())
    }

    async fn update_cart_item(&mut self, item: &CartItem) -> Result<()> {
        let clash = self.working.cart_items.iter().any(|i| {
            i.id != item.id
                && i.cart_id == item.cart_id
                && i.matches(item.product_id, item.variant_id)
        });
        if clash {
            return Err(StoreError::Conflict(format!(
                "cart {} already has a line for product {}",
                item.cart_id, item.product_id
            )));
        }
        if let Some(existing) = self
            .working
            .cart_items
            .iter_mut()
            .find(|i| i.id == item.id)
        {
            *existing = item.clone();
        }
        Ok(())
    }

    async fn delete_cart_items(&mut self, cart_id: CartId, ids: &[CartItemId]) -> Result<u64> {
        let before = self.working.cart_items.len();
        self.working
            .cart_items
            .retain(|i| !(i.cart_id == cart_id && ids.contains(&i.id)));
        Ok((before - self.working.cart_items.len()) as u64)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.working.orders.iter().any(|row| row.value.code == order.code) {
            return Err(StoreError::Conflict(format!(
                "order code {} already used",
                order.code
            )));
        }
        self.working.orders.push(Row::live(order.clone()));
        Ok(())
    }

    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.get_order(id).await
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.live_order(id).cloned())
    }

    async fn find_pending_payment_order(&mut self, user_id: UserId) -> Result<Option<Order>> {
        let pending = self
            .working
            .live_orders()
            .filter(|o| o.user_id == user_id && o.payment_status == PaymentStatus::Pending)
            .cloned()
            .collect();
        Ok(newest_first(pending).into_iter().next())
    }

    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self
            .working
            .live_orders()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(orders))
    }

    async fn list_orders(&mut self) -> Result<Vec<Order>> {
        Ok(newest_first(self.working.live_orders().cloned().collect()))
    }

    async fn list_stale_pending_orders(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<OrderId>> {
        Ok(self
            .working
            .live_orders()
            .filter(|o| o.payment_status == PaymentStatus::Pending && o.created_at < cutoff)
            .map(|o| o.id)
            .collect())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        if let Some(row) = self
            .working
            .orders
            .iter_mut()
            .find(|row| !row.deleted && row.value.id == order.id)
        {
            let stored = &mut row.value;
            stored.status = order.status;
            stored.payment_status = order.payment_status;
            stored.is_paid = order.is_paid;
            stored.payment_session = order.payment_session.clone();
            stored.updated_at = order.updated_at;
        }
        Ok(())
    }

    async fn soft_delete_order(&mut self, id: OrderId) -> Result<bool> {
        match self
            .working
            .orders
            .iter_mut()
            .find(|row| !row.deleted && row.value.id == id)
        {
            Some(row) => {
                row.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn list_payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_payments(&mut self) -> Result<Vec<Payment>> {
        Ok(self.working.payments.iter().rev().cloned().collect())
    }

    async fn commit(self) -> Result<()> {
        let Self { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
