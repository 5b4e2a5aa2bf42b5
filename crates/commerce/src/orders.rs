//! Order history and admin operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{OrderId, UserId};
use domain::{Order, OrderStatus};
use store::cache::{get_json, set_json};
use store::{Cache, Store, Transaction};

use crate::error::{CommerceError, Result};
use crate::keys;

pub struct OrderService<S: Store> {
    store: S,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl<S: Store> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: Arc::clone(&self.cache),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S, cache: Arc<dyn Cache>, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache,
            cache_ttl,
        }
    }

    /// A user's orders, newest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let key = keys::user_orders(user_id);
        if let Some(orders) = get_json::<Vec<Order>>(self.cache.as_ref(), &key).await {
            return Ok(orders);
        }

        let mut tx = self.store.begin().await?;
        let orders = tx.list_orders_for_user(user_id).await?;
        tx.commit().await?;

        set_json(self.cache.as_ref(), &key, &orders, self.cache_ttl).await;
        Ok(orders)
    }

    /// Every live order, newest first.
    pub async fn list_all(&self) -> Result<Vec<Order>> {
        let key = keys::all_orders();
        if let Some(orders) = get_json::<Vec<Order>>(self.cache.as_ref(), &key).await {
            return Ok(orders);
        }

        let mut tx = self.store.begin().await?;
        let orders = tx.list_orders().await?;
        tx.commit().await?;

        set_json(self.cache.as_ref(), &key, &orders, self.cache_ttl).await;
        Ok(orders)
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let order = tx.get_order(order_id).await?;
        tx.commit().await?;
        order.ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))
    }

    /// Loads an order only if it belongs to `user_id`.
    pub async fn get_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let order = self.get(order_id).await?;
        if order.user_id != user_id {
            return Err(CommerceError::OrderNotFound(order_id.to_string()));
        }
        Ok(order)
    }

    /// Overwrites the workflow status. Any status may follow any other.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .get_order_for_update(order_id)
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))?;
        let previous = order.status;
        order.set_status(status, Utc::now());
        tx.update_order(&order).await?;
        tx.commit().await?;

        self.invalidate(order.user_id).await;
        tracing::info!(%order_id, from = %previous, to = %status, "order status set");
        Ok(order)
    }

    /// Hides an order from every read. Reserved stock is not returned.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete(&self, order_id: OrderId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .get_order_for_update(order_id)
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))?;
        tx.soft_delete_order(order_id).await?;
        tx.commit().await?;

        self.invalidate(order.user_id).await;
        self.cache.delete(&keys::cart(order.user_id)).await;
        tracing::info!(%order_id, "order deleted");
        Ok(())
    }

    async fn invalidate(&self, user_id: UserId) {
        self.cache.delete(&keys::user_orders(user_id)).await;
        self.cache.delete(&keys::all_orders()).await;
    }
}
