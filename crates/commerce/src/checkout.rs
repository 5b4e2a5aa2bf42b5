//! Checkout: turns selected cart lines into an order awaiting payment.

use std::sync::Arc;

use chrono::Utc;
use common::{CartItemId, OrderId, UserId};
use domain::{Order, OrderError, PaymentSession};
use serde::{Deserialize, Serialize};
use store::{Cache, Store, Transaction};

use crate::cart::load_summary;
use crate::error::{CommerceError, Result};
use crate::gateway::{Customer, PaymentGateway, SessionRequest};
use crate::inventory::InventoryLedger;
use crate::keys;

/// Who is checking out and which lines they picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub customer: Customer,
    /// Lines to check out. `None` takes the whole cart.
    #[serde(default)]
    pub selected: Option<Vec<CartItemId>>,
}

/// What a successful checkout hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub order_code: String,
    #[serde(flatten)]
    pub session: PaymentSession,
}

/// Runs checkout as a single transaction.
///
/// Stock reservation, order creation, cart pruning and the payment session
/// all commit together or not at all. The gateway is called before commit,
/// so a gateway failure leaves no order behind.
pub struct CheckoutService<S: Store> {
    store: S,
    cache: Arc<dyn Cache>,
    gateway: Arc<dyn PaymentGateway>,
    inventory: InventoryLedger,
}

impl<S: Store> Clone for CheckoutService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: Arc::clone(&self.cache),
            gateway: Arc::clone(&self.gateway),
            inventory: self.inventory,
        }
    }
}

impl<S: Store> CheckoutService<S> {
    pub fn new(store: S, cache: Arc<dyn Cache>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            store,
            cache,
            gateway,
            inventory: InventoryLedger::new(),
        }
    }

    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        metrics::counter!("checkout_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run(&request).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                let user_id = request.user_id;
                self.cache.delete(&keys::cart(user_id)).await;
                self.cache.delete(&keys::user_orders(user_id)).await;
                self.cache.delete(&keys::all_orders()).await;
                tracing::info!(
                    order_id = %receipt.order_id,
                    order_code = %receipt.order_code,
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total").increment(1);
                tracing::warn!(error = %e, "checkout rolled back");
            }
        }
        result
    }

    async fn run(&self, request: &CheckoutRequest) -> Result<CheckoutReceipt> {
        let user_id = request.user_id;
        let mut tx = self.store.begin().await?;

        if let Some(session) = tx
            .find_pending_payment_order(user_id)
            .await?
            .and_then(|order| order.payment_session)
        {
            return Err(CommerceError::PaymentPending(session));
        }

        let cart = tx
            .find_cart(user_id)
            .await?
            .ok_or(CommerceError::CartNotFound)?;
        let summary = load_summary(&mut tx, &cart).await?;
        if summary.is_empty() {
            return Err(CommerceError::CartNotFound);
        }

        let lines = summary.select(request.selected.as_deref());
        if lines.is_empty() {
            return Err(OrderError::NoItemsSelected.into());
        }

        let now = Utc::now();
        let mut order = Order::place(user_id, &lines, now)?;

        for item in &order.items {
            self.inventory
                .reserve(&mut tx, item.stock_ref(), item.quantity)
                .await?;
        }
        tx.insert_order(&order).await?;

        let consumed: Vec<CartItemId> = lines.iter().map(|line| line.item_id).collect();
        tx.delete_cart_items(cart.id, &consumed).await?;

        let session = self
            .gateway
            .create_session(&SessionRequest::for_order(&order, &request.customer))
            .await?;
        order.attach_session(session.clone(), now);
        tx.update_order(&order).await?;

        tx.commit().await?;

        Ok(CheckoutReceipt {
            order_id: order.id,
            order_code: order.code,
            session,
        })
    }
}
