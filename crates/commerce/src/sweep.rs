//! Expiry sweep for orders whose payment never arrived.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{PaymentOutcome, PaymentStatus, PaymentTransition};
use store::{Cache, Store, Transaction};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::inventory::InventoryLedger;
use crate::keys;
use crate::reconciliation::release_order_stock;

/// Fails orders left pending for longer than `order_ttl` and returns their stock.
pub struct ExpirySweeper<S: Store> {
    store: S,
    cache: Arc<dyn Cache>,
    inventory: InventoryLedger,
    order_ttl: chrono::Duration,
}

impl<S: Store> Clone for ExpirySweeper<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: Arc::clone(&self.cache),
            inventory: self.inventory,
            order_ttl: self.order_ttl,
        }
    }
}

impl<S: Store> ExpirySweeper<S> {
    pub fn new(store: S, cache: Arc<dyn Cache>, order_ttl: chrono::Duration) -> Self {
        Self {
            store,
            cache,
            inventory: InventoryLedger::new(),
            order_ttl,
        }
    }

    /// Expires every stale pending order, one transaction per order.
    ///
    /// An order that fails to expire is logged and left for the next run.
    /// Returns how many orders were expired.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.order_ttl;
        let mut tx = self.store.begin().await?;
        let stale = tx.list_stale_pending_orders(cutoff).await?;
        tx.commit().await?;

        let mut expired = 0;
        for order_id in stale {
            match self.expire(order_id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(%order_id, error = %e, "failed to expire order"),
            }
        }

        if expired > 0 {
            metrics::counter!("orders_expired_total").increment(expired as u64);
            tracing::info!(expired, "expired stale orders");
        }
        Ok(expired)
    }

    async fn expire(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let Some(mut order) = tx.get_order_for_update(order_id).await? else {
            return Ok(false);
        };
        // A notification may have landed since the scan.
        if order.payment_status != PaymentStatus::Pending {
            return Ok(false);
        }

        let PaymentTransition::Applied { release_stock, .. } =
            order.apply_payment_outcome(PaymentOutcome::Failed, now)
        else {
            return Ok(false);
        };
        if release_stock {
            release_order_stock(&self.inventory, &mut tx, &order).await?;
        }
        tx.update_order(&order).await?;
        tx.commit().await?;

        self.cache.delete(&keys::cart(order.user_id)).await;
        self.cache.delete(&keys::user_orders(order.user_id)).await;
        self.cache.delete(&keys::all_orders()).await;
        tracing::debug!(%order_id, code = %order.code, "order expired");
        Ok(true)
    }

    /// Runs the sweep every `interval` until `shutdown` flips to true.
    pub fn spawn(self, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once(Utc::now()).await {
                            tracing::error!(error = %e, "expiry sweep failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("expiry sweep stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
