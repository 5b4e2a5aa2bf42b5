//! Payment reconciliation: applies gateway notifications to orders.

use std::sync::Arc;

use chrono::Utc;
use common::OrderId;
use domain::{Money, Order, Payment, PaymentStatus, PaymentTransition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use store::{Cache, Store, Transaction};

use crate::error::{CommerceError, Result};
use crate::gateway::{GatewayConfig, PaymentGateway, RefundReceipt, RefundRequest};
use crate::inventory::InventoryLedger;
use crate::{keys, signature};

/// An inbound gateway notification.
///
/// Only the fields reconciliation reads are typed; the full body is kept in
/// `raw` and stored with the payment record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub transaction_status: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl PaymentNotification {
    /// Parses a notification body, keeping the body itself.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| CommerceError::InvalidNotification(e.to_string()))?;
        let mut notification: Self = serde_json::from_value(raw.clone())
            .map_err(|e| CommerceError::InvalidNotification(e.to_string()))?;
        notification.raw = raw;
        Ok(notification)
    }
}

/// What a notification did to its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Applied {
        from: PaymentStatus,
        to: PaymentStatus,
        released_units: u32,
    },
    /// Failure reported for an order that had already failed.
    AlreadyFailed,
    /// The gateway status carries no decision.
    Ignored { transaction_status: String },
}

impl NotificationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationOutcome::Applied { to, .. } => to.as_str(),
            NotificationOutcome::AlreadyFailed => "already_failed",
            NotificationOutcome::Ignored { .. } => "ignored",
        }
    }
}

pub struct ReconciliationEngine<S: Store> {
    store: S,
    cache: Arc<dyn Cache>,
    gateway: Arc<dyn PaymentGateway>,
    config: GatewayConfig,
    inventory: InventoryLedger,
}

impl<S: Store> Clone for ReconciliationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: Arc::clone(&self.cache),
            gateway: Arc::clone(&self.gateway),
            config: self.config.clone(),
            inventory: self.inventory,
        }
    }
}

impl<S: Store> ReconciliationEngine<S> {
    pub fn new(
        store: S,
        cache: Arc<dyn Cache>,
        gateway: Arc<dyn PaymentGateway>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            cache,
            gateway,
            config,
            inventory: InventoryLedger::new(),
        }
    }

    /// Verifies and applies a notification in one transaction.
    ///
    /// The signature is checked before anything is read or written. The
    /// transition is driven by the gateway's own status for the order, not by
    /// the notification body. A failed step rolls back the payment record too,
    /// so the gateway can safely retry.
    #[tracing::instrument(
        skip(self, notification),
        fields(order_id = %notification.order_id, transaction_id = %notification.transaction_id)
    )]
    pub async fn handle_notification(
        &self,
        notification: PaymentNotification,
    ) -> Result<NotificationOutcome> {
        if !signature::verify(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            &self.config.server_key,
            &notification.signature_key,
        ) {
            metrics::counter!("payment_signature_rejected_total").increment(1);
            tracing::warn!(
                expected = %signature::compute(
                    &notification.order_id,
                    &notification.status_code,
                    &notification.gross_amount,
                    &self.config.server_key,
                ),
                received = %notification.signature_key,
                "rejected notification with invalid signature"
            );
            return Err(CommerceError::InvalidSignature);
        }

        let order_id = OrderId::parse(&notification.order_id)
            .map_err(|_| CommerceError::OrderNotFound(notification.order_id.clone()))?;
        let amount = Money::from_decimal_str(&notification.gross_amount)
            .map_err(|e| CommerceError::InvalidNotification(e.to_string()))?;

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .get_order_for_update(order_id)
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(notification.order_id.clone()))?;

        let payment = Payment::received(
            order.id,
            notification.transaction_id.clone(),
            notification.transaction_status.clone(),
            amount,
        )
        .with_status_code(notification.status_code.clone())
        .with_payment_type(non_empty(notification.payment_type.clone()))
        .with_fraud_status(non_empty(notification.fraud_status.clone()))
        .with_currency(notification.currency.clone())
        .with_payload(notification.raw.clone());
        tx.insert_payment(&payment).await?;

        let status = self.gateway.transaction_status(order.id).await?;
        let outcome = match status.outcome() {
            None => NotificationOutcome::Ignored {
                transaction_status: status.transaction_status,
            },
            Some(outcome) => match order.apply_payment_outcome(outcome, Utc::now()) {
                PaymentTransition::AlreadyFailed => NotificationOutcome::AlreadyFailed,
                PaymentTransition::Applied {
                    from,
                    to,
                    release_stock,
                } => {
                    let released_units = if release_stock {
                        release_order_stock(&self.inventory, &mut tx, &order).await?
                    } else {
                        0
                    };
                    tx.update_order(&order).await?;
                    NotificationOutcome::Applied {
                        from,
                        to,
                        released_units,
                    }
                }
            },
        };

        tx.commit().await?;

        self.cache.delete(&keys::cart(order.user_id)).await;
        self.cache.delete(&keys::user_orders(order.user_id)).await;
        self.cache.delete(&keys::all_orders()).await;

        metrics::counter!("payment_notifications_total", "outcome" => outcome.label())
            .increment(1);
        tracing::info!(outcome = outcome.label(), "notification processed");
        Ok(outcome)
    }

    /// Asks the gateway to refund a transaction. Orders and stock are left
    /// alone; the gateway reports the refund through a later notification.
    #[tracing::instrument(skip(self, request), fields(transaction_id = %request.transaction_id))]
    pub async fn refund(&self, request: RefundRequest) -> Result<RefundReceipt> {
        if !request.amount.is_positive() {
            return Err(CommerceError::InvalidRequest(format!(
                "refund amount must be positive, got {}",
                request.amount
            )));
        }
        if request.transaction_id.trim().is_empty() {
            return Err(CommerceError::InvalidRequest(
                "transaction id is required".to_string(),
            ));
        }

        let receipt = self.gateway.refund(&request).await?;
        tracing::info!(amount = %request.amount, "refund requested");
        Ok(receipt)
    }

    /// Payment records of an order, oldest first.
    pub async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let mut tx = self.store.begin().await?;
        if tx.get_order(order_id).await?.is_none() {
            return Err(CommerceError::OrderNotFound(order_id.to_string()));
        }
        let payments = tx.list_payments_for_order(order_id).await?;
        tx.commit().await?;
        Ok(payments)
    }

    /// Every payment record, newest first.
    pub async fn list_payments(&self) -> Result<Vec<Payment>> {
        let mut tx = self.store.begin().await?;
        let payments = tx.list_payments().await?;
        tx.commit().await?;
        Ok(payments)
    }
}

/// Returns every item of a failed order to its stock pool.
///
/// Pools that no longer exist are skipped with a warning; returns the number
/// of units put back.
pub(crate) async fn release_order_stock<T: Transaction>(
    inventory: &InventoryLedger,
    tx: &mut T,
    order: &Order,
) -> Result<u32> {
    let mut released = 0;
    for item in &order.items {
        match inventory.release(tx, item.stock_ref(), item.quantity).await {
            Ok(_) => released += item.quantity,
            Err(CommerceError::StockNotFound(stock)) => tracing::warn!(
                order_id = %order.id,
                %stock,
                quantity = item.quantity,
                "stock pool gone, units not returned"
            ),
            Err(e) => return Err(e),
        }
    }
    Ok(released)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notification_keeps_body() {
        let body = br#"{
            "order_id": "abc",
            "transaction_id": "tx-1",
            "transaction_status": "settlement",
            "status_code": "200",
            "gross_amount": "30000.00",
            "signature_key": "sig",
            "payment_type": "bank_transfer",
            "va_numbers": [{"bank": "bca", "va_number": "123"}]
        }"#;

        let notification = PaymentNotification::from_slice(body).unwrap();
        assert_eq!(notification.order_id, "abc");
        assert_eq!(notification.fraud_status, None);
        assert_eq!(notification.raw["va_numbers"][0]["bank"], "bca");
    }

    #[test]
    fn test_parse_rejects_incomplete_body() {
        let err = PaymentNotification::from_slice(br#"{"order_id": "abc"}"#).unwrap_err();
        assert!(matches!(err, CommerceError::InvalidNotification(_)));

        let err = PaymentNotification::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, CommerceError::InvalidNotification(_)));
    }

    #[test]
    fn test_outcome_labels() {
        let applied = NotificationOutcome::Applied {
            from: PaymentStatus::Pending,
            to: PaymentStatus::Paid,
            released_units: 0,
        };
        assert_eq!(applied.label(), "paid");
        assert_eq!(NotificationOutcome::AlreadyFailed.label(), "already_failed");
    }
}
