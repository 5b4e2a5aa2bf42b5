//! Append-only payment ledger records.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Currency used when a notification does not name one.
pub const DEFAULT_CURRENCY: &str = "IDR";

/// One gateway notification as received. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub transaction_id: String,
    pub transaction_status: String,
    pub status_code: String,
    pub payment_type: Option<String>,
    pub fraud_status: Option<String>,
    pub amount: Money,
    pub currency: String,
    /// Raw notification body.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn received(
        order_id: OrderId,
        transaction_id: impl Into<String>,
        transaction_status: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            order_id,
            transaction_id: transaction_id.into(),
            transaction_status: transaction_status.into(),
            status_code: String::new(),
            payment_type: None,
            fraud_status: None,
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            payload: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_status_code(mut self, code: impl Into<String>) -> Self {
        self.status_code = code.into();
        self
    }

    pub fn with_payment_type(mut self, payment_type: Option<String>) -> Self {
        self.payment_type = payment_type;
        self
    }

    pub fn with_fraud_status(mut self, fraud_status: Option<String>) -> Self {
        self.fraud_status = fraud_status;
        self
    }

    /// Sets the currency; blank values keep the default.
    pub fn with_currency(mut self, currency: Option<String>) -> Self {
        if let Some(c) = currency.filter(|c| !c.trim().is_empty()) {
            self.currency = c;
        }
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
