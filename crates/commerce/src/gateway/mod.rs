//! Payment gateway abstraction.
//!
//! The gateway hosts the payment page, reports transaction status and issues
//! refunds. [`HttpPaymentGateway`] talks to a hosted-checkout provider over
//! HTTP; [`InMemoryPaymentGateway`] stands in for it in tests and local runs.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use common::OrderId;
use domain::{Money, Order, PaymentOutcome, PaymentSession};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpPaymentGateway;
pub use memory::InMemoryPaymentGateway;

/// Errors raised while talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected gateway response: {0}")]
    Unexpected(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Which gateway deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl GatewayEnvironment {
    /// Base URL of the hosted checkout API.
    pub fn checkout_base_url(&self) -> &'static str {
        match self {
            GatewayEnvironment::Sandbox => "https://app.sandbox.midtrans.com/snap/v1",
            GatewayEnvironment::Production => "https://app.midtrans.com/snap/v1",
        }
    }

    /// Base URL of the transaction API (status, refunds).
    pub fn core_base_url(&self) -> &'static str {
        match self {
            GatewayEnvironment::Sandbox => "https://api.sandbox.midtrans.com",
            GatewayEnvironment::Production => "https://api.midtrans.com",
        }
    }
}

impl std::str::FromStr for GatewayEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(GatewayEnvironment::Sandbox),
            "production" => Ok(GatewayEnvironment::Production),
            other => Err(format!("unknown payment environment: {other}")),
        }
    }
}

/// Credentials and options shared by the HTTP gateway and the signature check.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub server_key: String,
    pub environment: GatewayEnvironment,
    /// Where the hosted page sends the buyer afterwards.
    pub finish_url: Option<String>,
    /// Payment methods offered on the hosted page. Empty means all.
    pub enabled_methods: Vec<String>,
}

impl GatewayConfig {
    pub fn new(server_key: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
            ..Self::default()
        }
    }

    pub fn with_environment(mut self, environment: GatewayEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_finish_url(mut self, url: impl Into<String>) -> Self {
        self.finish_url = Some(url.into());
        self
    }
}

/// The buyer, as shown on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
}

/// One line of the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    pub id: String,
    pub name: String,
    /// Per-unit down payment.
    pub price: Money,
    pub quantity: u32,
}

/// Request to open a hosted payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub order_id: OrderId,
    /// Sum of line down payments.
    pub gross_amount: Money,
    pub customer: Customer,
    pub items: Vec<SessionItem>,
}

impl SessionRequest {
    /// Builds the session request for a freshly placed order.
    ///
    /// Items are priced at their per-unit down payment so that the listed
    /// lines add up to `gross_amount`.
    pub fn for_order(order: &Order, customer: &Customer) -> Self {
        let items = order
            .items
            .iter()
            .map(|item| SessionItem {
                id: item.product_id.to_string(),
                name: match &item.variant_label {
                    Some(label) => format!("{} ({label})", item.product_name),
                    None => item.product_name.clone(),
                },
                price: item.unit_down_payment,
                quantity: item.quantity,
            })
            .collect();

        Self {
            order_id: order.id,
            gross_amount: order.gross_amount(),
            customer: customer.clone(),
            items,
        }
    }
}

/// Authoritative transaction state reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
}

impl TransactionStatus {
    pub fn new(transaction_status: impl Into<String>, fraud_status: Option<&str>) -> Self {
        Self {
            transaction_status: transaction_status.into(),
            fraud_status: fraud_status.map(str::to_string),
        }
    }

    /// Maps the gateway state onto an order outcome.
    ///
    /// `None` means the state carries no decision yet (`pending`, unknown
    /// statuses, or a capture without a fraud verdict).
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        match (
            self.transaction_status.as_str(),
            self.fraud_status.as_deref(),
        ) {
            ("capture", Some("challenge")) => Some(PaymentOutcome::Challenge),
            ("capture", Some("accept")) => Some(PaymentOutcome::Paid),
            ("settlement", _) | ("deny", _) => Some(PaymentOutcome::Paid),
            ("cancel", _) | ("expire", _) => Some(PaymentOutcome::Failed),
            _ => None,
        }
    }
}

/// Request to refund a settled transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: String,
    pub amount: Money,
    pub reason: String,
}

/// Gateway acknowledgement of a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub transaction_id: String,
    pub status_code: String,
    pub message: String,
}

/// Operations the commerce pipeline needs from a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted payment session for an order.
    async fn create_session(&self, request: &SessionRequest)
    -> Result<PaymentSession, GatewayError>;

    /// Fetches the authoritative status of an order's transaction.
    async fn transaction_status(&self, order_id: OrderId)
    -> Result<TransactionStatus, GatewayError>;

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError>;
}
