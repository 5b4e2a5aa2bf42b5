//! Hosted-checkout gateway client over HTTP.

use async_trait::async_trait;
use common::OrderId;
use domain::{Money, PaymentSession};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    GatewayConfig, GatewayError, PaymentGateway, RefundReceipt, RefundRequest, SessionRequest,
    TransactionStatus,
};

/// Talks to the provider's checkout and transaction APIs, authenticating with
/// the server key as the HTTP Basic username.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    config: GatewayConfig,
    http: Client,
    checkout_url: String,
    core_url: String,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let checkout_url = config.environment.checkout_base_url().to_string();
        let core_url = config.environment.core_base_url().to_string();
        Self {
            config,
            http: Client::new(),
            checkout_url,
            core_url,
        }
    }

    /// Points the client at other base URLs, e.g. a local stub.
    pub fn with_base_urls(mut self, checkout_url: impl Into<String>, core_url: impl Into<String>) -> Self {
        self.checkout_url = checkout_url.into();
        self.core_url = core_url.into();
        self
    }

    fn session_body(&self, request: &SessionRequest) -> Value {
        let items: Vec<Value> = request
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": item.id,
                    "name": item.name,
                    "price": amount(item.price),
                    "quantity": item.quantity,
                })
            })
            .collect();

        let mut body = json!({
            "transaction_details": {
                "order_id": request.order_id.to_string(),
                "gross_amount": amount(request.gross_amount),
            },
            "customer_details": {
                "first_name": request.customer.name,
                "email": request.customer.email,
            },
            "item_details": items,
        });

        if !self.config.enabled_methods.is_empty() {
            body["enabled_payments"] = json!(self.config.enabled_methods);
        }
        if let Some(finish) = &self.config.finish_url {
            body["callbacks"] = json!({ "finish": finish });
        }
        body
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = builder
            .basic_auth(&self.config.server_key, Some(""))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status, message });
        }
        Ok(response)
    }
}

/// Whole amounts go out as integers, fractional ones as decimals.
fn amount(money: Money) -> Value {
    if money.cents_part() == 0 {
        json!(money.units())
    } else {
        json!(money.cents() as f64 / 100.0)
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    redirect_url: String,
}

/// The transaction API answers 200 with an embedded status code.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: String,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    transaction_status: Option<String>,
    #[serde(default)]
    fraud_status: Option<String>,
}

impl StatusResponse {
    fn is_success(&self) -> bool {
        self.status_code.starts_with('2')
    }

    fn rejection(self) -> GatewayError {
        GatewayError::Rejected {
            status: self.status_code.parse().unwrap_or(500),
            message: self.status_message.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let url = format!("{}/transactions", self.checkout_url);
        let response = self
            .send(self.http.post(&url).json(&self.session_body(request)))
            .await?;

        let parsed: SessionResponse = response.json().await?;
        Ok(PaymentSession {
            token: parsed.token,
            redirect_url: parsed.redirect_url,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn transaction_status(
        &self,
        order_id: OrderId,
    ) -> Result<TransactionStatus, GatewayError> {
        let url = format!("{}/v2/{}/status", self.core_url, order_id);
        let parsed: StatusResponse = self.send(self.http.get(&url)).await?.json().await?;

        if !parsed.is_success() {
            return Err(parsed.rejection());
        }
        let transaction_status = parsed.transaction_status.ok_or_else(|| {
            GatewayError::Unexpected("status response without transaction_status".to_string())
        })?;

        Ok(TransactionStatus {
            transaction_status,
            fraud_status: parsed.fraud_status,
        })
    }

    #[tracing::instrument(skip(self, request), fields(transaction_id = %request.transaction_id))]
    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError> {
        let url = format!("{}/v2/{}/refund", self.core_url, request.transaction_id);
        let body = json!({
            "refund_key": format!("refund-{}", uuid::Uuid::new_v4()),
            "amount": amount(request.amount),
            "reason": request.reason,
        });
        let parsed: StatusResponse = self.send(self.http.post(&url).json(&body)).await?.json().await?;

        if !parsed.is_success() {
            return Err(parsed.rejection());
        }
        Ok(RefundReceipt {
            transaction_id: request.transaction_id.clone(),
            status_code: parsed.status_code,
            message: parsed.status_message.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Customer, GatewayEnvironment, SessionItem};

    fn gateway(config: GatewayConfig) -> HttpPaymentGateway {
        HttpPaymentGateway::new(config)
    }

    #[test]
    fn test_base_urls_follow_environment() {
        let sandbox = gateway(GatewayConfig::new("key"));
        assert!(sandbox.checkout_url.contains("sandbox"));

        let production =
            gateway(GatewayConfig::new("key").with_environment(GatewayEnvironment::Production));
        assert!(!production.core_url.contains("sandbox"));
    }

    #[test]
    fn test_session_body() {
        let config = GatewayConfig {
            enabled_methods: vec!["bank_transfer".into()],
            ..GatewayConfig::new("key").with_finish_url("https://shop.test/done")
        };
        let order_id = OrderId::new();
        let request = SessionRequest {
            order_id,
            gross_amount: Money::from_units(60_000),
            customer: Customer {
                name: "Ana".into(),
                email: "ana@example.com".into(),
            },
            items: vec![SessionItem {
                id: "p1".into(),
                name: "Mug".into(),
                price: Money::from_units(30_000),
                quantity: 2,
            }],
        };

        let body = gateway(config).session_body(&request);
        assert_eq!(
            body["transaction_details"]["order_id"],
            json!(order_id.to_string())
        );
        assert_eq!(body["transaction_details"]["gross_amount"], json!(60_000));
        assert_eq!(body["item_details"][0]["price"], json!(30_000));
        assert_eq!(body["enabled_payments"], json!(["bank_transfer"]));
        assert_eq!(body["callbacks"]["finish"], json!("https://shop.test/done"));
    }

    #[test]
    fn test_fractional_amounts() {
        assert_eq!(amount(Money::from_cents(1050)), json!(10.5));
        assert_eq!(amount(Money::from_cents(1000)), json!(10));
    }
}
