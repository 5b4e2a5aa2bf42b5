//! In-memory payment gateway for tests and local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::PaymentSession;
use tokio::sync::Mutex;

use super::{
    GatewayError, PaymentGateway, RefundReceipt, RefundRequest, SessionRequest, TransactionStatus,
};

#[derive(Debug, Default)]
struct GatewayState {
    sessions: Vec<SessionRequest>,
    statuses: HashMap<OrderId, TransactionStatus>,
    refunds: Vec<RefundRequest>,
    next_token: u32,
    fail_on_session: bool,
    fail_on_status: bool,
}

/// Records every call and answers with scripted statuses.
///
/// Orders with an open session report `pending` until [`set_status`] says
/// otherwise. Unknown orders are rejected with 404, as the real gateway does.
///
/// [`set_status`]: InMemoryPaymentGateway::set_status
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes session creation fail until reset.
    pub async fn set_fail_on_session(&self, fail: bool) {
        self.state.lock().await.fail_on_session = fail;
    }

    /// Makes status queries fail until reset.
    pub async fn set_fail_on_status(&self, fail: bool) {
        self.state.lock().await.fail_on_status = fail;
    }

    /// Scripts the status reported for an order.
    pub async fn set_status(&self, order_id: OrderId, status: &str, fraud_status: Option<&str>) {
        self.state
            .lock()
            .await
            .statuses
            .insert(order_id, TransactionStatus::new(status, fraud_status));
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Session requests received so far, oldest first.
    pub async fn sessions(&self) -> Vec<SessionRequest> {
        self.state.lock().await.sessions.clone()
    }

    pub async fn refunds(&self) -> Vec<RefundRequest> {
        self.state.lock().await.refunds.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let mut state = self.state.lock().await;

        if state.fail_on_session {
            return Err(GatewayError::Unavailable(
                "session creation disabled".to_string(),
            ));
        }

        state.next_token += 1;
        let token = format!("tok-{:04}", state.next_token);
        state.sessions.push(request.clone());
        state
            .statuses
            .entry(request.order_id)
            .or_insert_with(|| TransactionStatus::new("pending", None));

        Ok(PaymentSession {
            redirect_url: format!("https://pay.test/checkout/{token}"),
            token,
        })
    }

    async fn transaction_status(
        &self,
        order_id: OrderId,
    ) -> Result<TransactionStatus, GatewayError> {
        let state = self.state.lock().await;

        if state.fail_on_status {
            return Err(GatewayError::Unavailable(
                "status queries disabled".to_string(),
            ));
        }

        state
            .statuses
            .get(&order_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                message: format!("transaction for {order_id} not found"),
            })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError> {
        let mut state = self.state.lock().await;
        state.refunds.push(request.clone());
        Ok(RefundReceipt {
            transaction_id: request.transaction_id.clone(),
            status_code: "200".to_string(),
            message: "refund accepted".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Customer;
    use domain::Money;

    fn request(order_id: OrderId) -> SessionRequest {
        SessionRequest {
            order_id,
            gross_amount: Money::from_units(30_000),
            customer: Customer {
                name: "Ana".into(),
                email: "ana@example.com".into(),
            },
            items: vec![],
        }
    }

    #[tokio::test]
    async fn test_session_then_pending_status() {
        let gateway = InMemoryPaymentGateway::new();
        let order_id = OrderId::new();

        let session = gateway.create_session(&request(order_id)).await.unwrap();
        assert_eq!(session.token, "tok-0001");
        assert!(session.redirect_url.ends_with("tok-0001"));
        assert_eq!(gateway.session_count().await, 1);

        let status = gateway.transaction_status(order_id).await.unwrap();
        assert_eq!(status.transaction_status, "pending");
        assert_eq!(status.outcome(), None);
    }

    #[tokio::test]
    async fn test_scripted_status_and_unknown_order() {
        let gateway = InMemoryPaymentGateway::new();
        let order_id = OrderId::new();
        gateway.set_status(order_id, "settlement", None).await;

        let status = gateway.transaction_status(order_id).await.unwrap();
        assert_eq!(status.transaction_status, "settlement");

        let missing = gateway.transaction_status(OrderId::new()).await;
        assert!(matches!(missing, Err(GatewayError::Rejected { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_failure_toggles() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_session(true).await;
        assert!(gateway.create_session(&request(OrderId::new())).await.is_err());
        assert_eq!(gateway.session_count().await, 0);

        gateway.set_fail_on_status(true).await;
        assert!(gateway.transaction_status(OrderId::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_refund_is_recorded() {
        let gateway = InMemoryPaymentGateway::new();
        let receipt = gateway
            .refund(&RefundRequest {
                transaction_id: "tx-1".into(),
                amount: Money::from_units(10_000),
                reason: "damaged".into(),
            })
            .await
            .unwrap();
        assert_eq!(receipt.transaction_id, "tx-1");
        assert_eq!(gateway.refunds().await.len(), 1);
    }
}
