//! Gateway webhook and payment admin endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use commerce::{NotificationOutcome, PaymentNotification, RefundReceipt, RefundRequest};
use domain::Payment;
use store::Store;

use crate::AppState;
use crate::auth::AdminIdentity;
use crate::error::ApiError;

/// POST /payments/notifications — gateway callback.
///
/// Takes the raw body so it can be stored verbatim with the payment record.
pub async fn notify<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> Result<Json<NotificationOutcome>, ApiError> {
    let notification = PaymentNotification::from_slice(&body)?;
    let outcome = state
        .commerce
        .payments
        .handle_notification(notification)
        .await?;
    Ok(Json(outcome))
}

/// POST /admin/payments/refund
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id))]
pub async fn refund<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminIdentity,
    Json(req): Json<RefundRequest>,
) -> Result<Json<RefundReceipt>, ApiError> {
    Ok(Json(state.commerce.payments.refund(req).await?))
}

/// GET /admin/payments — every payment record, newest first.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminIdentity,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.commerce.payments.list_payments().await?))
}
