//! Checkout, order history and admin order management.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use commerce::{CheckoutReceipt, CheckoutRequest, Customer};
use common::{CartItemId, OrderId};
use domain::{Order, OrderStatus, Payment};
use serde::Deserialize;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::auth::{AdminIdentity, Identity};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    /// Cart lines to check out; omitted means the whole cart.
    #[serde(default)]
    pub selected_items: Option<Vec<CartItemId>>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

// -- Handlers --

/// POST /orders/checkout
#[tracing::instrument(skip(state, identity, body), fields(user_id = %identity.user_id))]
pub async fn checkout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    body: Bytes,
) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    let body: CheckoutBody = if body.is_empty() {
        CheckoutBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid checkout body: {e}")))?
    };
    let receipt = state
        .commerce
        .checkout
        .checkout(CheckoutRequest {
            user_id: identity.user_id,
            customer: Customer {
                name: identity.name,
                email: identity.email,
            },
            selected: body.selected_items,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /orders — the caller's orders, newest first.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(
        state.commerce.orders.list_for_user(identity.user_id).await?,
    ))
}

/// GET /orders/{id} — one of the caller's orders.
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let order = state
        .commerce
        .orders
        .get_for_user(identity.user_id, order_id)
        .await?;
    Ok(Json(order))
}

/// GET /admin/orders
pub async fn list_all<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminIdentity,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.commerce.orders.list_all().await?))
}

/// PUT /admin/orders/{id}/status — unconditional workflow status write.
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id))]
pub async fn set_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminIdentity,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: domain::OrderError| ApiError::BadRequest(e.to_string()))?;
    let order = state.commerce.orders.set_status(order_id, status).await?;
    Ok(Json(order))
}

/// DELETE /admin/orders/{id}
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    state.commerce.orders.soft_delete(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/orders/{id}/payments
pub async fn payments<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminIdentity,
    Path(id): Path<String>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    Ok(Json(
        state.commerce.payments.payments_for_order(order_id).await?,
    ))
}
