//! Cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use commerce::{AddItem, UpdateItem};
use common::CartItemId;
use domain::{CartItem, CartView};
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::auth::Identity;
use crate::error::ApiError;

/// POST /carts — add a product (or variant) to the cart.
#[tracing::instrument(skip(state, identity, req), fields(user_id = %identity.user_id))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<AddItem>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    let item = state.commerce.carts.add_item(identity.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /carts — the cart, or the pending payment session.
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.commerce.carts.get_cart(identity.user_id).await?))
}

/// PUT /carts/items/{id}
pub async fn update_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<UpdateItem>,
) -> Result<Json<CartItem>, ApiError> {
    let item_id: CartItemId = parse_id(&id, "cart item id")?;
    let item = state
        .commerce
        .carts
        .update_item(identity.user_id, item_id, req)
        .await?;
    Ok(Json(item))
}

/// DELETE /carts/items/{id}
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let item_id: CartItemId = parse_id(&id, "cart item id")?;
    state
        .commerce
        .carts
        .remove_item(identity.user_id, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
