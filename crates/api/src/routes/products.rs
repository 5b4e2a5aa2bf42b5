//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use commerce::NewProduct;
use common::ProductId;
use domain::Product;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::auth::AdminIdentity;
use crate::error::ApiError;

/// GET /products/{id}
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id, "product id")?;
    Ok(Json(state.commerce.catalog.get_product(id).await?))
}

/// POST /admin/products
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminIdentity,
    Json(req): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.commerce.catalog.create_product(req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// DELETE /admin/products/{id}
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ProductId = parse_id(&id, "product id")?;
    state.commerce.catalog.soft_delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
