//! HTTP API server for the commerce backend.
//!
//! Exposes carts, checkout, order history, the payment-gateway webhook and a
//! small admin surface, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use commerce::{Commerce, CommerceConfig, InMemoryPaymentGateway, PaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{Cache, InMemoryCache, InMemoryStore, Store};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub commerce: Commerce<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(
        store: S,
        cache: Arc<dyn Cache>,
        gateway: Arc<dyn PaymentGateway>,
        config: CommerceConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            commerce: Commerce::new(store, cache, gateway, config),
        })
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/carts",
            post(routes::carts::add_item::<S>).get(routes::carts::get::<S>),
        )
        .route(
            "/carts/items/{id}",
            put(routes::carts::update_item::<S>).delete(routes::carts::remove_item::<S>),
        )
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/checkout", post(routes::orders::checkout::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/payments/notifications", post(routes::payments::notify::<S>))
        .route("/admin/products", post(routes::products::create::<S>))
        .route("/admin/products/{id}", delete(routes::products::delete::<S>))
        .route("/admin/orders", get(routes::orders::list_all::<S>))
        .route("/admin/orders/{id}", delete(routes::orders::delete::<S>))
        .route("/admin/orders/{id}/status", put(routes::orders::set_status::<S>))
        .route("/admin/orders/{id}/payments", get(routes::orders::payments::<S>))
        .route("/admin/payments", get(routes::payments::list::<S>))
        .route("/admin/payments/refund", post(routes::payments::refund::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates an in-memory application state, returning the gateway so callers
/// can script payment statuses.
pub fn create_default_state(
    config: CommerceConfig,
) -> (Arc<AppState<InMemoryStore>>, InMemoryStore, InMemoryPaymentGateway) {
    let store = InMemoryStore::new();
    let gateway = InMemoryPaymentGateway::new();
    let state = AppState::new(
        store.clone(),
        Arc::new(InMemoryCache::new()),
        Arc::new(gateway.clone()),
        config,
    );
    (state, store, gateway)
}
