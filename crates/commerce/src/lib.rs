//! The cart → checkout → payment pipeline.
//!
//! Services here own the business rules and the transaction boundaries; the
//! persistence and cache backends come from the `store` crate and the payment
//! provider sits behind [`PaymentGateway`].

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod keys;
pub mod orders;
pub mod reconciliation;
pub mod signature;
pub mod sweep;

use std::sync::Arc;
use std::time::Duration;

use store::{Cache, Store};

pub use cart::{AddItem, CartService, UpdateItem};
pub use catalog::{CatalogService, NewProduct};
pub use checkout::{CheckoutReceipt, CheckoutRequest, CheckoutService};
pub use error::{CommerceError, ErrorKind, Result};
pub use gateway::{
    Customer, GatewayConfig, GatewayEnvironment, GatewayError, HttpPaymentGateway,
    InMemoryPaymentGateway, PaymentGateway, RefundReceipt, RefundRequest, SessionItem,
    SessionRequest, TransactionStatus,
};
pub use inventory::InventoryLedger;
pub use orders::OrderService;
pub use reconciliation::{NotificationOutcome, PaymentNotification, ReconciliationEngine};
pub use sweep::ExpirySweeper;

/// Tunables shared by the services.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    pub gateway: GatewayConfig,
    /// How long cached cart and order views live.
    pub cache_ttl: Duration,
    /// How long an order may wait for payment before the sweep fails it.
    pub order_ttl: chrono::Duration,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            cache_ttl: Duration::from_secs(120),
            order_ttl: chrono::Duration::hours(24),
        }
    }
}

/// Every service, wired to one store, cache and gateway.
pub struct Commerce<S: Store> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub payments: ReconciliationEngine<S>,
    pub sweeper: ExpirySweeper<S>,
}

impl<S: Store> Clone for Commerce<S> {
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            carts: self.carts.clone(),
            checkout: self.checkout.clone(),
            orders: self.orders.clone(),
            payments: self.payments.clone(),
            sweeper: self.sweeper.clone(),
        }
    }
}

impl<S: Store> Commerce<S> {
    pub fn new(
        store: S,
        cache: Arc<dyn Cache>,
        gateway: Arc<dyn PaymentGateway>,
        config: CommerceConfig,
    ) -> Self {
        Self {
            catalog: CatalogService::new(store.clone(), Arc::clone(&cache)),
            carts: CartService::new(store.clone(), Arc::clone(&cache), config.cache_ttl),
            checkout: CheckoutService::new(store.clone(), Arc::clone(&cache), Arc::clone(&gateway)),
            orders: OrderService::new(store.clone(), Arc::clone(&cache), config.cache_ttl),
            payments: ReconciliationEngine::new(
                store.clone(),
                Arc::clone(&cache),
                gateway,
                config.gateway,
            ),
            sweeper: ExpirySweeper::new(store, cache, config.order_ttl),
        }
    }
}
