//! Commerce error types.

use common::{CartItemId, ProductId};
use domain::{CartError, OrderError, PaymentSession, ProductError, StockRef};
use store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Broad classes of failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The entity is absent or soft-deleted.
    NotFound,
    /// A business rule the user can correct (stock, duplicates, pending payment).
    Conflict,
    /// Malformed or invalid input.
    BadRequest,
    /// Failed a security check.
    Unauthorized,
    /// The payment gateway failed or answered nonsense.
    Upstream,
    /// Persistence or serialization failure.
    Internal,
}

/// Errors that can occur in the commerce pipeline.
#[derive(Debug, Error)]
pub enum CommerceError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Stock not found: {0}")]
    StockNotFound(StockRef),

    #[error("Out of stock: {0}")]
    OutOfStock(StockRef),

    #[error("Insufficient stock for {stock}: requested {requested}, available {available}")]
    InsufficientStock {
        stock: StockRef,
        requested: u32,
        available: u32,
    },

    #[error("Cart not found")]
    CartNotFound,

    #[error("Cart item not found: {0}")]
    CartItemNotFound(CartItemId),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("An order is already awaiting payment")]
    PaymentPending(PaymentSession),

    #[error("Invalid notification signature")]
    InvalidSignature,

    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Product(#[from] ProductError),

    #[error("{0}")]
    Cart(#[from] CartError),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CommerceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommerceError::ProductNotFound(_)
            | CommerceError::StockNotFound(_)
            | CommerceError::CartNotFound
            | CommerceError::CartItemNotFound(_)
            | CommerceError::OrderNotFound(_) => ErrorKind::NotFound,
            CommerceError::OutOfStock(_)
            | CommerceError::InsufficientStock { .. }
            | CommerceError::PaymentPending(_)
            | CommerceError::Cart(CartError::DuplicateLine { .. })
            | CommerceError::Store(StoreError::Conflict(_)) => ErrorKind::Conflict,
            CommerceError::Product(_)
            | CommerceError::Cart(_)
            | CommerceError::Order(_)
            | CommerceError::InvalidNotification(_)
            | CommerceError::InvalidRequest(_)
            | CommerceError::Store(StoreError::OutOfRange { .. }) => ErrorKind::BadRequest,
            CommerceError::InvalidSignature => ErrorKind::Unauthorized,
            CommerceError::Gateway(_) => ErrorKind::Upstream,
            CommerceError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable reason string.
    pub fn code(&self) -> &'static str {
        match self {
            CommerceError::ProductNotFound(_) => "product_not_found",
            CommerceError::StockNotFound(_) => "not_found",
            CommerceError::OutOfStock(_) => "out_of_stock",
            CommerceError::InsufficientStock { .. } => "insufficient_stock",
            CommerceError::CartNotFound => "cart_not_found",
            CommerceError::CartItemNotFound(_) => "cart_item_not_found",
            CommerceError::OrderNotFound(_) => "order_not_found",
            CommerceError::PaymentPending(_) => "payment_pending",
            CommerceError::InvalidSignature => "invalid_signature",
            CommerceError::InvalidNotification(_) => "invalid_notification",
            CommerceError::InvalidRequest(_) => "invalid_request",
            CommerceError::Product(e) => match e {
                ProductError::VariantRequired { .. } => "variant_required",
                ProductError::VariantMismatch { .. } => "variant_mismatch",
                _ => "invalid_product",
            },
            CommerceError::Cart(e) => match e {
                CartError::InvalidQuantity { .. } | CartError::QuantityTooLarge { .. } => {
                    "invalid_quantity"
                }
                CartError::Amount(_) => "amount_out_of_range",
                CartError::DuplicateLine { .. } => "duplicate_line",
                CartError::UnknownStatus(_) => "invalid_cart",
            },
            CommerceError::Order(e) => match e {
                OrderError::NoItemsSelected => "no_items_selected",
                OrderError::VariantSelectionRequired { .. } => "variant_selection_required",
                OrderError::UnknownStatus(_) | OrderError::UnknownPaymentStatus(_) => {
                    "invalid_status"
                }
                OrderError::Amount(_) => "amount_out_of_range",
            },
            CommerceError::Gateway(_) => "upstream_failure",
            CommerceError::Store(StoreError::Conflict(_)) => "conflict",
            CommerceError::Store(StoreError::OutOfRange { .. }) => "out_of_range",
            CommerceError::Store(_) => "internal",
        }
    }
}

/// Convenience type alias for commerce results.
pub type Result<T> = std::result::Result<T, CommerceError>;
