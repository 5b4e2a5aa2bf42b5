//! Shared types for the commerce backend.

pub mod types;

pub use types::{
    CartId, CartItemId, OrderId, OrderItemId, PaymentId, ProductId, UserId, VariantId,
};
