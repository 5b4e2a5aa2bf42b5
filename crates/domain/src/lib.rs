//! Domain model for the commerce backend.
//!
//! This crate is free of I/O. It provides:
//! - `Money` in integer minor units
//! - Products with either a single stock pool or per-variant pools
//! - Carts, cart lines and the priced cart view
//! - Orders with their payment state machine
//! - Append-only payment records

pub mod cart;
pub mod money;
pub mod order;
pub mod payment;
pub mod product;

pub use cart::{
    Cart, CartError, CartItem, CartLine, CartStatus, CartSummary, CartView, DOWN_PAYMENT_PERCENT,
    LineVariant, MAX_LINE_QUANTITY, down_payment,
};
pub use money::{Money, MoneyError};
pub use order::{
    Order, OrderError, OrderItem, OrderStatus, PaymentOutcome, PaymentSession, PaymentStatus,
    PaymentTransition,
};
pub use payment::{DEFAULT_CURRENCY, Payment};
pub use product::{NewVariant, Product, ProductError, ProductVariant, StockPolicy, StockRef};
