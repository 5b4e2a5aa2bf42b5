//! Cache keys.

use common::UserId;

/// Prefix shared by every order-related key.
pub const ORDERS_PREFIX: &str = "orders:";

/// The user's cart view.
pub fn cart(user_id: UserId) -> String {
    format!("carts:{user_id}")
}

/// The user's order history.
pub fn user_orders(user_id: UserId) -> String {
    format!("{ORDERS_PREFIX}show-order:{user_id}")
}

/// The admin order list.
pub fn all_orders() -> String {
    format!("{ORDERS_PREFIX}all")
}
