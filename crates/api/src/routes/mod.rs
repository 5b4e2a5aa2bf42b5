//! HTTP route handlers.

pub mod carts;
pub mod orders;
pub mod payments;
pub mod products;
pub mod system;

use crate::error::ApiError;

/// Parses a path segment into a typed id.
pub(crate) fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}
