//! Notification signatures.
//!
//! The gateway signs every notification with
//! `sha512_hex(order_id + status_code + gross_amount + server_key)`, using the
//! fields exactly as they appear in the body.

use sha2::{Digest, Sha512};

/// Computes the expected signature for a notification.
pub fn compute(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Checks a received signature. Case-insensitive, constant time in the length
/// of the expected value.
pub fn verify(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    received: &str,
) -> bool {
    let expected = compute(order_id, status_code, gross_amount, server_key);
    let received = received.trim().to_ascii_lowercase();
    if expected.len() != received.len() {
        return false;
    }
    expected
        .bytes()
        .zip(received.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
