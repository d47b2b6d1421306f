//! Payment callback signature verification.
//!
//! The gateway signs its checkout callback as the lowercase hex
//! HMAC-SHA256 of `"{order_id}|{payment_id}"` under the shared API
//! key secret. Verification is purely local; no network calls.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the expected callback signature for a gateway order and
/// payment id pair.
pub fn compute_signature(order_id: &str, payment_id: &str, secret: &str) -> String {
    let message = format!("{}|{}", order_id, payment_id);
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a supplied signature against the computed one.
pub fn verify_signature(order_id: &str, payment_id: &str, supplied: &str, secret: &str) -> bool {
    let expected = compute_signature(order_id, payment_id, secret);
    constant_time_eq(&expected, supplied)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
