//! HMAC-SHA256 payment signatures.
//!
//! A checkout returns `(order_id, payment_id, signature)` where the signature is the hex-encoded
//! HMAC-SHA256 of `"{order_id}|{payment_id}"` keyed by the merchant secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex signature for a captured payment.
pub fn sign_payment(order_id: &str, payment_id: &str, secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());

    mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

/// Verify a payment signature. Hex case is ignored.
pub fn verify_payment_signature(order_id: &str, payment_id: &str, signature: &str, secret: &str) -> bool {
    let expected = sign_payment(order_id, payment_id, secret);
    if expected.is_empty() {
        return false;
    }

    constant_time_eq(signature.to_ascii_lowercase().as_bytes(), expected.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        let sig = sign_payment("order_IEIaMR65cu6nz3", "pay_IH4NVgf4Dreq1l", "rzp_test_secret");
        assert_eq!(sig, "1e371aca6da6d519dc3e2773cc8ca6560e73667ca6da2e96e8f0a87e4cf35cad");
    }

    #[test]
    fn test_sign_and_verify() {
        let sig = sign_payment("order_ABC", "pay_XYZ", "rzp_secret");
        assert!(verify_payment_signature("order_ABC", "pay_XYZ", &sig, "rzp_secret"));
        assert!(verify_payment_signature("order_ABC", "pay_XYZ", &sig.to_uppercase(), "rzp_secret"));
    }

    #[test]
    fn test_tampering_is_rejected() {
        let sig = sign_payment("order_ABC", "pay_XYZ", "rzp_secret");

        assert!(!verify_payment_signature("order_ABD", "pay_XYZ", &sig, "rzp_secret"));
        assert!(!verify_payment_signature("order_ABC", "pay_XYY", &sig, "rzp_secret"));
        assert!(!verify_payment_signature("order_ABC", "pay_XYZ", &sig, "other_secret"));
        assert!(!verify_payment_signature("order_ABC", "pay_XYZ", &sig[..63], "rzp_secret"));
        assert!(!verify_payment_signature("order_ABC", "pay_XYZ", "", "rzp_secret"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hello!"));
        assert!(constant_time_eq(b"", b""));
    }
}
