//! Request authentication for push notifications.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::notifications::OutlookNotificationBatch;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Hex HMAC-SHA256 of `payload` keyed with `secret`.
pub fn sign(payload: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature` (bare hex or `sha256=<hex>`) against the payload.
/// The comparison is constant time.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let hex_part = signature
        .trim()
        .strip_prefix("sha256=")
        .unwrap_or(signature.trim());
    if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let expected = sign(payload, secret);
    expected
        .as_bytes()
        .ct_eq(hex_part.to_ascii_lowercase().as_bytes())
        .into()
}

/// Every notification in the batch must echo the secret as `clientState`.
/// An empty batch is rejected.
pub fn verify_client_state(batch: &OutlookNotificationBatch, secret: &str) -> bool {
    !batch.value.is_empty()
        && batch.value.iter().all(|n| {
            n.client_state
                .as_deref()
                .is_some_and(|state| bool::from(state.as_bytes().ct_eq(secret.as_bytes())))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::OutlookNotification;

    fn batch(states: &[Option<&str>]) -> OutlookNotificationBatch {
        OutlookNotificationBatch {
            value: states
                .iter()
                .map(|s| OutlookNotification {
                    client_state: s.map(str::to_string),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_signature_round_trip() {
        let sig = sign(b"{\"value\":[]}", "s3cret");
        assert_eq!(sig.len(), 64);
        assert!(verify_signature(b"{\"value\":[]}", &sig, "s3cret"));
        assert!(verify_signature(b"{\"value\":[]}", &format!("sha256={sig}"), "s3cret"));
        assert!(verify_signature(b"{\"value\":[]}", &sig.to_uppercase(), "s3cret"));
    }

    #[test]
    fn test_signature_rejections() {
        let sig = sign(b"payload", "s3cret");
        assert!(!verify_signature(b"payload", &sig, "other"));
        assert!(!verify_signature(b"tampered", &sig, "s3cret"));
        assert!(!verify_signature(b"payload", "", "s3cret"));
        assert!(!verify_signature(b"payload", "abc123", "s3cret"));
        assert!(!verify_signature(b"payload", &"z".repeat(64), "s3cret"));
    }

    #[test]
    fn test_client_state() {
        assert!(verify_client_state(&batch(&[Some("k"), Some("k")]), "k"));
        assert!(!verify_client_state(&batch(&[Some("k"), Some("x")]), "k"));
        assert!(!verify_client_state(&batch(&[Some("k"), None]), "k"));
        assert!(!verify_client_state(&batch(&[]), "k"));
    }
}
