use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use super::PaymentIntent;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signature timestamp outside tolerance")]
    Expired,

    #[error("no matching v1 signature")]
    Mismatch,
}

/// A processor event as delivered to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Decode the event payload as a payment intent, if it is one.
    pub fn payment_intent(&self) -> Option<PaymentIntent> {
        if !self.event_type.starts_with("payment_intent.") {
            return None;
        }
        serde_json::from_value(self.data.object.clone()).ok()
    }
}

/// Verify a `t=<unix>,v1=<hex>[,v1=...]` signature header.
///
/// The signed message is `"{t}.{payload}"`, HMAC-SHA256 keyed with the
/// endpoint secret.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    let signed_at: i64 = timestamp.parse().map_err(|_| SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if now_unix.abs_diff(signed_at) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    for candidate in candidates {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::MalformedHeader)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Produce a signature header for `payload`. Used by tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_payload(payload, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature(payload, &header, SECRET, 1_700_000_010, DEFAULT_TOLERANCE_SECS),
            Ok(())
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign_payload(br#"{"id":"evt_1"}"#, SECRET, 1_700_000_000);
        let result = verify_signature(
            br#"{"id":"evt_2"}"#,
            &header,
            SECRET,
            1_700_000_000,
            DEFAULT_TOLERANCE_SECS,
        );
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = sign_payload(payload, SECRET, 1_700_000_000);
        let result = verify_signature(payload, &header, SECRET, 1_700_001_000, DEFAULT_TOLERANCE_SECS);
        assert_eq!(result, Err(SignatureError::Expired));
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let payload = b"{}";
        let good = sign_payload(payload, SECRET, 1_700_000_000);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1=deadbeef,v0=abc,v1={good_sig}");
        assert_eq!(
            verify_signature(payload, &header, SECRET, 1_700_000_000, DEFAULT_TOLERANCE_SECS),
            Ok(())
        );
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            assert_eq!(
                verify_signature(b"{}", header, SECRET, 1_700_000_000, DEFAULT_TOLERANCE_SECS),
                Err(SignatureError::Expired)
            );
        }
    }

    #[test]
    fn test_non_hex_signature_is_mismatch() {
        let header = "t=1700000000,v1=zz-not-hex";
        assert_eq!(
            verify_signature(b"{}", header, SECRET, 1_700_000_000, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_missing_parts_are_malformed() {
        assert_eq!(
            verify_signature(b"{}", "v1=abcd", SECRET, 0, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(b"{}", "t=0", SECRET, 0, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::MalformedHeader)
        );
    }
}
