//! Push webhook signature verification.
//!
//! The sender signs the raw request body with HMAC-SHA256 keyed by the shared
//! secret and sends `sha256=<lowercase hex>` in the `X-Hub-Signature-256`
//! header.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Prefix in front of the hex digest.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the signature header value expected for `body`.
///
/// Returns `None` only if the HMAC cannot be keyed with `secret`.
pub fn expected_signature(secret: &[u8], body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);

    Some(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a push webhook signature.
///
/// # Arguments
///
/// * `secret` - The shared webhook secret
/// * `body` - The request body exactly as received
/// * `signature` - The `X-Hub-Signature-256` header value
///
/// # Returns
///
/// `true` if the signature matches, `false` for anything else, including
/// empty or malformed signatures.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    if signature.is_empty() {
        warn!("webhook_signature_empty");
        return false;
    }

    let digest = match signature.strip_prefix(SIGNATURE_PREFIX) {
        Some(d) if is_lowercase_hex(d) => d,
        _ => {
            warn!(
                actual_length = signature.len(),
                has_prefix = signature.starts_with(SIGNATURE_PREFIX),
                "webhook_signature_malformed"
            );
            return false;
        }
    };

    let digest = match hex::decode(digest) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "webhook_signature_malformed");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };
    mac.update(body);

    // verify_slice compares in constant time
    let valid = mac.verify_slice(&digest).is_ok();

    if !valid {
        warn!(actual_length = digest.len(), "webhook_signature_mismatch");
    }

    valid
}

fn is_lowercase_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
