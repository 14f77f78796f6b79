//! Webhook HMAC-SHA256 signing and verification.
//!
//! Header format: `sha256=<lowercase hex of HMAC-SHA256(secret, payload)>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Sign `payload` with `secret`, producing the `X-Signature-256` header value.
///
/// Empty secrets and empty payloads are valid inputs.
pub fn sign(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    format!("{SIGNATURE_PREFIX}{}", hex::encode(digest))
}

/// Check `candidate` against the signature of `payload` under `secret`.
///
/// The comparison runs in constant time with respect to the header contents.
pub fn verify(secret: &[u8], payload: &[u8], candidate: &str) -> bool {
    let expected = sign(secret, payload);
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}
