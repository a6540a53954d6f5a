//! `X-Hub-Signature` signing and verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature";

const SHA256_PREFIX: &str = "sha256=";

/// Header value Twitch would send for `body` signed with `secret`
pub fn sign(secret: &[u8], body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(format!("{}{}", SHA256_PREFIX, hex::encode(mac.finalize().into_bytes())))
}

/// Check a `sha256=<hex>` header value against the body in constant time
pub fn verify(secret: &[u8], body: &[u8], header: &str) -> bool {
    let Some(hex_digest) = header.trim().strip_prefix(SHA256_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compare a presented bearer token with the configured one in constant time
pub fn tokens_match(expected: &str, presented: &str) -> bool {
    let tag = |token: &str| {
        HmacSha256::new_from_slice(expected.as_bytes()).ok().map(|mut mac| {
            mac.update(token.as_bytes());
            mac.finalize()
        })
    };
    match (tag(expected), tag(presented)) {
        (Some(expected_tag), Some(presented_tag)) => expected_tag == presented_tag,
        _ => false,
    }
}
