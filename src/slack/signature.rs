//! Slack request signing (`X-Slack-Signature`).
//!
//! The signature is `v0=` followed by the hex HMAC-SHA256 of
//! `v0:{timestamp}:{body}` keyed with the app's signing secret.

use anyhow::{Result, bail};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Requests older (or newer) than this are treated as replays.
pub const MAX_SKEW_SECS: i64 = 60 * 5;

const VERSION: &str = "v0";

fn mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid signing secret: {e}"))?;
    mac.update(format!("{VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    Ok(mac)
}

/// Compute the header value Slack would send for this body.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String> {
    let digest = mac(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("{VERSION}={}", hex::encode(digest)))
}

/// Check a request's signature headers against the signing secret.
pub fn verify(secret: &str, timestamp: &str, body: &[u8], signature: &str, now: i64) -> Result<()> {
    let sent_at: i64 = timestamp
        .parse()
        .map_err(|_| anyhow::anyhow!("malformed request timestamp: {timestamp}"))?;
    if (now - sent_at).abs() > MAX_SKEW_SECS {
        bail!("request timestamp {timestamp} is outside the allowed window");
    }

    let Some(hex_digest) = signature.strip_prefix("v0=") else {
        bail!("unsupported signature version");
    };
    let expected = hex::decode(hex_digest).map_err(|_| anyhow::anyhow!("malformed signature"))?;
    mac(secret, timestamp, body)?
        .verify_slice(&expected)
        .map_err(|_| anyhow::anyhow!("signature mismatch"))
}
