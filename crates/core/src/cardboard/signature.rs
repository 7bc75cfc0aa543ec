//! Card-board webhook signatures: base64 HMAC-SHA1 over the raw body
//! followed by the registered callback URL.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::webhook::SignatureCheck;

type HmacSha1 = Hmac<Sha1>;

fn keyed(secret: &str, body: &[u8], callback_url: Option<&str>) -> Option<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    if let Some(url) = callback_url {
        mac.update(url.as_bytes());
    }
    Some(mac)
}

/// Computes the base64 signature of a body.
#[must_use]
pub fn compute_card_signature(secret: &str, body: &[u8], callback_url: Option<&str>) -> String {
    keyed(secret, body, callback_url)
        .map(|mac| STANDARD.encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Verifies the `x-trello-webhook` header in constant time.
#[must_use]
pub fn verify_card_signature(
    secret: Option<&str>,
    header: Option<&str>,
    body: &[u8],
    callback_url: Option<&str>,
) -> SignatureCheck {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return SignatureCheck::NoSecret;
    };
    let Some(header) = header.map(str::trim).filter(|h| !h.is_empty()) else {
        return SignatureCheck::Missing;
    };
    let Ok(expected) = STANDARD.decode(header) else {
        return SignatureCheck::Invalid;
    };
    let Some(mac) = keyed(secret, body, callback_url) else {
        return SignatureCheck::Invalid;
    };
    if mac.verify_slice(&expected).is_ok() {
        SignatureCheck::Valid
    } else {
        SignatureCheck::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "board-secret";
    const CALLBACK: &str = "https://api.tesoro.test/api/v1/webhooks/trello";

    #[test]
    fn test_known_vector() {
        // RFC 2202 test case 2.
        assert_eq!(
            compute_card_signature("Jefe", b"what do ya want for nothing?", None),
            "7/zfauXrL6LSdBbV8YTfnCWafHk="
        );
    }

    #[test]
    fn test_round_trip_with_callback() {
        let body = br#"{"action":{"id":"a1"}}"#;
        let signature = compute_card_signature(SECRET, body, Some(CALLBACK));
        assert_eq!(
            verify_card_signature(Some(SECRET), Some(&signature), body, Some(CALLBACK)),
            SignatureCheck::Valid
        );
        assert_eq!(
            verify_card_signature(Some(SECRET), Some(&signature), body, None),
            SignatureCheck::Invalid
        );
    }

    #[test]
    fn test_tampered_body_or_wrong_secret_is_invalid() {
        let body = br#"{"action":{"id":"a1"}}"#;
        let signature = compute_card_signature(SECRET, body, Some(CALLBACK));
        assert_eq!(
            verify_card_signature(Some(SECRET), Some(&signature), b"{}", Some(CALLBACK)),
            SignatureCheck::Invalid
        );
        assert_eq!(
            verify_card_signature(Some("other"), Some(&signature), body, Some(CALLBACK)),
            SignatureCheck::Invalid
        );
    }

    #[test]
    fn test_missing_and_garbage() {
        assert_eq!(
            verify_card_signature(Some(SECRET), None, b"{}", None),
            SignatureCheck::Missing
        );
        assert_eq!(
            verify_card_signature(Some(SECRET), Some("%%%"), b"{}", None),
            SignatureCheck::Invalid
        );
        assert_eq!(
            verify_card_signature(None, Some("abc"), b"{}", None),
            SignatureCheck::NoSecret
        );
    }
}
