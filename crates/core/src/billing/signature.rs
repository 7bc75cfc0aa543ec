//! `x-signature` verification (HMAC-SHA256 over a manifest).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::webhook::SignatureCheck;

type HmacSha256 = Hmac<Sha256>;

/// `ts` and `v1` parts of an `x-signature: ts=<unix>,v1=<hex>` header.
#[must_use]
pub fn parse_signature_header(header: &str) -> Option<(&str, &str)> {
    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim() {
            "ts" => ts = Some(value.trim()),
            "v1" => v1 = Some(value.trim()),
            _ => {}
        }
    }
    Some((ts?, v1?))
}

/// Canonical string the provider signs.
#[must_use]
pub fn manifest(data_id: &str, request_id: &str, ts: &str) -> String {
    format!(
        "id:{};request-id:{request_id};ts:{ts};",
        data_id.to_lowercase()
    )
}

fn keyed(secret: &str, manifest: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(manifest.as_bytes());
    Some(mac)
}

/// Hex HMAC-SHA256 of `manifest`.
#[must_use]
pub fn compute_signature(secret: &str, manifest: &str) -> String {
    keyed(secret, manifest)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Verifies a signature header in constant time.
///
/// `v1` may be bare hex or prefixed with `sha256=`.
#[must_use]
pub fn verify_signature(
    secret: Option<&str>,
    header: Option<&str>,
    request_id: Option<&str>,
    data_id: Option<&str>,
) -> SignatureCheck {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return SignatureCheck::NoSecret;
    };
    let Some((ts, v1)) = header.and_then(parse_signature_header) else {
        return SignatureCheck::Missing;
    };
    let digest = v1.strip_prefix("sha256=").unwrap_or(v1);
    let Ok(expected) = hex::decode(digest) else {
        return SignatureCheck::Invalid;
    };
    let manifest = manifest(
        data_id.unwrap_or_default(),
        request_id.unwrap_or_default(),
        ts,
    );
    let Some(mac) = keyed(secret, &manifest) else {
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

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_signature_header("ts=1704908010,v1=abc123"),
            Some(("1704908010", "abc123"))
        );
        assert_eq!(
            parse_signature_header(" v1=abc , ts=1 "),
            Some(("1", "abc"))
        );
        assert_eq!(parse_signature_header("ts=1"), None);
        assert_eq!(parse_signature_header(""), None);
    }

    #[test]
    fn test_manifest_lowercases_id() {
        assert_eq!(
            manifest("ABC123", "req-1", "1704908010"),
            "id:abc123;request-id:req-1;ts:1704908010;"
        );
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2.
        let mut mac = HmacSha256::new_from_slice(b"Jefe").unwrap();
        mac.update(b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac.finalize().into_bytes()),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        assert_eq!(
            compute_signature("Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_accepts_bare_and_prefixed() {
        let digest = compute_signature(SECRET, &manifest("123", "req-1", "1700"));
        let bare = format!("ts=1700,v1={digest}");
        let prefixed = format!("ts=1700,v1=sha256={digest}");
        for header in [bare, prefixed] {
            assert_eq!(
                verify_signature(Some(SECRET), Some(&header), Some("req-1"), Some("123")),
                SignatureCheck::Valid
            );
        }
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let digest = compute_signature(SECRET, &manifest("123", "req-1", "1700"));
        let header = format!("ts=1700,v1={digest}");
        assert_eq!(
            verify_signature(Some(SECRET), Some(&header), Some("req-1"), Some("124")),
            SignatureCheck::Invalid
        );
        assert_eq!(
            verify_signature(Some("other"), Some(&header), Some("req-1"), Some("123")),
            SignatureCheck::Invalid
        );
        assert_eq!(
            verify_signature(Some(SECRET), Some("ts=1700,v1=nothex"), Some("req-1"), Some("123")),
            SignatureCheck::Invalid
        );
    }

    #[test]
    fn test_verify_missing_inputs() {
        assert_eq!(
            verify_signature(None, Some("ts=1,v1=aa"), None, None),
            SignatureCheck::NoSecret
        );
        assert_eq!(
            verify_signature(Some(SECRET), None, None, Some("1")),
            SignatureCheck::Missing
        );
    }
}
