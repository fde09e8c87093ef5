use super::signature::signature_header;
use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};
use trellis_error::{AppError, AppResult};

/// `SHA-256=` followed by the base64 SHA-256 of `body`
pub fn build_digest(body: &[u8]) -> String {
    format!("SHA-256={}", BASE64.encode(Sha256::digest(body)))
}

/// Whether a `Digest` header value vouches for `body`
///
/// The header may list several digests separated by commas; one matching
/// SHA-256 entry is enough. Algorithm names are case-insensitive.
pub fn digest_matches(claimed: &str, body: &[u8]) -> bool {
    let expected = BASE64.encode(Sha256::digest(body));

    claimed.split(',').any(|entry| {
        entry
            .trim()
            .split_once('=')
            .is_some_and(|(algorithm, value)| {
                algorithm.trim().eq_ignore_ascii_case("SHA-256") && value.trim() == expected
            })
    })
}

/// Reject a signed request whose body does not match its `Digest`
///
/// Requests without a signature or without a digest pass; the signature
/// checks decide whether a digest was required.
pub fn check_digest(headers: &HeaderMap, body: &[u8]) -> AppResult<()> {
    let Some(claimed) = headers.get("digest") else {
        return Ok(());
    };
    if signature_header(headers).is_none() {
        return Ok(());
    }

    let claimed = claimed.to_str().map_err(|_| AppError::DigestMismatch)?;
    if digest_matches(claimed, body) {
        Ok(())
    } else {
        Err(AppError::DigestMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_build_digest_known_value() {
        // sha256("") = e3b0c442...
        assert_eq!(
            build_digest(b""),
            "SHA-256=47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn test_digest_matches_variants() {
        let body = br#"{"type":"Follow"}"#;
        let digest = build_digest(body);
        let value = digest.trim_start_matches("SHA-256=");

        assert!(digest_matches(&digest, body));
        assert!(digest_matches(&format!("sha-256={}", value), body));
        assert!(digest_matches(
            &format!("SHA-512=AAAA, SHA-256={}", value),
            body
        ));
        assert!(!digest_matches(&digest, b"{}"));
        assert!(!digest_matches("SHA-512=AAAA", body));
        assert!(!digest_matches("garbage", body));
    }

    #[test]
    fn test_unsigned_request_skips_digest() {
        let mut headers = HeaderMap::new();
        headers.insert("digest", HeaderValue::from_static("SHA-256=AAAA"));

        assert!(check_digest(&headers, b"body").is_ok());
    }

    #[test]
    fn test_signed_request_with_wrong_digest_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("digest", HeaderValue::from_static("SHA-256=AAAA"));
        headers.insert(
            "signature",
            HeaderValue::from_static(r#"keyId="k",headers="date",signature="AA==""#),
        );

        let err = check_digest(&headers, b"body").unwrap_err();
        assert!(matches!(err, AppError::DigestMismatch));
    }

    #[test]
    fn test_authorization_signature_counts_as_signed() {
        let mut headers = HeaderMap::new();
        headers.insert("digest", HeaderValue::from_static("SHA-256=AAAA"));
        headers.insert(
            "authorization",
            HeaderValue::from_static(r#"Signature keyId="k",signature="AA==""#),
        );

        assert!(check_digest(&headers, b"body").is_err());
    }
}
