use super::verifier::InboundRequest;
use axum::http::{HeaderMap, Method};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use trellis_error::{AppError, AppResult};

/// Algorithms of the draft-cavage family
const DRAFT_ALGORITHMS: [&str; 3] = ["hs2019", "rsa-sha256", "ed25519"];

/// Parsed draft signature of one inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContext {
    pub key_id: String,
    /// Declared algorithm, lowercased. `None` when the peer did not declare one.
    pub algorithm: Option<String>,
    pub method: Method,
    /// Signed components in signing order, lowercased
    pub headers: Vec<String>,
    pub created: Option<i64>,
    pub expires: Option<i64>,
    pub signing_string: String,
    pub signature: Vec<u8>,
}

/// Raw signature parameters, from `Signature: ...` or
/// `Authorization: Signature ...`
pub fn signature_header(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get("signature").and_then(|v| v.to_str().ok()) {
        return Some(value);
    }

    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, params) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("Signature").then_some(params)
        })
}

/// Components a signature must cover for `method`
pub fn required_components(method: &Method) -> &'static [&'static str] {
    if method == Method::POST {
        &["(request-target)", "host", "digest"]
    } else {
        &["(request-target)", "host"]
    }
}

/// Parse and validate the draft signature of `request`
///
/// Checks the scheme, required components, creation time and expiry. The
/// signature bytes are not verified here.
pub fn parse_signature(
    request: &InboundRequest,
    clock_skew_secs: u64,
    now: DateTime<Utc>,
) -> AppResult<SignatureContext> {
    if request.headers.contains_key("signature-input") {
        return Err(AppError::signature_scheme(
            "only the draft version of HTTP signature is supported",
        ));
    }

    let raw = signature_header(&request.headers)
        .ok_or_else(|| AppError::signature_component("missing signature header"))?;
    let params = parse_params(raw);

    let key_id = params
        .get("keyid")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::signature_component("signature has no keyId"))?
        .to_string();

    let algorithm = params.get("algorithm").map(|a| a.to_ascii_lowercase());
    if let Some(algorithm) = &algorithm {
        if !DRAFT_ALGORITHMS.contains(&algorithm.as_str()) {
            return Err(AppError::signature_scheme(format!(
                "unsupported signature algorithm {}",
                algorithm
            )));
        }
    }

    let signature = params
        .get("signature")
        .ok_or_else(|| AppError::signature_component("signature has no signature value"))
        .and_then(|s| {
            BASE64
                .decode(s.as_bytes())
                .map_err(|_| AppError::signature_component("signature value is not base64"))
        })?;

    let headers: Vec<String> = params
        .get("headers")
        .map(|h| h.as_str())
        .unwrap_or("date")
        .split_whitespace()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    for required in required_components(&request.method) {
        if !headers.iter().any(|h| h == required) {
            return Err(AppError::signature_component(format!(
                "{} must be included in signature",
                required
            )));
        }
    }
    if !headers.iter().any(|h| h == "date" || h == "(created)") {
        return Err(AppError::signature_component(
            "date or (created) must be included in signature",
        ));
    }

    let created = parse_timestamp(&params, "created")?;
    let expires = parse_timestamp(&params, "expires")?;

    // Only timestamps covered by the signature bound its age
    if headers.iter().any(|h| h == "(created)") {
        let created = created.ok_or_else(|| {
            AppError::signature_component("(created) is signed but no created parameter")
        })?;
        check_clock_skew(created, clock_skew_secs, now)?;
    }
    if headers.iter().any(|h| h == "date") {
        check_clock_skew(signed_date(&request.headers)?, clock_skew_secs, now)?;
    }

    if let Some(expires) = expires {
        if expires < now.timestamp() {
            return Err(AppError::signature_component("signature has expired"));
        }
    }

    let signing_string = signing_string(
        &request.method,
        &request.path_and_query,
        &request.headers,
        &headers,
        created,
        expires,
    )?;

    Ok(SignatureContext {
        key_id,
        algorithm,
        method: request.method.clone(),
        headers,
        created,
        expires,
        signing_string,
        signature,
    })
}

/// Canonical string covered by a draft signature
pub fn signing_string(
    method: &Method,
    path_and_query: &str,
    headers: &HeaderMap,
    signed_headers: &[String],
    created: Option<i64>,
    expires: Option<i64>,
) -> AppResult<String> {
    let mut lines = Vec::with_capacity(signed_headers.len());

    for name in signed_headers {
        let value = match name.as_str() {
            "(request-target)" => format!(
                "{} {}",
                method.as_str().to_ascii_lowercase(),
                path_and_query
            ),
            "(created)" => created
                .ok_or_else(|| {
                    AppError::signature_component("(created) is signed but no created parameter")
                })?
                .to_string(),
            "(expires)" => expires
                .ok_or_else(|| {
                    AppError::signature_component("(expires) is signed but no expires parameter")
                })?
                .to_string(),
            header => {
                let values: Vec<&str> = headers
                    .get_all(header)
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::trim)
                    .collect();
                if values.is_empty() {
                    return Err(AppError::signature_component(format!(
                        "signed header {} is missing",
                        header
                    )));
                }
                values.join(", ")
            }
        };
        lines.push(format!("{}: {}", name, value));
    }

    Ok(lines.join("\n"))
}

// keyId="...",algorithm="...",headers="...",signature="..."
// Keys are case-insensitive; commas inside quotes belong to the value.
fn parse_params(raw: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    for part in parts {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        params.insert(key.trim().to_ascii_lowercase(), value.to_string());
    }

    params
}

fn parse_timestamp(params: &HashMap<String, String>, name: &str) -> AppResult<Option<i64>> {
    params
        .get(name)
        .map(|raw| {
            // Some implementations send fractional seconds
            raw.split('.')
                .next()
                .and_then(|secs| secs.parse::<i64>().ok())
                .ok_or_else(|| {
                    AppError::signature_component(format!("{} parameter is not a timestamp", name))
                })
        })
        .transpose()
}

fn signed_date(headers: &HeaderMap) -> AppResult<i64> {
    let raw = headers
        .get("date")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::signature_component("date header is missing"))?;

    let date = httpdate::parse_http_date(raw)
        .map_err(|_| AppError::signature_component("date header is not an HTTP date"))?;

    Ok(DateTime::<Utc>::from(date).timestamp())
}

fn check_clock_skew(signed_at: i64, clock_skew_secs: u64, now: DateTime<Utc>) -> AppResult<()> {
    let skew = i64::try_from(clock_skew_secs).unwrap_or(i64::MAX);
    let distance = now.timestamp().saturating_sub(signed_at);

    if distance > skew {
        return Err(AppError::signature_component("signature is too old"));
    }
    if distance < -skew {
        return Err(AppError::signature_component(
            "signature was created in the future",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use bytes::Bytes;

    const NOW: i64 = 1_760_000_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }

    fn http_date(ts: i64) -> String {
        httpdate::fmt_http_date(
            std::time::UNIX_EPOCH + std::time::Duration::from_secs(ts as u64),
        )
    }

    fn request(method: Method, signature: &str, date_ts: i64) -> InboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("local.example"));
        headers.insert("date", HeaderValue::from_str(&http_date(date_ts)).unwrap());
        headers.insert("digest", HeaderValue::from_static("SHA-256=AAAA"));
        headers.insert("signature", HeaderValue::from_str(signature).unwrap());
        InboundRequest {
            method,
            path_and_query: "/inbox".to_string(),
            headers,
            body: Bytes::new(),
        }
    }

    const POST_SIGNATURE: &str = r#"keyId="https://a.example/accounts/peertube#main-key",algorithm="rsa-sha256",headers="(request-target) host date digest",signature="AAAA""#;

    #[test]
    fn test_parse_post_signature() {
        let ctx = parse_signature(&request(Method::POST, POST_SIGNATURE, NOW), 300, now()).unwrap();

        assert_eq!(ctx.key_id, "https://a.example/accounts/peertube#main-key");
        assert_eq!(ctx.algorithm.as_deref(), Some("rsa-sha256"));
        assert_eq!(
            ctx.signing_string,
            format!(
                "(request-target): post /inbox\nhost: local.example\ndate: {}\ndigest: SHA-256=AAAA",
                http_date(NOW)
            )
        );
    }

    #[test]
    fn test_post_without_digest_component_is_rejected() {
        let signature = r#"keyId="k",headers="(request-target) host date",signature="AAAA""#;
        let err = parse_signature(&request(Method::POST, signature, NOW), 300, now()).unwrap_err();
        assert!(matches!(err, AppError::SignatureComponent(_)));

        // The same set is enough for GET
        assert!(parse_signature(&request(Method::GET, signature, NOW), 300, now()).is_ok());
    }

    #[test]
    fn test_missing_date_and_created_is_rejected() {
        let signature = r#"keyId="k",headers="(request-target) host",signature="AAAA""#;
        let err = parse_signature(&request(Method::GET, signature, NOW), 300, now()).unwrap_err();
        assert!(matches!(err, AppError::SignatureComponent(_)));
    }

    #[test]
    fn test_signature_input_is_scheme_error() {
        let mut req = request(Method::POST, POST_SIGNATURE, NOW);
        req.headers.insert(
            "signature-input",
            HeaderValue::from_static(r#"sig1=("@method");created=1"#),
        );
        let err = parse_signature(&req, 300, now()).unwrap_err();
        assert!(matches!(err, AppError::SignatureScheme(_)));
    }

    #[test]
    fn test_unknown_algorithm_is_scheme_error() {
        let signature = r#"keyId="k",algorithm="hmac-sha256",headers="(request-target) host date",signature="AAAA""#;
        let err = parse_signature(&request(Method::GET, signature, NOW), 300, now()).unwrap_err();
        assert!(matches!(err, AppError::SignatureScheme(_)));
    }

    #[test]
    fn test_clock_skew_applies_both_ways() {
        let signature = r#"keyId="k",headers="(request-target) host date",signature="AAAA""#;

        for offset in [-301, 301] {
            let err = parse_signature(&request(Method::GET, signature, NOW + offset), 300, now())
                .unwrap_err();
            assert!(matches!(err, AppError::SignatureComponent(_)));
        }
        for offset in [-300, 0, 300] {
            assert!(
                parse_signature(&request(Method::GET, signature, NOW + offset), 300, now()).is_ok()
            );
        }
    }

    #[test]
    fn test_unsigned_created_does_not_refresh_old_date() {
        let signature = format!(
            r#"keyId="k",created={},headers="(request-target) host date",signature="AAAA""#,
            NOW
        );
        let err = parse_signature(&request(Method::GET, &signature, NOW - 86_400), 300, now())
            .unwrap_err();
        assert!(matches!(err, AppError::SignatureComponent(_)));
    }

    #[test]
    fn test_both_signed_timestamps_are_checked() {
        let signature = format!(
            r#"keyId="k",created={},headers="(request-target) (created) host date",signature="AAAA""#,
            NOW
        );
        let err = parse_signature(&request(Method::GET, &signature, NOW - 86_400), 300, now())
            .unwrap_err();
        assert!(matches!(err, AppError::SignatureComponent(_)));
    }

    #[test]
    fn test_signed_created_is_used_when_date_is_not_signed() {
        let signature = format!(
            r#"keyId="k",algorithm="hs2019",created={},headers="(request-target) (created) host",signature="AAAA""#,
            NOW - 10
        );
        // Date header far in the past is not consulted
        let ctx =
            parse_signature(&request(Method::GET, &signature, NOW - 10_000), 300, now()).unwrap();

        assert_eq!(ctx.created, Some(NOW - 10));
        assert!(ctx.signing_string.contains(&format!("(created): {}", NOW - 10)));
    }

    #[test]
    fn test_expired_signature_is_rejected() {
        let signature = format!(
            r#"keyId="k",created={},expires={},headers="(request-target) (created) host",signature="AAAA""#,
            NOW - 10,
            NOW - 1
        );
        let err = parse_signature(&request(Method::GET, &signature, NOW), 300, now()).unwrap_err();
        assert!(matches!(err, AppError::SignatureComponent(_)));
    }

    #[test]
    fn test_authorization_header_form() {
        let mut req = request(Method::GET, "", NOW);
        req.headers.remove("signature");
        req.headers.insert(
            "authorization",
            HeaderValue::from_static(
                r#"Signature keyId="k",headers="(request-target) host date",signature="AAAA""#,
            ),
        );

        let ctx = parse_signature(&req, 300, now()).unwrap();
        assert_eq!(ctx.key_id, "k");
    }

    #[test]
    fn test_missing_signed_header_is_component_error() {
        let signature = r#"keyId="k",headers="(request-target) host date accept",signature="AAAA""#;
        let err = parse_signature(&request(Method::GET, signature, NOW), 300, now()).unwrap_err();
        assert!(matches!(err, AppError::SignatureComponent(_)));
    }

    #[test]
    fn test_params_keep_quoted_commas() {
        let params = parse_params(r#"keyId="https://a.example/x,y#k", signature="AA==""#);
        assert_eq!(params["keyid"], "https://a.example/x,y#k");
        assert_eq!(params["signature"], "AA==");
    }
}
