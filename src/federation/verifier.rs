use super::digest::check_digest;
use super::keys::PeerPublicKey;
use super::signature::{SignatureContext, parse_signature};
use crate::metrics;
use crate::store::{ActorStore, PeerIdentity};
use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use trellis_config::DEFAULT_HTTP_SIGNATURE_CLOCK_SKEW_SECS;
use trellis_error::{AppError, AppResult};

/// The parts of an inbound request that signatures cover
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path plus query string, as sent on the request line
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Authenticates inbound federation requests
///
/// Holds no per-request state; one instance serves every request.
#[derive(Clone)]
pub struct SignatureVerifier {
    actors: Arc<dyn ActorStore>,
    clock_skew_secs: u64,
}

impl SignatureVerifier {
    /// `clock_skew_secs` of `None` uses the default window
    pub fn new(actors: Arc<dyn ActorStore>, clock_skew_secs: Option<u64>) -> Self {
        Self {
            actors,
            clock_skew_secs: clock_skew_secs.unwrap_or(DEFAULT_HTTP_SIGNATURE_CLOCK_SKEW_SECS),
        }
    }

    pub fn clock_skew_secs(&self) -> u64 {
        self.clock_skew_secs
    }

    /// Digest check, signature parse, signer lookup and verification, in order
    pub async fn authenticate(&self, request: &InboundRequest) -> AppResult<PeerIdentity> {
        match self.authenticate_inner(request).await {
            Ok(peer) => {
                metrics::SIGNATURES_VERIFIED_TOTAL.inc();
                Ok(peer)
            }
            Err(err) => {
                metrics::SIGNATURE_FAILURES_TOTAL
                    .with_label_values(&[failure_reason(&err)])
                    .inc();
                Err(err)
            }
        }
    }

    async fn authenticate_inner(&self, request: &InboundRequest) -> AppResult<PeerIdentity> {
        check_digest(&request.headers, &request.body)?;

        let context = parse_signature(request, self.clock_skew_secs, Utc::now())?;

        let peer = self
            .actors
            .find_by_key_id(&context.key_id)
            .await
            .map_err(|e| AppError::persistence(format!("looking up signer: {:#}", e)))?
            .ok_or_else(|| {
                AppError::signature_verification(format!("unknown key id {}", context.key_id))
            })?;

        if !self.verify_signature(&context, &peer) {
            return Err(AppError::signature_verification(format!(
                "invalid signature for key id {}",
                context.key_id
            )));
        }

        Ok(peer)
    }

    /// Check the signature bytes of `context` against `peer`'s public key
    ///
    /// Never fails: every problem is logged at debug level and reported as
    /// `false`.
    pub fn verify_signature(&self, context: &SignatureContext, peer: &PeerIdentity) -> bool {
        if !peer.matches_key_id(&context.key_id) {
            tracing::debug!(
                key_id = %context.key_id,
                actor = %peer.url,
                "Signature key id does not belong to actor"
            );
            return false;
        }

        let key = match PeerPublicKey::from_pem(&peer.public_key_pem) {
            Ok(key) => key,
            Err(reason) => {
                tracing::debug!(actor = %peer.url, reason = %reason, "Cannot load actor public key");
                return false;
            }
        };

        if !key.accepts_algorithm(context.algorithm.as_deref()) {
            tracing::debug!(
                actor = %peer.url,
                algorithm = ?context.algorithm,
                key_type = key.kind(),
                "Declared algorithm does not match actor key"
            );
            return false;
        }

        match key.verify(context.signing_string.as_bytes(), &context.signature) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(actor = %peer.url, reason = %reason, "Error in verify draft signature");
                false
            }
        }
    }
}

fn failure_reason(err: &AppError) -> &'static str {
    match err {
        AppError::DigestMismatch => "digest",
        AppError::SignatureScheme(_) => "scheme",
        AppError::SignatureComponent(_) => "component",
        AppError::SignatureVerification(_) => "verification",
        _ => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::{build_digest, signing_string};
    use crate::store::{MemoryStore, NewActor};
    use axum::http::HeaderValue;
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use ed25519_dalek::pkcs8::EncodePublicKey;
    use rsa::pkcs8::LineEnding;
    use std::time::{Duration, SystemTime};

    const KEY_ID: &str = "https://a.example/accounts/peertube#main-key";

    fn signed_post(signing: &ed25519_dalek::SigningKey, body: &'static [u8]) -> InboundRequest {
        signed_post_at(signing, body, SystemTime::now())
    }

    fn signed_post_at(
        signing: &ed25519_dalek::SigningKey,
        body: &'static [u8],
        date: SystemTime,
    ) -> InboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("local.example"));
        headers.insert(
            "date",
            HeaderValue::from_str(&httpdate::fmt_http_date(date)).unwrap(),
        );
        headers.insert(
            "digest",
            HeaderValue::from_str(&build_digest(body)).unwrap(),
        );

        let signed: Vec<String> = ["(request-target)", "host", "date", "digest"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let to_sign =
            signing_string(&Method::POST, "/inbox", &headers, &signed, None, None).unwrap();
        let signature = ed25519_dalek::Signer::sign(signing, to_sign.as_bytes());

        headers.insert(
            "signature",
            HeaderValue::from_str(&format!(
                r#"keyId="{}",algorithm="hs2019",headers="{}",signature="{}""#,
                KEY_ID,
                signed.join(" "),
                BASE64.encode(signature.to_bytes())
            ))
            .unwrap(),
        );

        InboundRequest {
            method: Method::POST,
            path_and_query: "/inbox".to_string(),
            headers,
            body: Bytes::from_static(body),
        }
    }

    async fn verifier_with_peer(signing: &ed25519_dalek::SigningKey) -> SignatureVerifier {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_actor(NewActor {
                preferred_username: "peertube".to_string(),
                url: "https://a.example/accounts/peertube".to_string(),
                key_id: KEY_ID.to_string(),
                public_key_pem: signing
                    .verifying_key()
                    .to_public_key_pem(LineEnding::LF)
                    .unwrap(),
                inbox_url: "https://a.example/accounts/peertube/inbox".to_string(),
                shared_inbox_url: Some("https://a.example/inbox".to_string()),
                host: Some("a.example".to_string()),
            })
            .await
            .unwrap();
        SignatureVerifier::new(store, None)
    }

    #[tokio::test]
    async fn test_valid_ed25519_signature_authenticates() {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let verifier = verifier_with_peer(&signing).await;

        let peer = verifier
            .authenticate(&signed_post(&signing, br#"{"type":"Follow"}"#))
            .await
            .unwrap();
        assert_eq!(peer.host.as_deref(), Some("a.example"));
    }

    #[tokio::test]
    async fn test_body_tampering_fails_digest_before_parse() {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let verifier = verifier_with_peer(&signing).await;

        let mut request = signed_post(&signing, br#"{"type":"Follow"}"#);
        request.body = Bytes::from_static(br#"{"type":"Delete"}"#);
        // Would also be a scheme error if it got that far
        request.headers.insert(
            "signature-input",
            HeaderValue::from_static(r#"sig1=("@method")"#),
        );

        let err = verifier.authenticate(&request).await.unwrap_err();
        assert!(matches!(err, AppError::DigestMismatch));
    }

    #[tokio::test]
    async fn test_replay_with_unsigned_created_is_rejected() {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let verifier = verifier_with_peer(&signing).await;
        let day_ago = SystemTime::now() - Duration::from_secs(86_400);

        let captured = signed_post_at(&signing, b"{}", day_ago);
        let err = verifier.authenticate(&captured).await.unwrap_err();
        assert!(matches!(err, AppError::SignatureComponent(_)));

        let mut replayed = captured;
        let signature = replayed.headers["signature"].to_str().unwrap().to_string();
        replayed.headers.insert(
            "signature",
            HeaderValue::from_str(&format!("{},created={}", signature, Utc::now().timestamp()))
                .unwrap(),
        );
        let err = verifier.authenticate(&replayed).await.unwrap_err();
        assert!(matches!(err, AppError::SignatureComponent(_)));
    }

    #[tokio::test]
    async fn test_wrong_key_fails_verification() {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let other = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let verifier = verifier_with_peer(&other).await;

        let err = verifier
            .authenticate(&signed_post(&signing, b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SignatureVerification(_)));
    }

    #[tokio::test]
    async fn test_unknown_signer_fails_verification() {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let verifier = SignatureVerifier::new(Arc::new(MemoryStore::new()), Some(30));

        let err = verifier
            .authenticate(&signed_post(&signing, b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SignatureVerification(_)));
    }

    #[tokio::test]
    async fn test_verify_signature_rejects_foreign_key_id() {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let verifier = verifier_with_peer(&signing).await;
        let request = signed_post(&signing, b"{}");
        let context = parse_signature(&request, 300, Utc::now()).unwrap();

        let peer = verifier
            .actors
            .find_by_key_id(KEY_ID)
            .await
            .unwrap()
            .unwrap();
        assert!(verifier.verify_signature(&context, &peer));

        let impostor = PeerIdentity {
            url: "https://b.example/accounts/peertube".to_string(),
            key_id: "https://b.example/accounts/peertube#main-key".to_string(),
            ..peer
        };
        assert!(!verifier.verify_signature(&context, &impostor));
    }

    #[test]
    fn test_default_clock_skew() {
        let verifier = SignatureVerifier::new(Arc::new(MemoryStore::new()), None);
        assert_eq!(verifier.clock_skew_secs(), DEFAULT_HTTP_SIGNATURE_CLOCK_SKEW_SECS);
    }
}
