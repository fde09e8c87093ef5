// ============================================================================
// Axum Extractors
// ============================================================================
//
// - SignedPeer: the actor whose HTTP signature was verified by the
//   verify_http_signature middleware
//
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::store::PeerIdentity;
use trellis_error::AppError;

/// Verified signer of the current request
///
/// Only available behind `verify_http_signature`; elsewhere extraction fails
/// with 401.
#[derive(Debug, Clone)]
pub struct SignedPeer(pub PeerIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for SignedPeer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SignedPeer>()
            .cloned()
            .ok_or_else(|| AppError::signature_verification("request is not signed"))
    }
}
