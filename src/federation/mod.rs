// ============================================================================
// Federation Module - Inbound request authentication
// ============================================================================
//
// Peers sign their deliveries with draft-cavage HTTP signatures. Checks run in
// a fixed order:
// 1. body digest (when both Signature and Digest are present)
// 2. signature parameters, required components and clock skew
// 3. cryptographic verification against the signer's stored public key
//
// RFC 9421 message signatures are not supported.
//
// ============================================================================

mod digest;
mod keys;
mod signature;
mod verifier;

pub use digest::{build_digest, check_digest, digest_matches};
pub use keys::PeerPublicKey;
pub use signature::{
    SignatureContext, parse_signature, required_components, signature_header, signing_string,
};
pub use verifier::{InboundRequest, SignatureVerifier};
