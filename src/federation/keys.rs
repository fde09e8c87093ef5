use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;

/// Public key of a peer actor, detected from its PEM
#[derive(Debug, Clone)]
pub enum PeerPublicKey {
    Rsa(rsa::pkcs1v15::VerifyingKey<Sha256>),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PeerPublicKey {
    /// Accepts SPKI (`BEGIN PUBLIC KEY`) for both key types and PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`) for RSA
    pub fn from_pem(pem: &str) -> Result<Self, String> {
        let pem = pem.trim();

        if let Ok(key) = <RsaPublicKey as rsa::pkcs8::DecodePublicKey>::from_public_key_pem(pem) {
            return Ok(Self::Rsa(rsa::pkcs1v15::VerifyingKey::new(key)));
        }
        if let Ok(key) = RsaPublicKey::from_pkcs1_pem(pem) {
            return Ok(Self::Rsa(rsa::pkcs1v15::VerifyingKey::new(key)));
        }

        <ed25519_dalek::VerifyingKey as ed25519_dalek::pkcs8::DecodePublicKey>::from_public_key_pem(
            pem,
        )
        .map(Self::Ed25519)
        .map_err(|e| format!("unsupported public key: {}", e))
    }

    /// Whether a declared draft algorithm can be used with this key
    ///
    /// `hs2019` leaves the choice to the key.
    pub fn accepts_algorithm(&self, algorithm: Option<&str>) -> bool {
        match (self, algorithm) {
            (_, None) | (_, Some("hs2019")) => true,
            (Self::Rsa(_), Some("rsa-sha256")) => true,
            (Self::Ed25519(_), Some("ed25519")) => true,
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "rsa",
            Self::Ed25519(_) => "ed25519",
        }
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), String> {
        match self {
            Self::Rsa(key) => {
                let signature = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|e| format!("malformed RSA signature: {}", e))?;
                key.verify(message, &signature)
                    .map_err(|_| "RSA signature does not match".to_string())
            }
            Self::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|e| format!("malformed Ed25519 signature: {}", e))?;
                key.verify_strict(message, &signature)
                    .map_err(|_| "Ed25519 signature does not match".to_string())
            }
        }
    }
}
