use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Application error type shared by the schedulers and the inbound request path
///
/// Scheduler ticks catch these at the task boundary and log them. Signature
/// failures travel back to the HTTP layer, which turns them into 401s.
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Config(String),

    // ===== HTTP Signature Errors =====
    #[error("Digest header does not match request body")]
    DigestMismatch,

    #[error("Unsupported signature scheme: {0}")]
    SignatureScheme(String),

    #[error("Signature component error: {0}")]
    SignatureComponent(String),

    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    // ===== Validation Errors =====
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    // ===== Discovery Errors =====
    #[error("Discovery index error: {0}")]
    UpstreamDiscovery(String),

    // ===== Database & Storage Errors =====
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ===== HTTP & Serialization Errors =====
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ===== Internal Server Errors =====
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DigestMismatch
            | AppError::SignatureScheme(_)
            | AppError::SignatureComponent(_)
            | AppError::SignatureVerification(_) => StatusCode::UNAUTHORIZED,
            AppError::UpstreamDiscovery(_) | AppError::Reqwest(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::DigestMismatch => "Digest does not match body".to_string(),
            AppError::SignatureScheme(msg) => format!("Unsupported signature: {}", msg),
            AppError::SignatureComponent(msg) => format!("Invalid signature: {}", msg),
            AppError::SignatureVerification(_) => "Signature verification failed".to_string(),
            AppError::UpstreamDiscovery(_) | AppError::Reqwest(_) => {
                "External service error".to_string()
            }
            AppError::Validation(msg) => format!("Validation error: {}", msg),
            AppError::PayloadTooLarge(limit) => format!("Request body exceeds {} bytes", limit),
            AppError::Json(_) => "Malformed JSON".to_string(),
            AppError::Database(_) | AppError::Persistence(_) => "Database error".to_string(),
            AppError::Redis(_) => "Job queue error".to_string(),
            AppError::Config(msg) => format!("Configuration error: {}", msg),
            AppError::Internal(msg) => format!("Internal error: {}", msg),
            _ => "Internal server error".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::DigestMismatch => "DIGEST_MISMATCH",
            AppError::SignatureScheme(_) => "SIGNATURE_SCHEME_ERROR",
            AppError::SignatureComponent(_) => "SIGNATURE_COMPONENT_ERROR",
            AppError::SignatureVerification(_) => "SIGNATURE_VERIFICATION_ERROR",
            AppError::UpstreamDiscovery(_) => "UPSTREAM_DISCOVERY_ERROR",
            AppError::Persistence(_) | AppError::Database(_) => "PERSISTENCE_ERROR",
            AppError::Redis(_) => "REDIS_ERROR",
            AppError::Reqwest(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Json(_) => "JSON_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Whether this error belongs to the HTTP signature family
    pub fn is_authentication_failure(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                error = %self,
                error_code = %code,
                "Authentication failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error occurred"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let error_code = self.error_code();

        // Server errors never expose internal details to the peer
        let response_body = if status.is_server_error() {
            json!({
                "error": "Internal server error",
                "error_code": error_code,
                "status": status.as_u16(),
            })
        } else {
            json!({
                "error": self.user_message(),
                "error_code": error_code,
                "status": status.as_u16(),
            })
        };

        (status, axum::Json(response_body)).into_response()
    }
}

// ============================================================================
// Helper functions for creating common errors
// ============================================================================

impl AppError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        AppError::Config(msg.into())
    }

    /// Create an unsupported-scheme error
    pub fn signature_scheme(msg: impl Into<String>) -> Self {
        AppError::SignatureScheme(msg.into())
    }

    /// Create a missing/invalid signature component error
    pub fn signature_component(msg: impl Into<String>) -> Self {
        AppError::SignatureComponent(msg.into())
    }

    /// Create a cryptographic verification error
    pub fn signature_verification(msg: impl Into<String>) -> Self {
        AppError::SignatureVerification(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Create a discovery index error
    pub fn upstream_discovery(msg: impl Into<String>) -> Self {
        AppError::UpstreamDiscovery(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        AppError::Persistence(msg.into())
    }

    /// Create an internal server error
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_family_maps_to_unauthorized() {
        let errors = [
            AppError::DigestMismatch,
            AppError::signature_scheme("rfc9421"),
            AppError::signature_component("missing host"),
            AppError::signature_verification("bad bytes"),
        ];

        for err in errors {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert!(err.is_authentication_failure());
        }
    }

    #[test]
    fn test_background_errors_are_server_side() {
        assert_eq!(
            AppError::persistence("update failed").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::upstream_discovery("no data").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AppError::config("zero interval").error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_oversized_body_is_not_an_authentication_failure() {
        let err = AppError::PayloadTooLarge(512 * 1024);
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!err.is_authentication_failure());
    }

    #[test]
    fn test_user_message_hides_persistence_details() {
        let err = AppError::persistence("relation \"actor_follow\" does not exist");
        assert_eq!(err.user_message(), "Database error");
    }
}
