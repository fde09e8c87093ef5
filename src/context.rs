use crate::federation::SignatureVerifier;
use crate::health::Backends;
use crate::jobs::JobQueue;
use std::sync::Arc;

/// Application context containing shared dependencies of the HTTP surface
#[derive(Clone)]
pub struct AppContext {
    pub verifier: SignatureVerifier,
    pub jobs: Arc<dyn JobQueue>,
    /// `None` when running on in-memory backends
    pub backends: Option<Backends>,
}

impl AppContext {
    pub fn new(
        verifier: SignatureVerifier,
        jobs: Arc<dyn JobQueue>,
        backends: Option<Backends>,
    ) -> Self {
        Self {
            verifier,
            jobs,
            backends,
        }
    }
}
