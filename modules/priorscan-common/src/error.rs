use thiserror::Error;
use uuid::Uuid;

/// Pipeline error taxonomy. Only `ServiceUnavailable` and
/// `PersistenceFailure` are fatal to a run and trigger the best-effort
/// `failed` status write; the request-level variants mutate no state.
/// Per-source failures are absorbed at the aggregator and never surface
/// here.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Scan not found: {0}")]
    ScanNotFound(Uuid),

    #[error("Fingerprint service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Run conflict: scan {0} is already being processed")]
    RunConflict(Uuid),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl ScanError {
    /// Fatal errors abort the run and transition the scan to `failed`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::ServiceUnavailable(_)
                | ScanError::PersistenceFailure(_)
                | ScanError::Anyhow(_)
        )
    }
}
