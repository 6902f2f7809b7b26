//! Error types for leafmark-sync

use thiserror::Error;

/// Result type alias using leafmark-sync's `SyncError`
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during a reconciliation pass.
///
/// Every variant except `MalformedRecord` is fatal to the pass: the pipeline
/// aborts, nothing further is applied, and the caller decides whether to
/// retry a whole pass. `MalformedRecord` is raised at wire boundaries and
/// downgraded to a per-item skip by the applier.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid transport/endpoint configuration
    #[error("Invalid sync configuration: {0}")]
    InvalidConfiguration(String),

    /// HTTP request failed (network or protocol level)
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Sync API error: {0}")]
    Api(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local store error
    #[error("Store error: {0}")]
    Store(String),

    /// A locally-held uid failed format validation (data corruption)
    #[error("Invalid bookmark uid: {0}")]
    InvalidUid(String),

    /// A remote record is missing a required field
    #[error("Malformed remote record: {0}")]
    MalformedRecord(String),
}
