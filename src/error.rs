//! Error handling
//!
//! Two failure families only: broken configuration (fatal, caught at
//! construction) and store access failures. Insufficient data is never an
//! error - missing baselines, compliance results or history produce the
//! documented neutral results instead.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration invariant violated (weights not summing to 1.0,
    /// non-descending thresholds, ...). Raised at construction time only.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persistence store access failed.
    #[error("store error: {0}")]
    Store(String),

    /// A detector failed mid-evaluation. Callers log this and treat the
    /// detector as contributing nothing.
    #[error("detector '{detector}' failed: {message}")]
    Detector { detector: String, message: String },
}
