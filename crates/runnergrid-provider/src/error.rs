//! Error types for provider operations.

use thiserror::Error;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur while reading or writing an ASG.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Rejected before any remote call was made.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The named ASG does not exist in the region.
    #[error("auto scaling group {0} not found")]
    NotFound(String),

    /// The cloud API returned an error.
    #[error("cloud api error: {0}")]
    Api(String),

    /// Provider construction or registry lookup failed.
    #[error("provider configuration error: {0}")]
    Configuration(String),
}
