//! Error types for the GitLab collector.

use thiserror::Error;

/// Result type alias for GitLab operations.
pub type GitlabResult<T> = Result<T, GitlabError>;

/// Errors that can occur while talking to the GitLab API.
#[derive(Debug, Error)]
pub enum GitlabError {
    /// Transport-level failure (connect, timeout, body decode).
    #[error("gitlab transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status other than 429.
    #[error("gitlab returned status {status} while {context}")]
    Status { status: u16, context: String },

    /// Every retry budget was spent on 429 responses.
    #[error("giving up while {context} after {attempts} attempts")]
    RetriesExhausted { attempts: u32, context: String },
}
