//! The two-operation provider port.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ProviderError, ProviderResult};

/// A provider's view of one ASG at read time.
///
/// `allocated` counts instances whose lifecycle state already consumes
/// capacity (in service or being brought up); `desired` is the target
/// size the provider is currently converging toward. Both are
/// non-negative; a provider reporting otherwise returns an error
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsgReading {
    pub allocated: i64,
    pub desired: i64,
}

/// Uniform capability surface over one cloud region.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Read the group's current allocation and desired size.
    async fn read(&self, asg_name: &str) -> ProviderResult<AsgReading>;

    /// Set the group's min, max and desired size to `target`.
    ///
    /// Writing the current target is safe. Invalid arguments are
    /// rejected without a remote call.
    async fn write(&self, asg_name: &str, target: i64) -> ProviderResult<()>;
}

/// Per-cloud pool of region clients.
///
/// `get` returns the cached client for a region, creating it on first
/// use: fast path under a read lock, slow path under a write lock with
/// a double-check.
#[async_trait]
pub trait ProviderPool: Send + Sync + std::fmt::Debug {
    async fn get(&self, region: &str) -> ProviderResult<Arc<dyn Provider>>;
}

/// Preconditions shared by every [`Provider::write`] implementation.
pub fn validate_write_request(asg_name: &str, target: i64) -> ProviderResult<()> {
    if asg_name.is_empty() {
        return Err(ProviderError::Validation(
            "asg name must not be empty".to_string(),
        ));
    }
    if target < 0 {
        return Err(ProviderError::Validation(format!(
            "target capacity must be non-negative, got {target}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_target() {
        assert!(validate_write_request("workers", 0).is_ok());
    }

    #[test]
    fn rejects_negative_target() {
        let err = validate_write_request("workers", -1).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn rejects_empty_name() {
        let err = validate_write_request("", 3).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }
}
