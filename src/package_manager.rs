//! Host package manager seam.

use async_trait::async_trait;
use thiserror::Error;

/// Error from a package manager operation.
#[derive(Debug, Error)]
#[error("package manager: {message}")]
pub struct PackageManagerError {
    /// Description of the failure.
    pub message: String,
}

/// Client for the host's package manager.
///
/// The bootstrap only needs two operations. `resolve` kicks off dependency
/// resolution and surfaces no completion signal; the host resolves on its
/// own schedule and the bootstrap waits with a presumed-settled poll
/// instead of an acknowledgement. `remove` unregisters a package and may
/// fail; the bootstrap treats such failures as tolerable.
#[async_trait]
pub trait PackageManagerClient: Send + Sync {
    /// Ask the host to re-resolve project dependencies. Fire-and-forget.
    fn resolve(&self);

    /// Remove a package registration by id.
    async fn remove(&self, id: &str) -> Result<(), PackageManagerError>;
}

/// Client for hosts that resolve implicitly and track nothing to remove.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPackageManager;

#[async_trait]
impl PackageManagerClient for NullPackageManager {
    fn resolve(&self) {}

    async fn remove(&self, _id: &str) -> Result<(), PackageManagerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_client_is_inert() {
        let client = NullPackageManager;
        client.resolve();
        assert!(client.remove("com.relaykit.core").await.is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = PackageManagerError {
            message: "registry offline".to_string(),
        };
        assert_eq!(err.to_string(), "package manager: registry offline");
    }
}
