//! Handoff contract for the bundled installer.
//!
//! After the companion packages resolve, the bootstrap hands control to the
//! toolkit's bundled installer. The installer is reached through an
//! injected [`SecondaryProvider`] rather than any name-based lookup: hosts
//! wire in a provider at startup, and the provider answers `None` until the
//! freshly resolved installer package has actually loaded. That condition
//! is what the bootstrap's bounded retry cycles wait out.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by the bundled installer.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SecondaryError {
    /// The installer's failure message.
    pub message: String,
}

/// Callback receiving the bundled installer's fine-grained step codes.
///
/// Codes are mapped onto coarse steps with
/// [`InstallStep::from_installer_code`](crate::InstallStep::from_installer_code).
pub type StepReport = Arc<dyn Fn(i32) + Send + Sync>;

/// The bundled installer the bootstrap hands off to.
#[async_trait]
pub trait SecondaryInstaller: Send + Sync {
    /// Run the installer to completion, reporting step codes as it goes.
    async fn run(&self, report: StepReport) -> Result<(), SecondaryError>;
}

/// Source of the bundled installer, queried after package resolution.
///
/// Returning `None` means the installer package has not loaded yet; the
/// bootstrap will poll again, up to its configured retry cycles.
pub trait SecondaryProvider: Send + Sync {
    /// The installer, if it is available right now.
    fn get(&self) -> Option<Arc<dyn SecondaryInstaller>>;
}

/// Provider with a fixed answer.
///
/// For hosts that link the installer directly (it is available from the
/// start) and for tests.
#[derive(Default)]
pub struct StaticProvider {
    installer: Option<Arc<dyn SecondaryInstaller>>,
}

impl StaticProvider {
    /// Provider that always returns the given installer.
    pub fn new(installer: Arc<dyn SecondaryInstaller>) -> Self {
        Self {
            installer: Some(installer),
        }
    }

    /// Provider that never has an installer.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl SecondaryProvider for StaticProvider {
    fn get(&self) -> Option<Arc<dyn SecondaryInstaller>> {
        self.installer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopInstaller;

    #[async_trait]
    impl SecondaryInstaller for NoopInstaller {
        async fn run(&self, report: StepReport) -> Result<(), SecondaryError> {
            report(11);
            Ok(())
        }
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticProvider::new(Arc::new(NoopInstaller));
        assert!(provider.get().is_some());
        assert!(StaticProvider::empty().get().is_none());
    }

    #[tokio::test]
    async fn test_installer_reports_codes() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let report: StepReport = Arc::new(move |code| sink.lock().unwrap().push(code));
        NoopInstaller.run(report).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![11]);
    }

    #[test]
    fn test_error_display() {
        let err = SecondaryError {
            message: "installer step 7 failed".to_string(),
        };
        assert_eq!(err.to_string(), "installer step 7 failed");
    }
}
