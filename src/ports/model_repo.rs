use async_trait::async_trait;

use crate::domain::DomainError;
use crate::ports::provider::ProgressFn;

/// Port for the on-device dictation model store.
///
/// Implementations own the artifact storage; callers derive `is_downloaded`
/// and warm state from here at read time, never from a stale cache.
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Names of all models the repository can provide.
    fn available_models(&self) -> Vec<String>;

    /// Name of the model recommended as a default.
    fn recommended_default(&self) -> String;

    /// Whether the named model's artifact is present on disk.
    fn is_downloaded(&self, name: &str) -> bool;

    /// Download the named model, reporting fractional progress 0-1.
    async fn download(&self, name: &str, progress: Option<ProgressFn>)
        -> Result<(), DomainError>;

    /// Remove the on-disk artifact.
    async fn delete(&self, name: &str) -> Result<(), DomainError>;

    /// Load the model so first use is instant, reporting fractional progress.
    async fn prewarm(&self, name: &str, progress: Option<ProgressFn>)
        -> Result<(), DomainError>;

    /// Directory holding the model artifacts.
    fn storage_dir(&self) -> std::path::PathBuf;
}
