use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DomainError, EnhancementOptions, ProviderKind, RemoteAiModel};

/// Fractional progress callback (0.0 - 1.0).
///
/// May be invoked from a non-owning execution context; implementations must
/// re-marshal updates onto their own mutation point before applying them.
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// Progress checkpoints reported by every `enhance`/`analyze_image` call.
pub mod checkpoint {
    /// Request body built.
    pub const BUILT: f32 = 0.1;
    /// Request sent.
    pub const SENT: f32 = 0.2;
    /// Response received.
    pub const RECEIVED: f32 = 0.8;
    /// Response normalized.
    pub const DONE: f32 = 1.0;
}

pub(crate) fn report(progress: &Option<ProgressFn>, value: f32) {
    if let Some(cb) = progress {
        cb(value);
    }
}

/// Capability interface over the four enhancement backends.
///
/// Local variants probe a fixed loopback endpoint; remote variants require a
/// credential and treat a successful catalog fetch as availability (no
/// cheaper probe exists).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the backend is currently reachable and usable.
    async fn is_available(&self, credential: Option<&str>) -> bool;

    /// User-initiated connectivity check. Same semantics as `is_available`.
    async fn test_connection(&self, credential: Option<&str>) -> bool {
        self.is_available(credential).await
    }

    /// Fetch the model catalog, sorted by display name ascending,
    /// case-sensitive.
    async fn fetch_models(
        &self,
        credential: Option<&str>,
    ) -> Result<Vec<RemoteAiModel>, DomainError>;

    /// Improve dictated text with the given model. The primary call.
    async fn enhance(
        &self,
        text: &str,
        model_id: &str,
        options: &EnhancementOptions,
        credential: Option<&str>,
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError>;

    /// Describe an image. Optional capability: backends without vision
    /// support fail with `CapabilityUnsupported`.
    async fn analyze_image(
        &self,
        _bytes: &[u8],
        _model_id: &str,
        _prompt: &str,
        _system_prompt: &str,
        _credential: Option<&str>,
        _progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        Err(DomainError::CapabilityUnsupported(
            self.kind().display_name().to_string(),
        ))
    }
}
