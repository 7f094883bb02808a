use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::enhancement::ProviderKind;
use crate::domain::model::ModelWarmStatus;

/// Default system prompt for text enhancement.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a dictation assistant. Improve the \
grammar, punctuation and clarity of the transcribed text without changing its meaning. \
Return only the corrected text.";

/// Default prompt for image analysis.
pub const DEFAULT_IMAGE_PROMPT: &str =
    "Describe the content of this screenshot so it can be referenced while dictating.";

/// AI enhancement settings: the orchestrator's persisted state record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Master switch for AI enhancement.
    pub enabled: bool,
    /// Exactly one provider is active at a time.
    pub active_provider: ProviderKind,
    /// Per-provider API keys. Local providers have no entry.
    pub credentials: HashMap<ProviderKind, String>,
    /// Selected text model id for the active provider ("" = unset).
    pub selected_text_model: String,
    /// Selected vision model id for the active provider ("" = unset).
    pub selected_image_model: String,
    /// Sampling temperature, user-facing range [0, 1].
    pub temperature: f32,
    /// System prompt for enhancement calls.
    pub system_prompt: String,
    /// Prompt for image analysis calls.
    pub image_prompt: String,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            active_provider: ProviderKind::Ollama,
            credentials: HashMap::new(),
            selected_text_model: String::new(),
            selected_image_model: String::new(),
            temperature: 0.3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            image_prompt: DEFAULT_IMAGE_PROMPT.to_string(),
        }
    }
}

impl EnhancementConfig {
    /// Credential for a provider, if one is stored and non-empty.
    pub fn credential(&self, provider: ProviderKind) -> Option<&str> {
        self.credentials
            .get(&provider)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// On-device dictation model settings.
///
/// `warm_status` is persisted alongside the selection but reset to `Cold` on
/// process start: models are not resident across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    /// Internal name of the selected dictation model ("" = unset).
    pub selected_model: String,
    pub warm_status: ModelWarmStatus,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            selected_model: String::new(),
            warm_status: ModelWarmStatus::Cold,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub enhancement: EnhancementConfig,
    pub dictation: DictationConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
