use serde::{Deserialize, Serialize};

/// Whether a provider runs on this machine or behind a cloud API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderCategory {
    /// Local daemon on a loopback port. No credential required.
    Local,
    /// Hosted API. Requires an API key.
    Remote,
}

/// One of the four supported enhancement backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Ollama,
    LmStudio,
    Gemini,
    Groq,
}

impl ProviderKind {
    /// All providers, in the order they are presented.
    pub fn all() -> [ProviderKind; 4] {
        [
            ProviderKind::Ollama,
            ProviderKind::LmStudio,
            ProviderKind::Gemini,
            ProviderKind::Groq,
        ]
    }

    pub fn category(&self) -> ProviderCategory {
        match self {
            ProviderKind::Ollama | ProviderKind::LmStudio => ProviderCategory::Local,
            ProviderKind::Gemini | ProviderKind::Groq => ProviderCategory::Remote,
        }
    }

    pub fn requires_credential(&self) -> bool {
        self.category() == ProviderCategory::Remote
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama",
            ProviderKind::LmStudio => "LM Studio",
            ProviderKind::Gemini => "Google Gemini",
            ProviderKind::Groq => "Groq",
        }
    }

    /// Base URL for the provider's API.
    pub fn base_url(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://127.0.0.1:11434",
            ProviderKind::LmStudio => "http://127.0.0.1:1234",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
        }
    }

    /// Flagship model id preferred by catalog reconciliation when the stored
    /// selection is missing from a fresh fetch.
    pub fn preferred_default_model(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Ollama => Some("llama3.2"),
            ProviderKind::LmStudio => None,
            ProviderKind::Gemini => Some("gemini-2.0-flash"),
            ProviderKind::Groq => Some("llama-3.3-70b-versatile"),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Per-call parameters for a text enhancement request.
/// Immutable value passed into `ProviderClient::enhance`.
#[derive(Debug, Clone)]
pub struct EnhancementOptions {
    /// System prompt describing the rewrite task.
    pub system_prompt: String,
    /// Optional extra context (e.g. the text surrounding the cursor).
    pub context: Option<String>,
    /// Sampling temperature as configured by the user.
    pub temperature: f32,
    /// Requested completion budget.
    pub max_tokens: u32,
}

impl EnhancementOptions {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            context: None,
            temperature: 0.3,
            max_tokens: 2048,
        }
    }

    /// Clamp temperature into [0.1, 1.0] and the token budget into the
    /// provider's bound. Applied by every adapter before a request is sent,
    /// regardless of caller input.
    pub fn clamped(&self, max_tokens_bound: u32) -> (f32, u32) {
        let temperature = self.temperature.clamp(0.1, 1.0);
        let max_tokens = self.max_tokens.min(max_tokens_bound).max(1);
        (temperature, max_tokens)
    }

    /// User-facing prompt body: the text to improve, prefixed with the
    /// optional context block.
    pub fn user_prompt(&self, text: &str) -> String {
        match &self.context {
            Some(context) if !context.is_empty() => {
                format!("Context:\n{}\n\nText:\n{}", context, text)
            }
            _ => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_credentials() {
        assert_eq!(ProviderKind::Ollama.category(), ProviderCategory::Local);
        assert_eq!(ProviderKind::LmStudio.category(), ProviderCategory::Local);
        assert_eq!(ProviderKind::Gemini.category(), ProviderCategory::Remote);
        assert_eq!(ProviderKind::Groq.category(), ProviderCategory::Remote);
        assert!(!ProviderKind::Ollama.requires_credential());
        assert!(ProviderKind::Groq.requires_credential());
    }

    #[test]
    fn test_temperature_clamped_into_range() {
        let mut options = EnhancementOptions::new("improve");
        options.temperature = 5.0;
        assert_eq!(options.clamped(4096).0, 1.0);

        options.temperature = -1.0;
        assert_eq!(options.clamped(4096).0, 0.1);

        options.temperature = 0.4;
        assert_eq!(options.clamped(4096).0, 0.4);
    }

    #[test]
    fn test_max_tokens_clamped_to_bound() {
        let mut options = EnhancementOptions::new("improve");
        options.max_tokens = 1_000_000;
        assert_eq!(options.clamped(8192).1, 8192);

        options.max_tokens = 0;
        assert_eq!(options.clamped(8192).1, 1);

        options.max_tokens = 512;
        assert_eq!(options.clamped(8192).1, 512);
    }

    #[test]
    fn test_user_prompt_includes_context() {
        let mut options = EnhancementOptions::new("improve");
        assert_eq!(options.user_prompt("hello"), "hello");

        options.context = Some("an email draft".to_string());
        let prompt = options.user_prompt("hello");
        assert!(prompt.contains("Context:\nan email draft"));
        assert!(prompt.contains("Text:\nhello"));
    }
}
