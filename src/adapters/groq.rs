//! Groq client.
//!
//! Remote variant over the OpenAI-compatible surface: bearer-credentialed
//! `/models` catalog (which reports `active`, `context_window` and
//! `max_completion_tokens`) and `/chat/completions`. No vision support.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapters::http::{
    build_client, read_success_body, CATALOG_TIMEOUT, COMPLETION_TIMEOUT,
};
use crate::domain::normalize::resolve_completion;
use crate::domain::{model, DomainError, EnhancementOptions, ProviderKind, RemoteAiModel};
use crate::ports::provider::{checkpoint, report, ProgressFn};
use crate::ports::ProviderClient;

const MAX_TOKENS_BOUND: u32 = 32768;

pub struct GroqClient {
    client: Client,
    base_url: String,
}

impl GroqClient {
    pub fn new() -> Result<Self, DomainError> {
        Self::with_base_url(ProviderKind::Groq.base_url())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DomainError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into(),
        })
    }

    fn require_credential(credential: Option<&str>) -> Result<&str, DomainError> {
        credential.filter(|c| !c.is_empty()).ok_or_else(|| {
            DomainError::MissingCredential(ProviderKind::Groq.display_name().to_string())
        })
    }

    fn chat_body(model_id: &str, system: &str, user: &str, options: &EnhancementOptions) -> Value {
        let (temperature, max_tokens) = options.clamped(MAX_TOKENS_BOUND);
        json!({
            "model": model_id,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": temperature,
            "max_completion_tokens": max_tokens,
        })
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<GroqModel>,
}

#[derive(Deserialize)]
struct GroqModel {
    id: String,
    #[serde(default)]
    owned_by: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    context_window: u64,
    #[serde(default)]
    max_completion_tokens: u64,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ProviderClient for GroqClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Groq
    }

    async fn is_available(&self, credential: Option<&str>) -> bool {
        // No cheaper probe exists; a successful catalog fetch is availability.
        self.fetch_models(credential).await.is_ok()
    }

    async fn fetch_models(
        &self,
        credential: Option<&str>,
    ) -> Result<Vec<RemoteAiModel>, DomainError> {
        let credential = Self::require_credential(credential)?;

        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(credential)
            .timeout(CATALOG_TIMEOUT)
            .send()
            .await
            .map_err(DomainError::from_transport)?;
        let body = read_success_body(response).await?;

        let parsed: ModelsResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::DecodeFailure(e.to_string()))?;

        let mut models: Vec<RemoteAiModel> = parsed
            .data
            .into_iter()
            .map(|m| RemoteAiModel {
                display_name: m.id.clone(),
                id: m.id,
                owned_by: m.owned_by,
                context_window_tokens: m.context_window,
                max_completion_tokens: m.max_completion_tokens,
                active: m.active,
            })
            .collect();
        model::sort_catalog(&mut models);
        Ok(models)
    }

    async fn enhance(
        &self,
        text: &str,
        model_id: &str,
        options: &EnhancementOptions,
        credential: Option<&str>,
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        let credential = Self::require_credential(credential)?;
        let body = Self::chat_body(
            model_id,
            &options.system_prompt,
            &options.user_prompt(text),
            options,
        );
        report(&progress, checkpoint::BUILT);

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(credential)
            .timeout(COMPLETION_TIMEOUT)
            .json(&body);

        let response = request.send().await.map_err(DomainError::from_transport)?;
        report(&progress, checkpoint::SENT);
        let raw = read_success_body(response).await?;
        report(&progress, checkpoint::RECEIVED);

        let strict = serde_json::from_str::<ChatResponse>(&raw)
            .ok()
            .and_then(|r| r.choices.into_iter().next())
            .map(|c| c.message.content);
        let text = resolve_completion(strict, &raw)?;
        report(&progress, checkpoint::DONE);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential() {
        assert!(matches!(
            GroqClient::require_credential(None),
            Err(DomainError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_chat_body_clamps_and_uses_max_completion_tokens() {
        let mut options = EnhancementOptions::new("sys");
        options.temperature = 5.0;
        options.max_tokens = 1_000_000;

        let body = GroqClient::chat_body("llama-3.3-70b-versatile", "sys", "hi", &options);
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["max_completion_tokens"], MAX_TOKENS_BOUND);
        // The OpenAI-compatible surface takes `max_completion_tokens`,
        // not `max_tokens`.
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_catalog_decode_keeps_backend_fields() {
        let body = r#"{"object": "list", "data": [
            {"id": "llama-3.3-70b-versatile", "object": "model", "created": 1,
             "owned_by": "Meta", "active": true,
             "context_window": 131072, "max_completion_tokens": 32768},
            {"id": "whisper-large-v3", "object": "model", "created": 1,
             "owned_by": "OpenAI", "active": false, "context_window": 448}
        ]}"#;
        let parsed: ModelsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].max_completion_tokens, 32768);
        assert!(!parsed.data[1].active);
        assert_eq!(parsed.data[1].max_completion_tokens, 0);
    }

    #[test]
    fn test_strict_chat_decode() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#;
        let decoded: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.choices[0].message.content, "ok");
    }
}
