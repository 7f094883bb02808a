//! LM Studio local daemon client.
//!
//! Uses the `/api/v0` REST surface: `/api/v0/models` for the probe and
//! catalog (including `max_context_length` and load `state`), and
//! `/api/v0/chat/completions` for completions. No vision support: the
//! default `analyze_image` failure applies.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::adapters::http::{
    build_client, read_success_body, CATALOG_TIMEOUT, COMPLETION_TIMEOUT, PROBE_TIMEOUT,
};
use crate::domain::normalize::resolve_completion;
use crate::domain::{model, DomainError, EnhancementOptions, ProviderKind, RemoteAiModel};
use crate::ports::provider::{checkpoint, report, ProgressFn};
use crate::ports::ProviderClient;

const MAX_TOKENS_BOUND: u32 = 4096;

pub struct LmStudioClient {
    client: Client,
    base_url: String,
}

impl LmStudioClient {
    pub fn new() -> Result<Self, DomainError> {
        Self::with_base_url(ProviderKind::LmStudio.base_url())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DomainError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into(),
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
            "max_tokens": max_tokens,
            "stream": false,
        })
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<LmStudioModel>,
}

#[derive(Deserialize)]
struct LmStudioModel {
    id: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    max_context_length: u64,
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
impl ProviderClient for LmStudioClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LmStudio
    }

    async fn is_available(&self, _credential: Option<&str>) -> bool {
        let result = self
            .client
            .get(format!("{}/api/v0/models", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "LM Studio availability probe failed");
                false
            }
        }
    }

    async fn fetch_models(
        &self,
        _credential: Option<&str>,
    ) -> Result<Vec<RemoteAiModel>, DomainError> {
        let response = self
            .client
            .get(format!("{}/api/v0/models", self.base_url))
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
                owned_by: m.publisher,
                context_window_tokens: m.max_context_length,
                max_completion_tokens: 0,
                active: m.state == "loaded",
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
        _credential: Option<&str>,
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        let body = Self::chat_body(
            model_id,
            &options.system_prompt,
            &options.user_prompt(text),
            options,
        );
        report(&progress, checkpoint::BUILT);

        let request = self
            .client
            .post(format!("{}/api/v0/chat/completions", self.base_url))
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
