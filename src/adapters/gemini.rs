//! Google Gemini client.
//!
//! Remote variant: a credential is mandatory and availability is a full
//! catalog fetch, since the API exposes no cheaper probe. The API key goes in
//! the `x-goog-api-key` header. Field names (`inputTokenLimit`,
//! `maxOutputTokens`, `inline_data`, ...) are preserved byte-for-byte.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapters::http::{
    build_client, read_success_body, sniff_mime, CATALOG_TIMEOUT, COMPLETION_TIMEOUT,
};
use crate::domain::normalize::resolve_completion;
use crate::domain::{model, DomainError, EnhancementOptions, ProviderKind, RemoteAiModel};
use crate::ports::provider::{checkpoint, report, ProgressFn};
use crate::ports::ProviderClient;

const MAX_TOKENS_BOUND: u32 = 8192;

pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new() -> Result<Self, DomainError> {
        Self::with_base_url(ProviderKind::Gemini.base_url())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DomainError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into(),
        })
    }

    fn require_credential(credential: Option<&str>) -> Result<&str, DomainError> {
        credential
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                DomainError::MissingCredential(ProviderKind::Gemini.display_name().to_string())
            })
    }

    fn generate_body(system: &str, user_parts: Vec<Value>, options: &EnhancementOptions) -> Value {
        let (temperature, max_tokens) = options.clamped(MAX_TOKENS_BOUND);
        json!({
            "system_instruction": {"parts": [{"text": system}]},
            "contents": [{"role": "user", "parts": user_parts}],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        })
    }

    async fn generate(
        &self,
        model_id: &str,
        body: Value,
        credential: &str,
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        report(&progress, checkpoint::BUILT);

        let request = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, model_id
            ))
            .header("x-goog-api-key", credential)
            .timeout(COMPLETION_TIMEOUT)
            .json(&body);

        let response = request.send().await.map_err(DomainError::from_transport)?;
        report(&progress, checkpoint::SENT);
        let raw = read_success_body(response).await?;
        report(&progress, checkpoint::RECEIVED);

        let strict = serde_json::from_str::<GenerateContentResponse>(&raw)
            .ok()
            .and_then(|r| r.first_text());
        let text = resolve_completion(strict, &raw)?;
        report(&progress, checkpoint::DONE);
        Ok(text)
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn first_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        Some(text)
    }
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModel>,
}

#[derive(Deserialize)]
struct GeminiModel {
    name: String,
    #[serde(default, rename = "displayName")]
    display_name: String,
    #[serde(default, rename = "inputTokenLimit")]
    input_token_limit: u64,
    #[serde(default, rename = "outputTokenLimit")]
    output_token_limit: u64,
    #[serde(default, rename = "supportedGenerationMethods")]
    supported_generation_methods: Vec<String>,
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
            .header("x-goog-api-key", credential)
            .timeout(CATALOG_TIMEOUT)
            .send()
            .await
            .map_err(DomainError::from_transport)?;
        let body = read_success_body(response).await?;

        let parsed: ListModelsResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::DecodeFailure(e.to_string()))?;

        let mut models: Vec<RemoteAiModel> = parsed
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| {
                let id = m.name.strip_prefix("models/").unwrap_or(&m.name).to_string();
                let display_name = if m.display_name.is_empty() {
                    id.clone()
                } else {
                    m.display_name
                };
                RemoteAiModel {
                    id,
                    display_name,
                    owned_by: "google".to_string(),
                    context_window_tokens: m.input_token_limit,
                    max_completion_tokens: m.output_token_limit,
                    active: true,
                }
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
        let body = Self::generate_body(
            &options.system_prompt,
            vec![json!({"text": options.user_prompt(text)})],
            options,
        );
        self.generate(model_id, body, credential, progress).await
    }

    async fn analyze_image(
        &self,
        bytes: &[u8],
        model_id: &str,
        prompt: &str,
        system_prompt: &str,
        credential: Option<&str>,
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        let credential = Self::require_credential(credential)?;
        let parts = vec![
            json!({"text": prompt}),
            json!({
                "inline_data": {
                    "mime_type": sniff_mime(bytes),
                    "data": BASE64.encode(bytes),
                }
            }),
        ];
        let options = EnhancementOptions::new(system_prompt);
        let body = Self::generate_body(system_prompt, parts, &options);
        self.generate(model_id, body, credential, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential() {
        assert!(matches!(
            GeminiClient::require_credential(None),
            Err(DomainError::MissingCredential(_))
        ));
        assert!(matches!(
            GeminiClient::require_credential(Some("")),
            Err(DomainError::MissingCredential(_))
        ));
        assert_eq!(GeminiClient::require_credential(Some("key")).unwrap(), "key");
    }

    #[test]
    fn test_generate_body_clamps_and_names_fields() {
        let mut options = EnhancementOptions::new("sys");
        options.temperature = 9.0;
        options.max_tokens = 1_000_000;

        let body = GeminiClient::generate_body("sys", vec![json!({"text": "hi"})], &options);
        assert_eq!(body["generationConfig"]["temperature"], 1.0);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], MAX_TOKENS_BOUND);
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn test_catalog_decode_filters_generate_content() {
        let body = r#"{"models": [
            {"name": "models/gemini-2.0-flash", "displayName": "Gemini 2.0 Flash",
             "inputTokenLimit": 1048576, "outputTokenLimit": 8192,
             "supportedGenerationMethods": ["generateContent", "countTokens"]},
            {"name": "models/text-embedding-004", "displayName": "Text Embedding",
             "inputTokenLimit": 2048, "outputTokenLimit": 1,
             "supportedGenerationMethods": ["embedContent"]}
        ]}"#;
        let parsed: ListModelsResponse = serde_json::from_str(body).unwrap();
        let usable: Vec<_> = parsed
            .models
            .iter()
            .filter(|m| m.supported_generation_methods.iter().any(|s| s == "generateContent"))
            .collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].name, "models/gemini-2.0-flash");
        assert_eq!(usable[0].input_token_limit, 1048576);
    }

    #[test]
    fn test_strict_decode_concatenates_parts() {
        let raw = r#"{"candidates": [
            {"content": {"parts": [{"text": "part one "}, {"text": "part two"}], "role": "model"}}
        ]}"#;
        let decoded: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.first_text().as_deref(), Some("part one part two"));
    }
}
