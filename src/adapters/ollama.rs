//! Ollama local daemon client.
//!
//! Speaks the native API on the fixed loopback port: `/api/version` for the
//! availability probe, `/api/tags` for the catalog and `/api/generate` for
//! completions (text and vision).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::adapters::http::{
    build_client, read_success_body, sniff_mime, CATALOG_TIMEOUT, COMPLETION_TIMEOUT,
    PROBE_TIMEOUT,
};
use crate::domain::normalize::resolve_completion;
use crate::domain::{model, DomainError, EnhancementOptions, ProviderKind, RemoteAiModel};
use crate::ports::provider::{checkpoint, report, ProgressFn};
use crate::ports::ProviderClient;

/// Completion budget Ollama accepts via `num_predict`.
const MAX_TOKENS_BOUND: u32 = 4096;

pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new() -> Result<Self, DomainError> {
        Self::with_base_url(ProviderKind::Ollama.base_url())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DomainError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into(),
        })
    }

    fn generate_body(
        model_id: &str,
        system: &str,
        prompt: &str,
        options: &EnhancementOptions,
        images: Option<Vec<String>>,
    ) -> Value {
        let (temperature, max_tokens) = options.clamped(MAX_TOKENS_BOUND);
        let mut body = json!({
            "model": model_id,
            "system": system,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": max_tokens,
            },
        });
        if let Some(images) = images {
            body["images"] = json!(images);
        }
        body
    }

    async fn generate(
        &self,
        body: Value,
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        report(&progress, checkpoint::BUILT);

        let request = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(COMPLETION_TIMEOUT)
            .json(&body);

        let response = request.send().await.map_err(DomainError::from_transport)?;
        report(&progress, checkpoint::SENT);
        let raw = read_success_body(response).await?;
        report(&progress, checkpoint::RECEIVED);

        let strict = serde_json::from_str::<GenerateResponse>(&raw)
            .ok()
            .and_then(|r| r.response);
        let text = resolve_completion(strict, &raw)?;
        report(&progress, checkpoint::DONE);
        Ok(text)
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
    model: String,
}

#[async_trait]
impl ProviderClient for OllamaClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn is_available(&self, _credential: Option<&str>) -> bool {
        let result = self
            .client
            .get(format!("{}/api/version", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Ollama availability probe failed");
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
            .get(format!("{}/api/tags", self.base_url))
            .timeout(CATALOG_TIMEOUT)
            .send()
            .await
            .map_err(DomainError::from_transport)?;
        let body = read_success_body(response).await?;

        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::DecodeFailure(e.to_string()))?;

        let mut models: Vec<RemoteAiModel> = tags
            .models
            .into_iter()
            .map(|m| RemoteAiModel {
                id: m.model,
                display_name: m.name,
                owned_by: "ollama".to_string(),
                context_window_tokens: 0,
                max_completion_tokens: 0,
                active: true,
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
        let body = Self::generate_body(
            model_id,
            &options.system_prompt,
            &options.user_prompt(text),
            options,
            None,
        );
        self.generate(body, progress).await
    }

    async fn analyze_image(
        &self,
        bytes: &[u8],
        model_id: &str,
        prompt: &str,
        system_prompt: &str,
        _credential: Option<&str>,
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        // MIME is sniffed for parity with the remote vision path, but the
        // native API only takes raw base64.
        debug!(mime = sniff_mime(bytes), "Analyzing image via Ollama");
        let encoded = BASE64.encode(bytes);
        let options = EnhancementOptions::new(system_prompt);
        let body = Self::generate_body(model_id, system_prompt, prompt, &options, Some(vec![encoded]));
        self.generate(body, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_body_clamps_options() {
        let mut options = EnhancementOptions::new("sys");
        options.temperature = 5.0;
        options.max_tokens = 1_000_000;

        let body = OllamaClient::generate_body("llama3.2", "sys", "hi", &options, None);
        assert_eq!(body["options"]["temperature"], 1.0);
        assert_eq!(body["options"]["num_predict"], MAX_TOKENS_BOUND);
        assert_eq!(body["stream"], false);

        options.temperature = -1.0;
        let body = OllamaClient::generate_body("llama3.2", "sys", "hi", &options, None);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_generate_body_embeds_images() {
        let options = EnhancementOptions::new("sys");
        let body = OllamaClient::generate_body(
            "llava:13b",
            "sys",
            "describe",
            &options,
            Some(vec!["aGVsbG8=".to_string()]),
        );
        assert_eq!(body["images"][0], "aGVsbG8=");
    }

    #[test]
    fn test_tags_decode_and_sort() {
        let body = r#"{"models": [
            {"name": "zephyr", "model": "zephyr:latest", "modified_at": "x", "size": 1},
            {"name": "Llama 3.2", "model": "llama3.2", "modified_at": "x", "size": 2}
        ]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        let mut models: Vec<RemoteAiModel> = tags
            .models
            .into_iter()
            .map(|m| RemoteAiModel::new(m.model, m.name))
            .collect();
        model::sort_catalog(&mut models);
        assert_eq!(models[0].display_name, "Llama 3.2");
        assert_eq!(models[1].display_name, "zephyr");
    }

    #[tokio::test]
    async fn test_failed_send_reports_built_but_not_sent() {
        // Nothing listens on the discard port, so the request never leaves.
        let client = OllamaClient::with_base_url("http://127.0.0.1:9").unwrap();

        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let progress: ProgressFn = std::sync::Arc::new(move |p| seen_clone.lock().push(p));

        let err = client
            .enhance(
                "hi",
                "llama3.2",
                &EnhancementOptions::new("sys"),
                None,
                Some(progress),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Unreachable(_)));
        assert_eq!(*seen.lock(), vec![checkpoint::BUILT]);
    }

    #[test]
    fn test_strict_generate_decode() {
        let raw = r#"{"model": "llama3.2", "response": "better text", "done": true}"#;
        let decoded: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.response.as_deref(), Some("better text"));
    }
}
