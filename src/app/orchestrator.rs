//! Per-provider state machine driving availability checks, credential
//! handling, catalog loading and selection reconciliation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::adapters::{GeminiClient, GroqClient, LmStudioClient, OllamaClient};
use crate::app::slots::TaskSlots;
use crate::domain::model::is_vision_model;
use crate::domain::{
    DomainError, EnhancementConfig, EnhancementOptions, ProviderCategory, ProviderKind,
    RemoteAiModel,
};
use crate::ports::provider::ProgressFn;
use crate::ports::{ProviderClient, SettingsStore};

const SLOT_AVAILABILITY: &str = "availability";
const SLOT_TEXT_MODELS: &str = "text-models";
const SLOT_IMAGE_MODELS: &str = "image-models";

/// Runtime state for one provider.
///
/// Catalogs are never cleared on failure, only error-annotated, so the UI
/// can keep showing the last-known-good list.
#[derive(Debug, Clone, Default)]
pub struct ProviderState {
    pub available: Option<bool>,
    pub text_models: Vec<RemoteAiModel>,
    pub image_models: Vec<RemoteAiModel>,
    pub error: Option<String>,
}

struct OrchestratorState {
    config: EnhancementConfig,
    providers: HashMap<ProviderKind, ProviderState>,
}

pub struct EnhancementOrchestrator {
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
    store: Arc<dyn SettingsStore>,
    state: RwLock<OrchestratorState>,
    slots: TaskSlots,
}

impl EnhancementOrchestrator {
    /// Build with the four real provider clients.
    pub fn new(store: Arc<dyn SettingsStore>) -> Result<Self, DomainError> {
        let mut clients: HashMap<ProviderKind, Arc<dyn ProviderClient>> = HashMap::new();
        clients.insert(ProviderKind::Ollama, Arc::new(OllamaClient::new()?));
        clients.insert(ProviderKind::LmStudio, Arc::new(LmStudioClient::new()?));
        clients.insert(ProviderKind::Gemini, Arc::new(GeminiClient::new()?));
        clients.insert(ProviderKind::Groq, Arc::new(GroqClient::new()?));
        Self::with_clients(store, clients)
    }

    /// Build with explicit clients. Used by tests.
    pub fn with_clients(
        store: Arc<dyn SettingsStore>,
        clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
    ) -> Result<Self, DomainError> {
        let config = store.load()?.enhancement;
        Ok(Self {
            clients,
            store,
            state: RwLock::new(OrchestratorState {
                config,
                providers: HashMap::new(),
            }),
            slots: TaskSlots::new(),
        })
    }

    pub fn settings(&self) -> EnhancementConfig {
        self.state.read().config.clone()
    }

    pub fn provider_state(&self, provider: ProviderKind) -> ProviderState {
        self.state
            .read()
            .providers
            .get(&provider)
            .cloned()
            .unwrap_or_default()
    }

    fn client(&self, provider: ProviderKind) -> Result<Arc<dyn ProviderClient>, DomainError> {
        self.clients
            .get(&provider)
            .cloned()
            .ok_or_else(|| DomainError::Config(format!("No client for {}", provider)))
    }

    /// Mutate the in-memory settings record and write it through the store's
    /// atomic update, so a concurrent writer of another section is never
    /// clobbered. The single mutation entry point for this component.
    fn persist<F>(&self, mutate: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut EnhancementConfig),
    {
        let config = {
            let mut state = self.state.write();
            mutate(&mut state.config);
            state.config.clone()
        };
        self.store.update(&mut |app| app.enhancement = config.clone())?;
        Ok(())
    }

    fn set_provider_error(&self, provider: ProviderKind, message: String) {
        warn!(provider = %provider, error = %message, "Provider error");
        self.state
            .write()
            .providers
            .entry(provider)
            .or_default()
            .error = Some(message);
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), DomainError> {
        self.persist(|c| c.enabled = enabled)
    }

    /// Enable-and-activate in one intent.
    pub async fn enable(&self) -> Result<(), DomainError> {
        self.set_enabled(true)?;
        self.activate().await;
        Ok(())
    }

    /// Switch the active provider. Invalidates everything in flight for the
    /// previous provider before re-activating.
    pub async fn set_active_provider(&self, provider: ProviderKind) -> Result<(), DomainError> {
        let changed = {
            let state = self.state.read();
            state.config.active_provider != provider
        };
        if !changed {
            return Ok(());
        }

        self.slots.cancel_all();
        self.persist(|c| c.active_provider = provider)?;
        info!(provider = %provider, "Active provider changed");
        self.activate().await;
        Ok(())
    }

    /// Store a credential. Deliberately does not trigger a catalog load:
    /// the user may still be typing, and partial keys must not leak into
    /// speculative network calls.
    pub fn set_credential(
        &self,
        provider: ProviderKind,
        value: String,
    ) -> Result<(), DomainError> {
        self.persist(|c| {
            c.credentials.insert(provider, value);
        })
    }

    pub fn set_temperature(&self, temperature: f32) -> Result<(), DomainError> {
        self.persist(|c| c.temperature = temperature)
    }

    pub fn set_prompts(
        &self,
        system_prompt: String,
        image_prompt: String,
    ) -> Result<(), DomainError> {
        self.persist(|c| {
            c.system_prompt = system_prompt;
            c.image_prompt = image_prompt;
        })
    }

    /// Probe the active provider and, when it is usable, chain into both
    /// catalog loads. Runs on enable and on every provider change.
    pub async fn activate(&self) {
        let (enabled, provider, credential) = {
            let state = self.state.read();
            (
                state.config.enabled,
                state.config.active_provider,
                state.config.credential(state.config.active_provider).map(String::from),
            )
        };
        if !enabled {
            return;
        }
        let client = match self.client(provider) {
            Ok(c) => c,
            Err(e) => {
                self.set_provider_error(provider, e.to_string());
                return;
            }
        };

        let token = self.slots.begin(SLOT_AVAILABILITY);
        let available = tokio::select! {
            _ = token.cancelled() => return,
            available = client.is_available(credential.as_deref()) => available,
        };
        if token.is_cancelled() {
            return;
        }
        self.slots.finish(SLOT_AVAILABILITY, &token);

        {
            let mut state = self.state.write();
            let entry = state.providers.entry(provider).or_default();
            entry.available = Some(available);
        }

        if !available {
            self.set_provider_error(
                provider,
                format!("{} is not reachable", provider.display_name()),
            );
            return;
        }

        let chain = match provider.category() {
            ProviderCategory::Local => true,
            ProviderCategory::Remote => credential.is_some(),
        };
        if chain {
            self.load_models().await;
            self.load_image_models().await;
        }
    }

    /// User-initiated connectivity check, independent of catalog state.
    /// A remote success chains into both catalog loads. Runs under the
    /// availability slot, so a provider switch invalidates the probe and its
    /// result is discarded.
    pub async fn test_connection(&self) -> bool {
        let (provider, credential) = {
            let state = self.state.read();
            (
                state.config.active_provider,
                state.config.credential(state.config.active_provider).map(String::from),
            )
        };
        let client = match self.client(provider) {
            Ok(c) => c,
            Err(_) => return false,
        };

        let token = self.slots.begin(SLOT_AVAILABILITY);
        let ok = tokio::select! {
            _ = token.cancelled() => return false,
            ok = client.test_connection(credential.as_deref()) => ok,
        };
        if token.is_cancelled() {
            return false;
        }
        self.slots.finish(SLOT_AVAILABILITY, &token);

        {
            let mut state = self.state.write();
            state.providers.entry(provider).or_default().available = Some(ok);
        }

        if ok && provider.category() == ProviderCategory::Remote {
            self.load_models().await;
            self.load_image_models().await;
        }
        ok
    }

    /// Fetch the text-model catalog for the active provider and reconcile
    /// the stored selection against it.
    pub async fn load_models(&self) {
        let (provider, credential) = {
            let state = self.state.read();
            (
                state.config.active_provider,
                state.config.credential(state.config.active_provider).map(String::from),
            )
        };
        let client = match self.client(provider) {
            Ok(c) => c,
            Err(e) => {
                self.set_provider_error(provider, e.to_string());
                return;
            }
        };

        let token = self.slots.begin(SLOT_TEXT_MODELS);
        let result = tokio::select! {
            _ = token.cancelled() => return,
            result = client.fetch_models(credential.as_deref()) => result,
        };
        if token.is_cancelled() {
            return;
        }
        self.slots.finish(SLOT_TEXT_MODELS, &token);

        match result {
            Ok(models) => {
                let selection = {
                    let state = self.state.read();
                    reconcile_selection(
                        &state.config.selected_text_model,
                        &models,
                        provider.preferred_default_model(),
                    )
                };
                {
                    let mut state = self.state.write();
                    let entry = state.providers.entry(provider).or_default();
                    entry.text_models = models;
                    entry.error = None;
                }
                if let Some(selected) = selection {
                    if self
                        .persist(|c| c.selected_text_model = selected.clone())
                        .is_err()
                    {
                        warn!(provider = %provider, "Failed to persist text model selection");
                    }
                }
                info!(provider = %provider, "Text model catalog loaded");
            }
            Err(e) => {
                self.set_provider_error(
                    provider,
                    format!("{}: {}", provider.display_name(), e),
                );
            }
        }
    }

    /// Fetch the catalog again, keep only vision-capable entries, and
    /// reconcile the stored image-model selection over the filtered subset.
    pub async fn load_image_models(&self) {
        let (provider, credential) = {
            let state = self.state.read();
            (
                state.config.active_provider,
                state.config.credential(state.config.active_provider).map(String::from),
            )
        };
        let client = match self.client(provider) {
            Ok(c) => c,
            Err(e) => {
                self.set_provider_error(provider, e.to_string());
                return;
            }
        };

        let token = self.slots.begin(SLOT_IMAGE_MODELS);
        let result = tokio::select! {
            _ = token.cancelled() => return,
            result = client.fetch_models(credential.as_deref()) => result,
        };
        if token.is_cancelled() {
            return;
        }
        self.slots.finish(SLOT_IMAGE_MODELS, &token);

        match result {
            Ok(models) => {
                // Catalog order is preserved through the filter.
                let vision: Vec<RemoteAiModel> =
                    models.into_iter().filter(is_vision_model).collect();
                let selection = {
                    let state = self.state.read();
                    reconcile_selection(
                        &state.config.selected_image_model,
                        &vision,
                        provider.preferred_default_model(),
                    )
                };
                {
                    let mut state = self.state.write();
                    let entry = state.providers.entry(provider).or_default();
                    entry.image_models = vision;
                    entry.error = None;
                }
                if let Some(selected) = selection {
                    if self
                        .persist(|c| c.selected_image_model = selected.clone())
                        .is_err()
                    {
                        warn!(provider = %provider, "Failed to persist image model selection");
                    }
                }
                info!(provider = %provider, "Image model catalog loaded");
            }
            Err(e) => {
                self.set_provider_error(
                    provider,
                    format!("{}: {}", provider.display_name(), e),
                );
            }
        }
    }

    /// Enhance dictated text with the active provider and selected model.
    pub async fn enhance(
        &self,
        text: &str,
        context: Option<String>,
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        let (provider, credential, model, mut options) = {
            let state = self.state.read();
            let config = &state.config;
            if !config.enabled {
                return Err(DomainError::Config("AI enhancement is disabled".to_string()));
            }
            (
                config.active_provider,
                config.credential(config.active_provider).map(String::from),
                config.selected_text_model.clone(),
                EnhancementOptions {
                    system_prompt: config.system_prompt.clone(),
                    context: None,
                    temperature: config.temperature,
                    max_tokens: 2048,
                },
            )
        };
        if model.is_empty() {
            return Err(DomainError::Config("No text model selected".to_string()));
        }
        options.context = context;

        let client = self.client(provider)?;
        client
            .enhance(text, &model, &options, credential.as_deref(), progress)
            .await
    }

    /// Describe an image with the active provider and selected vision model.
    pub async fn analyze_image(
        &self,
        bytes: &[u8],
        progress: Option<ProgressFn>,
    ) -> Result<String, DomainError> {
        let (provider, credential, model, prompt, system_prompt) = {
            let state = self.state.read();
            let config = &state.config;
            if !config.enabled {
                return Err(DomainError::Config("AI enhancement is disabled".to_string()));
            }
            (
                config.active_provider,
                config.credential(config.active_provider).map(String::from),
                config.selected_image_model.clone(),
                config.image_prompt.clone(),
                config.system_prompt.clone(),
            )
        };
        if model.is_empty() {
            return Err(DomainError::Config("No image model selected".to_string()));
        }

        let client = self.client(provider)?;
        client
            .analyze_image(
                bytes,
                &model,
                &prompt,
                &system_prompt,
                credential.as_deref(),
                progress,
            )
            .await
    }
}

/// Reconcile a stored model selection against a freshly fetched catalog.
///
/// Keeps the stored id when present; otherwise prefers an exact match on the
/// provider's flagship id, else the first list element. Returns the new
/// selection when it differs from the stored one. A non-empty catalog never
/// leaves the selection empty.
fn reconcile_selection(
    current: &str,
    models: &[RemoteAiModel],
    preferred: Option<&str>,
) -> Option<String> {
    if models.is_empty() {
        return None;
    }
    if !current.is_empty() && models.iter().any(|m| m.id == current) {
        return None;
    }
    let chosen = preferred
        .and_then(|p| models.iter().find(|m| m.id == p))
        .unwrap_or(&models[0]);
    Some(chosen.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::domain::AppConfig;
    use crate::ports::SettingsStore;

    struct MemorySettingsStore {
        config: Mutex<AppConfig>,
    }

    impl MemorySettingsStore {
        fn new(config: AppConfig) -> Arc<Self> {
            Arc::new(Self {
                config: Mutex::new(config),
            })
        }
    }

    impl SettingsStore for MemorySettingsStore {
        fn load(&self) -> Result<AppConfig, DomainError> {
            Ok(self.config.lock().clone())
        }
        fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
            *self.config.lock() = config.clone();
            Ok(())
        }
        fn update(
            &self,
            mutate: &mut dyn FnMut(&mut AppConfig),
        ) -> Result<AppConfig, DomainError> {
            let mut config = self.config.lock();
            mutate(&mut config);
            Ok(config.clone())
        }
        fn config_path(&self) -> std::path::PathBuf {
            "memory".into()
        }
        fn data_dir(&self) -> std::path::PathBuf {
            "memory".into()
        }
        fn logs_dir(&self) -> std::path::PathBuf {
            "memory".into()
        }
    }

    struct MockProvider {
        kind: ProviderKind,
        available: AtomicBool,
        available_delay: Duration,
        fail_fetch: AtomicBool,
        fetch_delay: Duration,
        models: Mutex<Vec<RemoteAiModel>>,
        fetch_count: AtomicUsize,
    }

    impl MockProvider {
        fn new(kind: ProviderKind, models: Vec<RemoteAiModel>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                available: AtomicBool::new(true),
                available_delay: Duration::ZERO,
                fail_fetch: AtomicBool::new(false),
                fetch_delay: Duration::ZERO,
                models: Mutex::new(models),
                fetch_count: AtomicUsize::new(0),
            })
        }

        fn slow_fetch(
            kind: ProviderKind,
            models: Vec<RemoteAiModel>,
            delay: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                kind,
                available: AtomicBool::new(true),
                available_delay: Duration::ZERO,
                fail_fetch: AtomicBool::new(false),
                fetch_delay: delay,
                models: Mutex::new(models),
                fetch_count: AtomicUsize::new(0),
            })
        }

        fn slow_available(kind: ProviderKind, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                available: AtomicBool::new(true),
                available_delay: delay,
                fail_fetch: AtomicBool::new(false),
                fetch_delay: Duration::ZERO,
                models: Mutex::new(Vec::new()),
                fetch_count: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderClient for MockProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }
        async fn is_available(&self, _credential: Option<&str>) -> bool {
            if !self.available_delay.is_zero() {
                tokio::time::sleep(self.available_delay).await;
            }
            self.available.load(Ordering::SeqCst)
        }
        async fn fetch_models(
            &self,
            _credential: Option<&str>,
        ) -> Result<Vec<RemoteAiModel>, DomainError> {
            if !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(DomainError::Unreachable("connection refused".to_string()));
            }
            Ok(self.models.lock().clone())
        }
        async fn enhance(
            &self,
            text: &str,
            _model_id: &str,
            _options: &EnhancementOptions,
            _credential: Option<&str>,
            _progress: Option<ProgressFn>,
        ) -> Result<String, DomainError> {
            Ok(format!("enhanced: {}", text))
        }
    }

    fn orchestrator_with(
        provider: ProviderKind,
        mock: Arc<MockProvider>,
        config: AppConfig,
    ) -> EnhancementOrchestrator {
        let store = MemorySettingsStore::new(config);
        let mut clients: HashMap<ProviderKind, Arc<dyn ProviderClient>> = HashMap::new();
        clients.insert(provider, mock);
        EnhancementOrchestrator::with_clients(store, clients).unwrap()
    }

    fn base_config(provider: ProviderKind) -> AppConfig {
        let mut config = AppConfig::new();
        config.enhancement.enabled = true;
        config.enhancement.active_provider = provider;
        config
    }

    #[test]
    fn test_reconcile_keeps_present_selection() {
        let models = vec![
            RemoteAiModel::new("a", "A"),
            RemoteAiModel::new("b", "B"),
        ];
        assert_eq!(reconcile_selection("b", &models, Some("a")), None);
    }

    #[test]
    fn test_reconcile_prefers_flagship_then_first() {
        let models = vec![
            RemoteAiModel::new("a", "A"),
            RemoteAiModel::new("llama3.2", "Llama 3.2"),
        ];
        assert_eq!(
            reconcile_selection("gone", &models, Some("llama3.2")),
            Some("llama3.2".to_string())
        );
        assert_eq!(
            reconcile_selection("gone", &models, Some("not-there")),
            Some("a".to_string())
        );
        assert_eq!(reconcile_selection("", &models, None), Some("a".to_string()));
    }

    #[test]
    fn test_reconcile_empty_catalog_leaves_selection() {
        assert_eq!(reconcile_selection("kept", &[], Some("x")), None);
    }

    #[tokio::test]
    async fn test_load_models_reconciles_missing_selection() {
        let mock = MockProvider::new(
            ProviderKind::Ollama,
            vec![
                RemoteAiModel::new("mistral", "Mistral"),
                RemoteAiModel::new("llama3.2", "Llama 3.2"),
            ],
        );
        let mut config = base_config(ProviderKind::Ollama);
        config.enhancement.selected_text_model = "deleted-model".to_string();
        let orchestrator = orchestrator_with(ProviderKind::Ollama, mock, config);

        orchestrator.load_models().await;

        let settings = orchestrator.settings();
        assert_eq!(settings.selected_text_model, "llama3.2");
        let state = orchestrator.provider_state(ProviderKind::Ollama);
        assert_eq!(state.text_models.len(), 2);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_load_image_models_filters_vision_keywords() {
        let mock = MockProvider::new(
            ProviderKind::Ollama,
            vec![
                RemoteAiModel::new("llama3.2", "Llama 3.2"),
                RemoteAiModel::new("llava:13b", "LLaVA 13B"),
                RemoteAiModel::new("mistral", "Mistral"),
                RemoteAiModel::new("moondream", "moondream"),
            ],
        );
        let config = base_config(ProviderKind::Ollama);
        let orchestrator = orchestrator_with(ProviderKind::Ollama, mock, config);

        orchestrator.load_image_models().await;

        let state = orchestrator.provider_state(ProviderKind::Ollama);
        let ids: Vec<&str> = state.image_models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["llava:13b", "moondream"]);
        assert_eq!(orchestrator.settings().selected_image_model, "llava:13b");
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_catalog_and_sets_error() {
        let mock = MockProvider::new(
            ProviderKind::Ollama,
            vec![RemoteAiModel::new("llama3.2", "Llama 3.2")],
        );
        let config = base_config(ProviderKind::Ollama);
        let orchestrator = orchestrator_with(ProviderKind::Ollama, mock.clone(), config);

        orchestrator.load_models().await;
        assert_eq!(
            orchestrator.provider_state(ProviderKind::Ollama).text_models.len(),
            1
        );

        mock.fail_fetch.store(true, Ordering::SeqCst);
        orchestrator.load_models().await;

        let state = orchestrator.provider_state(ProviderKind::Ollama);
        assert_eq!(state.text_models.len(), 1, "catalog must survive the failure");
        let error = state.error.expect("error string must be set");
        assert!(error.contains("Ollama"));
        assert_eq!(orchestrator.settings().selected_text_model, "llama3.2");
    }

    #[tokio::test]
    async fn test_unavailable_local_provider_scenario() {
        let mock = MockProvider::new(ProviderKind::Ollama, vec![]);
        mock.available.store(false, Ordering::SeqCst);
        let mut config = base_config(ProviderKind::Ollama);
        config.enhancement.selected_text_model = "kept-model".to_string();
        let orchestrator = orchestrator_with(ProviderKind::Ollama, mock.clone(), config);

        orchestrator.activate().await;

        let state = orchestrator.provider_state(ProviderKind::Ollama);
        assert_eq!(state.available, Some(false));
        assert!(state.error.is_some());
        assert!(state.text_models.is_empty());
        assert_eq!(orchestrator.settings().selected_text_model, "kept-model");
        assert_eq!(mock.fetch_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_credential_does_not_trigger_loads() {
        let mock = MockProvider::new(ProviderKind::Groq, vec![]);
        let config = base_config(ProviderKind::Groq);
        let orchestrator = orchestrator_with(ProviderKind::Groq, mock.clone(), config);

        orchestrator
            .set_credential(ProviderKind::Groq, "gsk_partial".to_string())
            .unwrap();

        assert_eq!(mock.fetch_count.load(Ordering::SeqCst), 0);
        assert_eq!(
            orchestrator.settings().credential(ProviderKind::Groq),
            Some("gsk_partial")
        );
    }

    #[tokio::test]
    async fn test_remote_test_connection_chains_catalog_loads() {
        let mock = MockProvider::new(
            ProviderKind::Groq,
            vec![
                RemoteAiModel::new("llama-3.3-70b-versatile", "llama-3.3-70b-versatile"),
                RemoteAiModel::new(
                    "llama-4-scout-17b",
                    "llama-4-scout-17b",
                ),
            ],
        );
        let mut config = base_config(ProviderKind::Groq);
        config
            .enhancement
            .credentials
            .insert(ProviderKind::Groq, "gsk_test".to_string());
        let orchestrator = orchestrator_with(ProviderKind::Groq, mock.clone(), config);

        assert!(orchestrator.test_connection().await);

        // One fetch for the probe-free mock test_connection default is not
        // counted; both chained catalog loads are.
        assert_eq!(mock.fetch_count.load(Ordering::SeqCst), 2);
        let state = orchestrator.provider_state(ProviderKind::Groq);
        assert_eq!(state.text_models.len(), 2);
        assert_eq!(state.image_models.len(), 1);
        assert_eq!(state.image_models[0].id, "llama-4-scout-17b");
        assert_eq!(
            orchestrator.settings().selected_text_model,
            "llama-3.3-70b-versatile"
        );
    }

    #[tokio::test]
    async fn test_provider_switch_discards_stale_catalog_load() {
        let mock = MockProvider::slow_fetch(
            ProviderKind::Ollama,
            vec![RemoteAiModel::new("llama3.2", "Llama 3.2")],
            Duration::from_millis(100),
        );
        let config = base_config(ProviderKind::Ollama);
        let orchestrator = Arc::new(orchestrator_with(ProviderKind::Ollama, mock, config));

        let load = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.load_models().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        orchestrator
            .set_active_provider(ProviderKind::Groq)
            .await
            .unwrap();
        load.await.unwrap();

        let state = orchestrator.provider_state(ProviderKind::Ollama);
        assert!(
            state.text_models.is_empty(),
            "stale catalog must not be applied after a provider switch"
        );
        assert_eq!(orchestrator.settings().selected_text_model, "");
    }

    #[tokio::test]
    async fn test_provider_switch_invalidates_inflight_connection_test() {
        let mock = MockProvider::slow_available(ProviderKind::Groq, Duration::from_millis(100));
        let mut config = base_config(ProviderKind::Groq);
        config
            .enhancement
            .credentials
            .insert(ProviderKind::Groq, "gsk_test".to_string());
        let orchestrator = Arc::new(orchestrator_with(ProviderKind::Groq, mock.clone(), config));

        let probe = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.test_connection().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        orchestrator
            .set_active_provider(ProviderKind::Ollama)
            .await
            .unwrap();

        assert!(!probe.await.unwrap());
        assert!(orchestrator.provider_state(ProviderKind::Groq).available.is_none());
        assert_eq!(
            mock.fetch_count.load(Ordering::SeqCst),
            0,
            "stale probe must not chain catalog loads"
        );
    }

    #[tokio::test]
    async fn test_enhance_requires_selected_model() {
        let mock = MockProvider::new(ProviderKind::Ollama, vec![]);
        let config = base_config(ProviderKind::Ollama);
        let orchestrator = orchestrator_with(ProviderKind::Ollama, mock, config);

        let err = orchestrator.enhance("text", None, None).await.unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }

    #[tokio::test]
    async fn test_enhance_routes_to_active_provider() {
        let mock = MockProvider::new(ProviderKind::Ollama, vec![]);
        let mut config = base_config(ProviderKind::Ollama);
        config.enhancement.selected_text_model = "llama3.2".to_string();
        let orchestrator = orchestrator_with(ProviderKind::Ollama, mock, config);

        let result = orchestrator.enhance("hello", None, None).await.unwrap();
        assert_eq!(result, "enhanced: hello");
    }
}
