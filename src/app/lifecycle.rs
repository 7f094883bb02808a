//! On-device dictation model lifecycle: download, prewarm, delete.
//!
//! Selection changes and downloads go through keyed cancellation slots so a
//! newer request always wins over one still in flight.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::app::slots::TaskSlots;
use crate::domain::model::{CuratedModelInfo, CURATED_MODELS};
use crate::domain::{DomainError, ModelState, ModelWarmStatus};
use crate::ports::provider::ProgressFn;
use crate::ports::{ModelRepository, SettingsStore};

const SLOT_DOWNLOAD: &str = "download";
const SLOT_PREWARM: &str = "prewarm";

struct LifecycleState {
    selected_model: String,
    models: HashMap<String, ModelState>,
    last_error: Option<String>,
}

pub struct ModelLifecycleManager {
    repo: Arc<dyn ModelRepository>,
    store: Arc<dyn SettingsStore>,
    state: Arc<RwLock<LifecycleState>>,
    slots: TaskSlots,
}

impl ModelLifecycleManager {
    /// Build from persisted settings. Warm status is reset to `Cold`:
    /// models are not resident across process restarts.
    pub fn new(
        store: Arc<dyn SettingsStore>,
        repo: Arc<dyn ModelRepository>,
    ) -> Result<Self, DomainError> {
        let mut config = store.load()?;
        if config.dictation.warm_status != ModelWarmStatus::Cold {
            config = store.update(&mut |c| c.dictation.warm_status = ModelWarmStatus::Cold)?;
        }

        let mut models = HashMap::new();
        for name in repo.available_models() {
            let state = if repo.is_downloaded(&name) {
                ModelState::Downloaded {
                    warm: ModelWarmStatus::Cold,
                }
            } else {
                ModelState::NotDownloaded
            };
            models.insert(name, state);
        }

        Ok(Self {
            repo,
            store,
            state: Arc::new(RwLock::new(LifecycleState {
                selected_model: config.dictation.selected_model,
                models,
                last_error: None,
            })),
            slots: TaskSlots::new(),
        })
    }

    pub fn selected_model(&self) -> String {
        self.state.read().selected_model.clone()
    }

    pub fn model_state(&self, name: &str) -> ModelState {
        self.state
            .read()
            .models
            .get(name)
            .copied()
            .unwrap_or(ModelState::NotDownloaded)
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    /// The curated catalog, with download status joined in at read time.
    pub fn curated_models(&self) -> Vec<CuratedModelInfo> {
        CURATED_MODELS
            .iter()
            .map(|entry| CuratedModelInfo {
                display_name: entry.display_name.to_string(),
                internal_name: entry.internal_name.to_string(),
                accuracy_stars: entry.accuracy_stars,
                speed_stars: entry.speed_stars,
                storage_size_label: entry.storage_size_label.to_string(),
                is_downloaded: self.repo.is_downloaded(entry.internal_name),
            })
            .collect()
    }

    pub fn recommended_default(&self) -> String {
        self.repo.recommended_default()
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.repo.storage_dir()
    }

    /// Write through the store's atomic update so a concurrent enhancement
    /// persist never clobbers the dictation section.
    fn persist_dictation<F>(&self, mut mutate: F) -> Result<(), DomainError>
    where
        F: FnMut(&mut crate::domain::DictationConfig),
    {
        self.store.update(&mut |app| mutate(&mut app.dictation))?;
        Ok(())
    }

    fn set_model_state(&self, name: &str, state: ModelState) {
        self.state.write().models.insert(name.to_string(), state);
    }

    /// Select a dictation model. A stale prewarm is cancelled; if the model
    /// is already on disk the new selection is prewarmed immediately.
    pub async fn select_model(&self, name: &str) -> Result<(), DomainError> {
        self.slots.cancel(SLOT_PREWARM);

        {
            let mut state = self.state.write();
            state.selected_model = name.to_string();
        }
        self.persist_dictation(|d| {
            d.selected_model = name.to_string();
            d.warm_status = ModelWarmStatus::Cold;
        })?;
        info!(model = name, "Dictation model selected");

        if self.repo.is_downloaded(name) {
            self.prewarm(name, None).await;
        }
        Ok(())
    }

    /// Download a model artifact. Starting a new download cancels the one in
    /// flight; the superseded model returns to `NotDownloaded`.
    ///
    /// Repository progress arrives on the download task; it is re-marshaled
    /// into the shared state map before reaching the caller's callback.
    pub async fn download(&self, name: &str, progress: Option<ProgressFn>) {
        let token = self.slots.begin(SLOT_DOWNLOAD);
        self.set_model_state(name, ModelState::Downloading { progress: 0.0 });
        self.state.write().last_error = None;

        let repo_progress: ProgressFn = {
            let state = Arc::clone(&self.state);
            let token = token.clone();
            let name = name.to_string();
            Arc::new(move |p: f32| {
                if token.is_cancelled() {
                    return;
                }
                state
                    .write()
                    .models
                    .insert(name.clone(), ModelState::Downloading { progress: p });
                if let Some(cb) = &progress {
                    cb(p);
                }
            })
        };

        let result = tokio::select! {
            _ = token.cancelled() => {
                self.reset_if_downloading(name);
                return;
            }
            result = self.repo.download(name, Some(repo_progress)) => result,
        };
        if token.is_cancelled() {
            self.reset_if_downloading(name);
            return;
        }
        self.slots.finish(SLOT_DOWNLOAD, &token);

        match result {
            Ok(()) => {
                self.set_model_state(
                    name,
                    ModelState::Downloaded {
                        warm: ModelWarmStatus::Cold,
                    },
                );
                info!(model = name, "Download complete");
                let still_selected = self.state.read().selected_model == name;
                if still_selected {
                    self.prewarm(name, None).await;
                }
            }
            Err(e) => {
                warn!(model = name, error = %e, "Download failed");
                self.set_model_state(name, ModelState::NotDownloaded);
                self.state.write().last_error = Some(format!("{}: {}", name, e));
            }
        }
    }

    fn reset_if_downloading(&self, name: &str) {
        let mut state = self.state.write();
        if matches!(
            state.models.get(name),
            Some(ModelState::Downloading { .. })
        ) {
            state.models.insert(name.to_string(), ModelState::NotDownloaded);
        }
    }

    /// Page a downloaded model into memory ahead of first use.
    pub async fn prewarm(&self, name: &str, progress: Option<ProgressFn>) {
        if !self.repo.is_downloaded(name) {
            return;
        }

        let token = self.slots.begin(SLOT_PREWARM);
        self.set_model_state(
            name,
            ModelState::Downloaded {
                warm: ModelWarmStatus::Warming,
            },
        );
        let selected = self.state.read().selected_model == name;
        if selected {
            if self
                .persist_dictation(|d| d.warm_status = ModelWarmStatus::Warming)
                .is_err()
            {
                warn!(model = name, "Failed to persist warm status");
            }
        }

        let result = tokio::select! {
            _ = token.cancelled() => {
                self.reset_if_warming(name);
                return;
            }
            result = self.repo.prewarm(name, progress) => result,
        };
        if token.is_cancelled() {
            self.reset_if_warming(name);
            return;
        }
        self.slots.finish(SLOT_PREWARM, &token);

        let warm = match result {
            Ok(()) => ModelWarmStatus::Warm,
            Err(ref e) => {
                warn!(model = name, error = %e, "Prewarm failed");
                ModelWarmStatus::Cold
            }
        };
        self.set_model_state(name, ModelState::Downloaded { warm });
        if selected {
            if self
                .persist_dictation(|d| d.warm_status = warm)
                .is_err()
            {
                warn!(model = name, "Failed to persist warm status");
            }
        }
    }

    fn reset_if_warming(&self, name: &str) {
        let mut state = self.state.write();
        if matches!(
            state.models.get(name),
            Some(ModelState::Downloaded {
                warm: ModelWarmStatus::Warming
            })
        ) {
            state.models.insert(
                name.to_string(),
                ModelState::Downloaded {
                    warm: ModelWarmStatus::Cold,
                },
            );
        }
    }

    /// Remove a model artifact from disk, then re-derive every model's state
    /// from the repository so the map converges to ground truth.
    pub async fn delete(&self, name: &str) -> Result<(), DomainError> {
        self.repo.delete(name).await?;
        self.refresh_states();

        let was_selected = self.state.read().selected_model == name;
        if was_selected {
            self.persist_dictation(|d| d.warm_status = ModelWarmStatus::Cold)?;
        }
        Ok(())
    }

    /// Rebuild the state map from the repository. In-flight `Downloading`
    /// entries are preserved; everything else follows the disk.
    fn refresh_states(&self) {
        let names = self.repo.available_models();
        let mut state = self.state.write();
        for name in names {
            if matches!(
                state.models.get(&name),
                Some(ModelState::Downloading { .. })
            ) {
                continue;
            }
            let next = if self.repo.is_downloaded(&name) {
                match state.models.get(&name) {
                    Some(ModelState::Downloaded { warm }) => {
                        ModelState::Downloaded { warm: *warm }
                    }
                    _ => ModelState::Downloaded {
                        warm: ModelWarmStatus::Cold,
                    },
                }
            } else {
                ModelState::NotDownloaded
            };
            state.models.insert(name, next);
        }
    }

    /// Reveal the model storage directory in the OS file browser.
    pub fn open_storage_location(&self) -> Result<(), DomainError> {
        let dir = self.repo.storage_dir();
        std::fs::create_dir_all(&dir)?;

        #[cfg(target_os = "macos")]
        let opener = "open";
        #[cfg(target_os = "linux")]
        let opener = "xdg-open";
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        let opener = "explorer";

        std::process::Command::new(opener)
            .arg(&dir)
            .spawn()
            .map_err(|e| DomainError::Io(e.to_string()))?;
        Ok(())
    }
}
