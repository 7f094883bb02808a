use serde::{Deserialize, Serialize};

/// A model reported by a provider's catalog endpoint.
///
/// Ephemeral: rebuilt on every catalog fetch, identity is `id` within one
/// fetch only. Fields a backend does not report default to zero/false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAiModel {
    /// Opaque, backend-defined identifier used in API calls.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Publishing organization as reported by the backend.
    pub owned_by: String,
    /// Maximum context window in tokens (0 = unknown).
    pub context_window_tokens: u64,
    /// Maximum completion tokens (0 = unknown).
    pub max_completion_tokens: u64,
    /// Whether the backend reports the model as currently usable.
    pub active: bool,
}

impl RemoteAiModel {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            owned_by: String::new(),
            context_window_tokens: 0,
            max_completion_tokens: 0,
            active: true,
        }
    }
}

/// Sort a freshly fetched catalog by display name, ascending, case-sensitive.
pub fn sort_catalog(models: &mut [RemoteAiModel]) {
    models.sort_by(|a, b| a.display_name.cmp(&b.display_name));
}

/// Substrings identifying vision-capable models across all providers.
pub const VISION_MODEL_KEYWORDS: &[&str] = &[
    "gemini",
    "gemma",
    "llava",
    "vl",
    "vision",
    "minicpm",
    "moondream",
    "llama-4",
];

/// Whether a model's id or display name matches the vision keyword set,
/// case-insensitively.
pub fn is_vision_model(model: &RemoteAiModel) -> bool {
    let id = model.id.to_lowercase();
    let name = model.display_name.to_lowercase();
    VISION_MODEL_KEYWORDS
        .iter()
        .any(|kw| id.contains(kw) || name.contains(kw))
}

/// Whether an on-device dictation model is loaded into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelWarmStatus {
    /// Downloaded but not resident.
    #[default]
    Cold,
    /// Warm-up in progress.
    Warming,
    /// Resident and ready for first use.
    Warm,
}

/// Lifecycle state of an on-device dictation model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "state")]
pub enum ModelState {
    NotDownloaded,
    Downloading { progress: f32 },
    Downloaded { warm: ModelWarmStatus },
}

/// A hand-picked downloadable dictation model with quality/speed ratings.
///
/// `is_downloaded` is derived from the model repository at read time and is
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratedModelInfo {
    pub display_name: String,
    /// Join key into the downloadable-model catalog.
    pub internal_name: String,
    /// Accuracy rating, 0-5.
    pub accuracy_stars: u8,
    /// Speed rating, 0-5.
    pub speed_stars: u8,
    /// Pre-formatted on-disk size, e.g. "626 MB".
    pub storage_size_label: String,
    pub is_downloaded: bool,
}

/// Static entry backing a `CuratedModelInfo`.
pub struct CuratedModelEntry {
    pub display_name: &'static str,
    pub internal_name: &'static str,
    pub accuracy_stars: u8,
    pub speed_stars: u8,
    pub storage_size_label: &'static str,
}

/// The curated subset of downloadable dictation models.
pub static CURATED_MODELS: &[CuratedModelEntry] = &[
    CuratedModelEntry {
        display_name: "Fast",
        internal_name: "whisper-base",
        accuracy_stars: 2,
        speed_stars: 5,
        storage_size_label: "145 MB",
    },
    CuratedModelEntry {
        display_name: "Balanced",
        internal_name: "whisper-small",
        accuracy_stars: 3,
        speed_stars: 4,
        storage_size_label: "483 MB",
    },
    CuratedModelEntry {
        display_name: "Accurate",
        internal_name: "whisper-large-v3-turbo",
        accuracy_stars: 5,
        speed_stars: 3,
        storage_size_label: "1.6 GB",
    },
];
