pub mod config;
pub mod enhancement;
pub mod error;
pub mod model;
pub mod normalize;

pub use config::{AppConfig, DictationConfig, EnhancementConfig, LoggingConfig};
pub use enhancement::{EnhancementOptions, ProviderCategory, ProviderKind};
pub use error::DomainError;
pub use model::{
    CuratedModelInfo, ModelState, ModelWarmStatus, RemoteAiModel, CURATED_MODELS,
};
