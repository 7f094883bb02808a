#![forbid(unsafe_code)]

//! AI-powered enhancement and on-device model lifecycle for dictation.
//!
//! Layout follows a ports-and-adapters split: `domain` holds the pure types
//! and response normalization, `ports` the trait seams, `adapters` the HTTP
//! and filesystem implementations, and `app` the orchestration on top.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use app::{EnhancementOrchestrator, ModelLifecycleManager, ProviderState};
pub use domain::{
    AppConfig, DomainError, EnhancementConfig, EnhancementOptions, ProviderCategory,
    ProviderKind, RemoteAiModel,
};
pub use ports::{ModelRepository, ProviderClient, SettingsStore};
