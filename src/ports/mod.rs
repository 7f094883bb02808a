pub mod config;
pub mod model_repo;
pub mod provider;

pub use config::SettingsStore;
pub use model_repo::ModelRepository;
pub use provider::{ProgressFn, ProviderClient};
