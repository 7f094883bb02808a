pub mod gemini;
pub mod groq;
pub mod http;
pub mod lmstudio;
pub mod model_repo;
pub mod ollama;
pub mod settings_store;

pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use lmstudio::LmStudioClient;
pub use model_repo::LocalModelRepository;
pub use ollama::OllamaClient;
pub use settings_store::TomlSettingsStore;
