use thiserror::Error;

/// Domain-level errors for Voxwrite.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API key required for {0}")]
    MissingCredential(String),

    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP {code}: {body}")]
    BadStatus { code: u16, body: String },

    #[error("Failed to decode response: {0}")]
    DecodeFailure(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("{0} does not support image analysis")]
    CapabilityUnsupported(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model download failed: {0}")]
    ModelDownload(String),

    #[error("Model verification failed: expected {expected}, got {actual}")]
    ModelVerification { expected: String, actual: String },

    #[error("Model warm-up failed: {0}")]
    ModelPrewarm(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Map a reqwest transport error onto the taxonomy.
    /// Timeouts and connection failures both surface as `Unreachable`.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DomainError::Unreachable("request timed out".to_string())
        } else if err.is_connect() {
            DomainError::Unreachable(format!("connection failed: {}", err))
        } else {
            DomainError::Unreachable(err.to_string())
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
