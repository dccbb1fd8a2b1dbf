use thiserror::Error;

/// Error type for the Certum binary, aggregating errors from the registry
/// crates and the host's own IO, configuration and serialization.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("registry error: {0}")]
    Registry(#[from] certum_registry::RegistryErrorDetail),

    #[error("core error: {0}")]
    Core(#[from] certum_core::CoreError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
