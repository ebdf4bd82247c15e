use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhaiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("Page script error: {0}")]
    Script(String),

    #[error("Detail panel not found after {attempts} attempts")]
    PanelNotFound { attempts: u32 },

    #[error("Image fetch failed: {0}")]
    Fetch(String),

    #[error("Inference request failed: {0}")]
    Inference(String),

    #[error("A scan is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, PhaiError>;
