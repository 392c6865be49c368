use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Could not recover a JSON object from model output: {raw}")]
    MalformedResponse { raw: String },

    #[error("No invoice records to aggregate")]
    EmptyDataset,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InsightsError>;
