use thiserror::Error;

use crate::sync::gateway::GatewayError;

pub type Result<T> = std::result::Result<T, KanbanError>;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("List not found: {0}")]
    ListNotFound(String),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("No conflict recorded for: {0}")]
    ConflictNotFound(String),

    #[error("Invalid entity ID: {0:?}")]
    InvalidEntityId(String),

    #[error("Validation error in field '{field}': {message}")]
    Validation { field: &'static str, message: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Remote gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl KanbanError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
