use crate::types::TagId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate key: tag '{name}' already exists in namespace {namespace:?}")]
    DuplicateKey {
        name: String,
        namespace: Option<String>,
    },

    #[error("Tag {0} does not exist")]
    MissingTag(TagId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
