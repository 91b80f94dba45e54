use tagnest_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TagError>;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    #[error("Invalid depth {depth}: expected a value in 1..={max}")]
    InvalidDepth { depth: usize, max: usize },

    #[error("Invalid tag argument: {0}")]
    InvalidTagArgument(String),

    #[error("Duplicate key: tag '{name}' already exists in namespace {namespace:?}")]
    DuplicateKey {
        name: String,
        namespace: Option<String>,
    },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TagError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { name, namespace } => Self::DuplicateKey { name, namespace },
            StoreError::MissingTag(id) => Self::UnknownTag(format!("id {id}")),
            StoreError::InvalidInput(msg) => Self::InvalidTagArgument(msg),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagnest_store::TagId;

    #[test]
    fn store_errors_map_onto_engine_conditions() {
        let dup: TagError = StoreError::DuplicateKey {
            name: "war".to_string(),
            namespace: None,
        }
        .into();
        assert!(matches!(dup, TagError::DuplicateKey { ref name, .. } if name == "war"));

        let missing: TagError = StoreError::MissingTag(TagId(7)).into();
        assert!(matches!(missing, TagError::UnknownTag(ref what) if what == "id 7"));

        let other: TagError = StoreError::Other("boom".to_string()).into();
        assert!(matches!(other, TagError::Store(_)));
    }
}
