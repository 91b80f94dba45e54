use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object type under which tags are stored when they are themselves tagged.
///
/// Edges with this object type are the tag-to-tag graph the closure walks.
pub const TAG_OBJECT_TYPE: &str = "tagnest::Tag";

/// Opaque tag identifier, allocated by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub i64);

impl TagId {
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TagId {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .parse::<i64>()
            .map(Self)
            .map_err(|_| StoreError::InvalidRow(format!("'{value}' is not a tag id")))
    }
}

/// Tag record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,

    /// Unique within `namespace`
    pub name: String,

    /// Partition key; `None` is a partition of its own
    pub namespace: Option<String>,

    pub description: Option<String>,

    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Insert payload for the tags table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub namespace: Option<String>,
    pub description: Option<String>,
}

impl NewTag {
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: normalize_namespace(namespace),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Association between a tag and a tagged object.
///
/// The triple `(tag_id, object_type, object_id)` is the identity of the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub tag_id: TagId,
    pub object_type: String,
    pub object_id: String,
    pub created_at_ms: i64,
}

/// Insert payload for the tagged table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NewEdge {
    pub tag_id: TagId,
    pub object_type: String,
    pub object_id: String,
}

impl NewEdge {
    pub fn new(tag_id: TagId, object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            tag_id,
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }
}

/// Empty namespaces collapse into the `None` partition.
#[must_use]
pub fn normalize_namespace(namespace: Option<&str>) -> Option<String> {
    namespace.filter(|ns| !ns.is_empty()).map(str::to_string)
}

pub(crate) fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
