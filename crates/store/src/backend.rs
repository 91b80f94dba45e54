use crate::error::{Result, StoreError};
use crate::types::{normalize_namespace, Edge, NewEdge, NewTag, Tag, TagId};
use std::collections::BTreeSet;

/// Predicate over the tags table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    All,

    /// `id IN (...)`
    Ids(BTreeSet<TagId>),

    /// `namespace IS ? AND name IN (...)`
    Names {
        names: BTreeSet<String>,
        namespace: Option<String>,
    },
}

impl TagFilter {
    pub fn ids(ids: impl IntoIterator<Item = TagId>) -> Self {
        Self::Ids(ids.into_iter().collect())
    }

    pub fn names<I, S>(names: I, namespace: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names {
            names: names.into_iter().map(Into::into).collect(),
            namespace: normalize_namespace(namespace),
        }
    }

    /// True when a membership set is empty, so no row can match.
    #[must_use]
    pub fn is_vacuous(&self) -> bool {
        match self {
            Self::All => false,
            Self::Ids(ids) => ids.is_empty(),
            Self::Names { names, .. } => names.is_empty(),
        }
    }

    #[must_use]
    pub fn matches(&self, tag: &Tag) -> bool {
        match self {
            Self::All => true,
            Self::Ids(ids) => ids.contains(&tag.id),
            Self::Names { names, namespace } => {
                tag.namespace == *namespace && names.contains(&tag.name)
            }
        }
    }
}

/// Predicate over the tagged table.
///
/// `object_type` is always an equality predicate so edges of unrelated object
/// kinds never mix, even when their object ids collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeFilter {
    pub object_type: String,
    pub tag_ids: Option<BTreeSet<TagId>>,
    pub object_ids: Option<BTreeSet<String>>,
}

impl EdgeFilter {
    pub fn object_type(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            tag_ids: None,
            object_ids: None,
        }
    }

    pub fn with_tag_ids(mut self, tag_ids: impl IntoIterator<Item = TagId>) -> Self {
        self.tag_ids = Some(tag_ids.into_iter().collect());
        self
    }

    pub fn with_object_ids<I, S>(mut self, object_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.object_ids = Some(object_ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn is_vacuous(&self) -> bool {
        self.tag_ids.as_ref().is_some_and(BTreeSet::is_empty)
            || self.object_ids.as_ref().is_some_and(BTreeSet::is_empty)
    }

    #[must_use]
    pub fn matches(&self, edge: &Edge) -> bool {
        edge.object_type == self.object_type
            && self
                .tag_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&edge.tag_id))
            && self
                .object_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&edge.object_id))
    }
}

/// Storage collaborator for tags and their associations.
///
/// Implementations answer equality and membership predicates, and perform
/// bulk inserts and deletes. Each method is a single logical statement: it
/// either applies completely or not at all.
pub trait TagBackend {
    /// Insert tags, failing the whole batch with [`StoreError::DuplicateKey`]
    /// if any `(name, namespace)` pair is already taken or repeated.
    fn insert_tags(&self, rows: &[NewTag]) -> Result<Vec<TagId>>;

    /// Matching tags in ascending id order.
    fn select_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>>;

    /// Delete matching tags together with every edge that references them,
    /// both as the owning tag and as the tagged object.
    fn delete_tags(&self, filter: &TagFilter) -> Result<usize>;

    /// Insert edges, skipping triples that already exist. Returns the number
    /// of edges created.
    fn insert_edges(&self, rows: &[NewEdge]) -> Result<usize>;

    /// Matching edges ordered by `(tag_id, object_type, object_id)`.
    fn select_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>>;

    fn delete_edges(&self, filter: &EdgeFilter) -> Result<usize>;

    /// Run `f` so that its writes become visible all-or-nothing.
    fn atomically<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<StoreError>;
}

/// Rejects a batch that names the same `(name, namespace)` twice.
pub(crate) fn check_batch_unique(rows: &[NewTag]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for row in rows {
        if row.name.is_empty() {
            return Err(StoreError::InvalidInput("tag name must not be empty".to_string()));
        }
        let namespace = normalize_namespace(row.namespace.as_deref());
        if !seen.insert((row.name.clone(), namespace.clone())) {
            return Err(StoreError::DuplicateKey {
                name: row.name.clone(),
                namespace,
            });
        }
    }
    Ok(())
}
