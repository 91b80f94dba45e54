use crate::backend::{EdgeFilter, TagBackend};
use crate::error::Result;
use crate::types::{Edge, NewEdge, TagId};
use std::collections::BTreeSet;

/// Attach/detach facts between tags and objects of one `object_type`.
///
/// No traversal happens here; the closure resolver and query engine build on
/// these primitives.
pub struct AssociationStore<'a, B> {
    backend: &'a B,
}

impl<'a, B: TagBackend> AssociationStore<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Tag one object with every tag in `tag_ids`.
    pub fn attach(&self, tag_ids: &BTreeSet<TagId>, object_type: &str, object_id: &str) -> Result<usize> {
        let rows: Vec<NewEdge> = tag_ids
            .iter()
            .map(|tag_id| NewEdge::new(*tag_id, object_type, object_id))
            .collect();
        self.backend.insert_edges(&rows)
    }

    /// Bulk-insert the cross product `tag_ids × object_ids`.
    pub fn attach_many(
        &self,
        tag_ids: &BTreeSet<TagId>,
        object_type: &str,
        object_ids: &BTreeSet<String>,
    ) -> Result<usize> {
        let rows: Vec<NewEdge> = tag_ids
            .iter()
            .flat_map(|tag_id| {
                object_ids
                    .iter()
                    .map(move |object_id| NewEdge::new(*tag_id, object_type, object_id.as_str()))
            })
            .collect();
        let created = self.backend.insert_edges(&rows)?;
        log::debug!(
            "Attached {} tags to {} {} objects ({} new edges)",
            tag_ids.len(),
            object_ids.len(),
            object_type,
            created
        );
        Ok(created)
    }

    /// `tag_id ∈ tag_ids AND object_id ∈ object_ids AND object_type = t`
    pub fn detach(
        &self,
        tag_ids: &BTreeSet<TagId>,
        object_type: &str,
        object_ids: &BTreeSet<String>,
    ) -> Result<usize> {
        self.backend.delete_edges(
            &EdgeFilter::object_type(object_type)
                .with_tag_ids(tag_ids.iter().copied())
                .with_object_ids(object_ids.iter().cloned()),
        )
    }

    /// Remove every edge of the given objects, whatever the tag.
    pub fn detach_all_for_objects(&self, object_type: &str, object_ids: &BTreeSet<String>) -> Result<usize> {
        self.backend.delete_edges(
            &EdgeFilter::object_type(object_type).with_object_ids(object_ids.iter().cloned()),
        )
    }

    pub fn tag_ids_for(&self, object_type: &str, object_id: &str) -> Result<BTreeSet<TagId>> {
        Ok(self
            .backend
            .select_edges(&EdgeFilter::object_type(object_type).with_object_ids([object_id]))?
            .into_iter()
            .map(|edge| edge.tag_id)
            .collect())
    }

    /// Distinct tag ids held by any of `object_ids`.
    pub fn tag_ids_for_objects(
        &self,
        object_type: &str,
        object_ids: &BTreeSet<String>,
    ) -> Result<BTreeSet<TagId>> {
        Ok(self
            .edges_for(object_type, None, Some(object_ids))?
            .into_iter()
            .map(|edge| edge.tag_id)
            .collect())
    }

    /// Objects holding an edge to *any* of `tag_ids`.
    pub fn object_ids_for(&self, object_type: &str, tag_ids: &BTreeSet<TagId>) -> Result<BTreeSet<String>> {
        Ok(self
            .edges_for(object_type, Some(tag_ids), None)?
            .into_iter()
            .map(|edge| edge.object_id)
            .collect())
    }

    /// Joined view of edges in one query. `None` leaves that side unrestricted.
    pub fn edges_for(
        &self,
        object_type: &str,
        tag_ids: Option<&BTreeSet<TagId>>,
        object_ids: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Edge>> {
        let mut filter = EdgeFilter::object_type(object_type);
        if let Some(tag_ids) = tag_ids {
            filter = filter.with_tag_ids(tag_ids.iter().copied());
        }
        if let Some(object_ids) = object_ids {
            filter = filter.with_object_ids(object_ids.iter().cloned());
        }
        self.backend.select_edges(&filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::registry::TagRegistry;

    fn ids<'t>(tags: impl IntoIterator<Item = &'t crate::Tag>) -> BTreeSet<TagId> {
        tags.into_iter().map(|tag| tag.id).collect()
    }

    fn objects(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn attach_many_inserts_cross_product() {
        let backend = MemoryBackend::new();
        let tags = TagRegistry::new(&backend)
            .create_many(["a", "b", "c"], None)
            .unwrap();
        let store = AssociationStore::new(&backend);

        let created = store
            .attach_many(&ids(&tags), "app::Post", &objects(&["1", "2"]))
            .unwrap();
        assert_eq!(created, 6);
        assert_eq!(store.edges_for("app::Post", None, None).unwrap().len(), 6);
    }

    #[test]
    fn object_types_never_share_edges() {
        let backend = MemoryBackend::new();
        let tags = TagRegistry::new(&backend).create_many(["a"], None).unwrap();
        let store = AssociationStore::new(&backend);

        store.attach(&ids(&tags), "app::Post", "1").unwrap();
        assert_eq!(store.tag_ids_for("app::Post", "1").unwrap(), ids(&tags));
        assert!(store.tag_ids_for("app::Video", "1").unwrap().is_empty());
    }

    #[test]
    fn detach_only_removes_matching_triples() {
        let backend = MemoryBackend::new();
        let tags = TagRegistry::new(&backend)
            .create_many(["a", "b"], None)
            .unwrap();
        let store = AssociationStore::new(&backend);
        store
            .attach_many(&ids(&tags), "app::Post", &objects(&["1", "2"]))
            .unwrap();

        let removed = store
            .detach(&ids(&tags[..1]), "app::Post", &objects(&["1"]))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.tag_ids_for("app::Post", "1").unwrap(), ids(&tags[1..]));
        assert_eq!(store.tag_ids_for("app::Post", "2").unwrap(), ids(&tags));

        store
            .detach_all_for_objects("app::Post", &objects(&["1", "2"]))
            .unwrap();
        assert!(store.edges_for("app::Post", None, None).unwrap().is_empty());
    }

    #[test]
    fn object_ids_for_is_an_any_match() {
        let backend = MemoryBackend::new();
        let tags = TagRegistry::new(&backend)
            .create_many(["a", "b"], None)
            .unwrap();
        let store = AssociationStore::new(&backend);
        store.attach(&ids(&tags[..1]), "app::Post", "1").unwrap();
        store.attach(&ids(&tags[1..]), "app::Post", "2").unwrap();

        assert_eq!(
            store.object_ids_for("app::Post", &ids(&tags)).unwrap(),
            objects(&["1", "2"])
        );
    }
}
