//! Tag loading and tagging for whole collections of objects.
//!
//! Every operation here costs a fixed number of backend queries, independent
//! of how many objects are passed in. Joins happen in memory through hash
//! maps keyed by object id and tag id.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tagnest_store::{AssociationStore, Tag, TagBackend, TagFilter, TagId};

use crate::error::Result;
use crate::resolve::{resolve_tag_ids, resolve_tags};
use crate::taggable::{TagRef, Taggable};

/// An object paired with the tags loaded for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithTags<T, V = Tag> {
    pub object: T,
    pub tags: Vec<V>,
}

pub struct BatchLoader<'a, B> {
    backend: &'a B,
}

impl<'a, B: TagBackend> BatchLoader<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    fn associations(&self) -> AssociationStore<'a, B> {
        AssociationStore::new(self.backend)
    }

    /// Tag every object with every tag, as one bulk insert.
    pub fn attach_tags_to_objects<T: Taggable>(
        &self,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        objects: &[T],
        namespace: Option<&str>,
    ) -> Result<usize> {
        let tag_ids = resolve_tag_ids(self.backend, tags, namespace)?;
        let object_ids = object_ids(objects);
        Ok(self
            .associations()
            .attach_many(&tag_ids, T::KIND, &object_ids)?)
    }

    pub fn attach_tag_to_objects<T: Taggable>(
        &self,
        tag: impl Into<TagRef>,
        objects: &[T],
        namespace: Option<&str>,
    ) -> Result<usize> {
        let tag: TagRef = tag.into();
        self.attach_tags_to_objects([tag], objects, namespace)
    }

    pub fn detach_tags_from_objects<T: Taggable>(
        &self,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        objects: &[T],
        namespace: Option<&str>,
    ) -> Result<usize> {
        let tag_ids = resolve_tag_ids(self.backend, tags, namespace)?;
        let object_ids = object_ids(objects);
        Ok(self.associations().detach(&tag_ids, T::KIND, &object_ids)?)
    }

    /// Remove all edges of the given objects, e.g. before deleting them.
    pub fn detach_all_from_objects<T: Taggable>(&self, objects: &[T]) -> Result<usize> {
        let object_ids = object_ids(objects);
        if object_ids.is_empty() {
            return Ok(0);
        }
        Ok(self
            .associations()
            .detach_all_for_objects(T::KIND, &object_ids)?)
    }

    /// Pair each object with its direct tags, ascending by tag id.
    pub fn with_tags<T: Taggable>(
        &self,
        objects: impl IntoIterator<Item = T>,
    ) -> Result<Vec<WithTags<T, Tag>>> {
        self.with_tags_mapped(objects, Tag::clone)
    }

    pub fn with_tag_names<T: Taggable>(
        &self,
        objects: impl IntoIterator<Item = T>,
    ) -> Result<Vec<WithTags<T, String>>> {
        self.with_tags_mapped(objects, |tag| tag.name.clone())
    }

    /// Pair each object with `mapper` applied to each of its direct tags.
    ///
    /// Two queries: the edges of all objects, then the distinct tags those
    /// edges reference. Output keeps the input order.
    pub fn with_tags_mapped<T, V, F>(
        &self,
        objects: impl IntoIterator<Item = T>,
        mut mapper: F,
    ) -> Result<Vec<WithTags<T, V>>>
    where
        T: Taggable,
        F: FnMut(&Tag) -> V,
    {
        let mut loaded: Vec<WithTags<T, V>> = objects
            .into_iter()
            .map(|object| WithTags {
                object,
                tags: Vec::new(),
            })
            .collect();
        if loaded.is_empty() {
            return Ok(loaded);
        }

        let mut slots: HashMap<String, Vec<usize>> = HashMap::with_capacity(loaded.len());
        for (index, item) in loaded.iter().enumerate() {
            slots.entry(item.object.object_id()).or_default().push(index);
        }

        let object_ids: BTreeSet<String> = slots.keys().cloned().collect();
        let edges = self
            .associations()
            .edges_for(T::KIND, None, Some(&object_ids))?;
        let tag_ids: BTreeSet<TagId> = edges.iter().map(|edge| edge.tag_id).collect();
        let tags: HashMap<TagId, Tag> = self
            .backend
            .select_tags(&TagFilter::Ids(tag_ids))?
            .into_iter()
            .map(|tag| (tag.id, tag))
            .collect();

        for edge in &edges {
            let (Some(tag), Some(indexes)) = (tags.get(&edge.tag_id), slots.get(&edge.object_id))
            else {
                continue;
            };
            for &index in indexes {
                loaded[index].tags.push(mapper(tag));
            }
        }

        log::debug!(
            "Joined {} edges onto {} {} objects",
            edges.len(),
            loaded.len(),
            T::KIND
        );
        Ok(loaded)
    }

    /// Group objects under the names of their own direct tags.
    ///
    /// Objects without tags appear in no group.
    pub fn group_by_tag_name<T: Taggable + Clone>(
        &self,
        objects: &[T],
    ) -> Result<BTreeMap<String, Vec<T>>> {
        let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
        for item in self.with_tag_names(objects.iter())? {
            for name in item.tags {
                groups.entry(name).or_default().push(item.object.clone());
            }
        }
        Ok(groups)
    }

    /// Group objects under the names of `tags`, considering only those tags.
    ///
    /// One query for the tags, one for the edges between them and the
    /// objects. Tags that no object carries get no entry.
    pub fn group_by_given_tags<T: Taggable + Clone>(
        &self,
        objects: &[T],
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<T>>> {
        let tags = resolve_tags(self.backend, tags, namespace)?;
        let names: HashMap<TagId, &str> = tags
            .iter()
            .map(|tag| (tag.id, tag.name.as_str()))
            .collect();

        let mut by_id: HashMap<String, Vec<&T>> = HashMap::with_capacity(objects.len());
        for object in objects {
            by_id.entry(object.object_id()).or_default().push(object);
        }
        if by_id.is_empty() {
            return Ok(BTreeMap::new());
        }

        let tag_ids: BTreeSet<TagId> = names.keys().copied().collect();
        let object_ids: BTreeSet<String> = by_id.keys().cloned().collect();
        let edges = self
            .associations()
            .edges_for(T::KIND, Some(&tag_ids), Some(&object_ids))?;

        let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
        for edge in &edges {
            let (Some(name), Some(members)) = (names.get(&edge.tag_id), by_id.get(&edge.object_id))
            else {
                continue;
            };
            groups
                .entry((*name).to_string())
                .or_default()
                .extend(members.iter().map(|object| (*object).clone()));
        }
        Ok(groups)
    }
}

fn object_ids<T: Taggable>(objects: &[T]) -> BTreeSet<String> {
    objects.iter().map(|object| object.object_id()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TagEngine;
    use pretty_assertions::assert_eq;
    use tagnest_store::MemoryBackend;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item(u32);

    impl Taggable for Item {
        const KIND: &'static str = "test::Item";

        fn object_id(&self) -> String {
            self.0.to_string()
        }
    }

    fn seeded() -> TagEngine<MemoryBackend> {
        let engine = TagEngine::new(MemoryBackend::new());
        engine.create_tags(["x", "y", "z"], None).unwrap();
        engine
    }

    #[test]
    fn attach_and_detach_across_objects() {
        let engine = seeded();
        let batch = engine.batch();
        let items = [Item(1), Item(2), Item(3)];

        assert_eq!(batch.attach_tags_to_objects(["x", "y"], &items, None).unwrap(), 6);
        assert_eq!(batch.attach_tag_to_objects("x", &items, None).unwrap(), 0);
        assert_eq!(batch.detach_tags_from_objects(["x"], &items[..2], None).unwrap(), 2);
        assert_eq!(engine.get_tag_names(&items[0], 1).unwrap(), vec!["y"]);
        assert_eq!(engine.get_tag_names(&items[2], 1).unwrap(), vec!["x", "y"]);

        assert_eq!(batch.detach_all_from_objects(&items).unwrap(), 4);
        assert_eq!(batch.detach_all_from_objects::<Item>(&[]).unwrap(), 0);
    }

    #[test]
    fn with_tag_names_keeps_input_order_and_untagged_objects() {
        let engine = seeded();
        engine.add_tags(&Item(2), ["z", "x"]).unwrap();
        engine.add_tags(&Item(1), ["y"]).unwrap();

        let loaded = engine
            .batch()
            .with_tag_names(vec![Item(2), Item(9), Item(1)])
            .unwrap();
        let view: Vec<(u32, Vec<String>)> = loaded
            .into_iter()
            .map(|item| (item.object.0, item.tags))
            .collect();
        assert_eq!(
            view,
            vec![
                (2, vec!["x".to_string(), "z".to_string()]),
                (9, vec![]),
                (1, vec!["y".to_string()]),
            ]
        );
        assert!(engine.batch().with_tags(Vec::<Item>::new()).unwrap().is_empty());
    }

    #[test]
    fn repeated_objects_all_receive_tags() {
        let engine = seeded();
        engine.add_tags(&Item(1), ["x"]).unwrap();
        let loaded = engine
            .batch()
            .with_tags_mapped(vec![Item(1), Item(1)], |tag| tag.id)
            .unwrap();
        assert_eq!(loaded[0].tags, loaded[1].tags);
        assert_eq!(loaded[0].tags.len(), 1);
    }

    #[test]
    fn grouping_by_own_and_given_tags() {
        let engine = seeded();
        let items = [Item(1), Item(2), Item(3)];
        engine.add_tags(&items[0], ["x", "y"]).unwrap();
        engine.add_tags(&items[1], ["y"]).unwrap();

        let own = engine.batch().group_by_tag_name(&items).unwrap();
        assert_eq!(own.len(), 2);
        assert_eq!(own["x"], vec![Item(1)]);
        assert_eq!(own["y"], vec![Item(1), Item(2)]);

        let given = engine
            .batch()
            .group_by_given_tags(&items, ["y", "z"], None)
            .unwrap();
        assert_eq!(given.len(), 1);
        assert_eq!(given["y"], vec![Item(1), Item(2)]);
    }
}
