use crate::backend::{TagBackend, TagFilter};
use crate::error::{Result, StoreError};
use crate::types::{normalize_namespace, NewTag, Tag, TagId};
use std::collections::BTreeSet;

/// Owns tag identity: `(name, namespace)` lookups, creation and deletion.
pub struct TagRegistry<'a, B> {
    backend: &'a B,
}

impl<'a, B: TagBackend> TagRegistry<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Exact match on `(name, namespace)`.
    pub fn find_by_name(&self, name: &str, namespace: Option<&str>) -> Result<Option<Tag>> {
        Ok(self
            .backend
            .select_tags(&TagFilter::names([name], namespace))?
            .into_iter()
            .next())
    }

    /// All tags whose name is in `names`. Names without a match are silently
    /// omitted; compare lengths when exact correspondence matters.
    pub fn find_many_by_name<I, S>(&self, names: I, namespace: Option<&str>) -> Result<Vec<Tag>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backend
            .select_tags(&TagFilter::names(names, namespace))
    }

    pub fn find_by_ids(&self, ids: impl IntoIterator<Item = TagId>) -> Result<Vec<Tag>> {
        self.backend.select_tags(&TagFilter::ids(ids))
    }

    pub fn all(&self) -> Result<Vec<Tag>> {
        self.backend.select_tags(&TagFilter::All)
    }

    pub fn create(&self, tag: NewTag) -> Result<Tag> {
        let ids = self.backend.insert_tags(std::slice::from_ref(&tag))?;
        log::info!("Created tag '{}' (namespace {:?})", tag.name, tag.namespace);
        self.backend
            .select_tags(&TagFilter::ids(ids))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Other(format!("tag '{}' vanished after insert", tag.name)))
    }

    pub fn create_one(&self, name: &str, namespace: Option<&str>) -> Result<Tag> {
        self.create(NewTag::new(name, namespace))
    }

    /// One bulk insert followed by one bulk select on the same names and
    /// namespace. A duplicate aborts before the select, leaving nothing new.
    pub fn create_many<I, S>(&self, names: I, namespace: Option<&str>) -> Result<Vec<Tag>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<NewTag> = names
            .iter()
            .map(|name| NewTag::new(name.as_str(), namespace))
            .collect();
        self.backend.insert_tags(&rows)?;
        log::info!(
            "Created {} tags (namespace {:?})",
            rows.len(),
            normalize_namespace(namespace)
        );
        self.find_many_by_name(names, namespace)
    }

    /// Existing tags for `names`, creating the missing ones in one batch.
    pub fn find_or_create_many<I, S>(&self, names: I, namespace: Option<&str>) -> Result<Vec<Tag>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wanted: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let existing = self.find_many_by_name(wanted.iter().cloned(), namespace)?;
        let known: BTreeSet<&str> = existing.iter().map(|tag| tag.name.as_str()).collect();
        let missing: Vec<String> = wanted
            .iter()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(existing);
        }
        self.create_many(missing, namespace)?;
        self.find_many_by_name(wanted, namespace)
    }

    /// Bulk delete by name within `namespace`; associations cascade.
    pub fn delete<I, S>(&self, names: I, namespace: Option<&str>) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deleted = self
            .backend
            .delete_tags(&TagFilter::names(names, namespace))?;
        log::info!(
            "Deleted {deleted} tags (namespace {:?})",
            normalize_namespace(namespace)
        );
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use pretty_assertions::assert_eq;

    const NAMES: [&str; 6] = ["war", "scifi", "drama", "comedy", "action", "romance"];

    #[test]
    fn create_then_find_by_name() {
        let backend = MemoryBackend::new();
        let registry = TagRegistry::new(&backend);

        let war = registry.create_one(NAMES[0], None).unwrap();
        assert_eq!(registry.find_by_name("war", None).unwrap(), Some(war));

        let created = registry.create_many(NAMES[1..].iter().copied(), None).unwrap();
        assert_eq!(created.len(), NAMES.len() - 1);

        let mut found: Vec<String> = registry
            .find_many_by_name(NAMES, None)
            .unwrap()
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        let mut expected: Vec<String> = NAMES.iter().map(|name| name.to_string()).collect();
        found.sort();
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn missing_names_are_omitted() {
        let backend = MemoryBackend::new();
        let registry = TagRegistry::new(&backend);
        registry.create_many(["a", "b"], None).unwrap();
        let found = registry.find_many_by_name(["a", "zzz"], None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(registry.find_by_name("zzz", None).unwrap(), None);
    }

    #[test]
    fn delete_then_recreate_leaves_one_tag() {
        let backend = MemoryBackend::new();
        let registry = TagRegistry::new(&backend);
        registry.create_many(NAMES, None).unwrap();

        assert_eq!(registry.delete(NAMES, None).unwrap(), NAMES.len());
        registry.create_one(NAMES[0], None).unwrap();
        assert_eq!(registry.all().unwrap().len(), 1);
    }

    #[test]
    fn delete_is_scoped_to_namespace() {
        let backend = MemoryBackend::new();
        let registry = TagRegistry::new(&backend);
        registry.create_one("public", Some("post")).unwrap();
        registry.create_one("public", Some("video")).unwrap();

        registry.delete(["public"], Some("post")).unwrap();
        let left = registry.all().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].namespace.as_deref(), Some("video"));
    }

    #[test]
    fn find_or_create_only_creates_missing() {
        let backend = MemoryBackend::new();
        let registry = TagRegistry::new(&backend);
        let bird = registry.create_one("bird", None).unwrap();

        let tags = registry.find_or_create_many(["bird", "duck"], None).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], bird);
        assert_eq!(registry.all().unwrap().len(), 2);
    }
}
