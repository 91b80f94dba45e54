use std::collections::{BTreeMap, BTreeSet};

use tagnest_store::{AssociationStore, Tag, TagBackend, TagFilter, TagId, TagRegistry};

use crate::batch::BatchLoader;
use crate::closure::{check_depth, ClosureResolver, Direction};
use crate::config::EngineConfig;
use crate::error::{Result, TagError};
use crate::intersect::sorted_merge_count;
use crate::pattern::NameFilter;
use crate::resolve::{resolve_tag_ids, resolve_tags};
use crate::taggable::{TagRef, Taggable};

/// Entry point for tag queries over one backend.
///
/// The engine keeps no state between calls besides its configuration; every
/// answer is computed from the backend. Tag references are resolved once, at
/// the start of each operation, in the namespace that operation names (the
/// object's own namespace for per-object calls).
pub struct TagEngine<B> {
    backend: B,
    config: EngineConfig,
}

impl<B: TagBackend> TagEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(backend: B, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> TagRegistry<'_, B> {
        TagRegistry::new(&self.backend)
    }

    pub fn associations(&self) -> AssociationStore<'_, B> {
        AssociationStore::new(&self.backend)
    }

    pub fn closure(&self) -> ClosureResolver<'_, B> {
        ClosureResolver::new(&self.backend, self.config.max_depth)
    }

    pub fn batch(&self) -> BatchLoader<'_, B> {
        BatchLoader::new(&self.backend)
    }

    // ------------------------------------------------------------------
    // Tags

    pub fn create_tag(&self, name: &str, namespace: Option<&str>) -> Result<Tag> {
        Ok(self.registry().create_one(name, namespace)?)
    }

    pub fn create_tags<I, S>(&self, names: I, namespace: Option<&str>) -> Result<Vec<Tag>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.registry().create_many(names, namespace)?)
    }

    pub fn find_tag(&self, name: &str, namespace: Option<&str>) -> Result<Tag> {
        self.registry()
            .find_by_name(name, namespace)?
            .ok_or_else(|| TagError::UnknownTag(format!("'{name}'")))
    }

    /// Tags for the names that exist; unknown names are left out.
    pub fn find_tags<I, S>(&self, names: I, namespace: Option<&str>) -> Result<Vec<Tag>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.registry().find_many_by_name(names, namespace)?)
    }

    /// Delete tags by name, cascading to every edge that references them.
    pub fn delete_tags<I, S>(&self, names: I, namespace: Option<&str>) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.registry().delete(names, namespace)?)
    }

    // ------------------------------------------------------------------
    // Per-object queries

    /// The object's tag closure at `depth`: its own tags, then the tags
    /// applied to those, and so on.
    pub fn tag_closure<T: Taggable>(&self, object: &T, depth: usize) -> Result<BTreeSet<TagId>> {
        check_depth(depth, self.config.max_depth)?;
        let direct = self
            .associations()
            .tag_ids_for(T::KIND, &object.object_id())?;
        self.closure().expand(&direct, depth, Direction::Applied)
    }

    /// Tag records of [`TagEngine::tag_closure`], ascending by id.
    pub fn get_tags<T: Taggable>(&self, object: &T, depth: usize) -> Result<Vec<Tag>> {
        let ids = self.tag_closure(object, depth)?;
        Ok(self.backend.select_tags(&TagFilter::Ids(ids))?)
    }

    pub fn get_tag_names<T: Taggable>(&self, object: &T, depth: usize) -> Result<Vec<String>> {
        Ok(self
            .get_tags(object, depth)?
            .into_iter()
            .map(|tag| tag.name)
            .collect())
    }

    pub fn get_tags_matching<T, F>(&self, object: &T, filter: &F, depth: usize) -> Result<Vec<Tag>>
    where
        T: Taggable,
        F: NameFilter + ?Sized,
    {
        let mut tags = self.get_tags(object, depth)?;
        tags.retain(|tag| filter.matches(&tag.name));
        Ok(tags)
    }

    pub fn has_tag<T: Taggable>(
        &self,
        object: &T,
        tag: impl Into<TagRef>,
        depth: usize,
    ) -> Result<bool> {
        let tag: TagRef = tag.into();
        self.has_all_tags(object, [tag], depth)
    }

    /// True when every requested tag is in the object's closure at `depth`.
    pub fn has_all_tags<T: Taggable>(
        &self,
        object: &T,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        depth: usize,
    ) -> Result<bool> {
        let (matched, requested) = self.match_count(object, tags, depth)?;
        Ok(matched == requested)
    }

    /// True when at least one requested tag is in the object's closure.
    pub fn has_any_tag<T: Taggable>(
        &self,
        object: &T,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        depth: usize,
    ) -> Result<bool> {
        let (matched, _) = self.match_count(object, tags, depth)?;
        Ok(matched >= 1)
    }

    /// `(|requested ∩ closure|, |requested|)`
    fn match_count<T: Taggable>(
        &self,
        object: &T,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        depth: usize,
    ) -> Result<(usize, usize)> {
        let requested: Vec<TagId> = resolve_tag_ids(&self.backend, tags, object.tag_namespace())?
            .into_iter()
            .collect();
        let held: Vec<TagId> = self.tag_closure(object, depth)?.into_iter().collect();
        Ok((sorted_merge_count(&requested, &held), requested.len()))
    }

    // ------------------------------------------------------------------
    // Per-object mutations

    pub fn add_tag<T: Taggable>(&self, object: &T, tag: impl Into<TagRef>) -> Result<usize> {
        let tag: TagRef = tag.into();
        self.add_tags(object, [tag])
    }

    /// Attach tags to the object. Returns how many edges were new; repeats
    /// are ignored.
    pub fn add_tags<T: Taggable>(
        &self,
        object: &T,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
    ) -> Result<usize> {
        let ids = resolve_tag_ids(&self.backend, tags, object.tag_namespace())?;
        Ok(self
            .associations()
            .attach(&ids, T::KIND, &object.object_id())?)
    }

    /// Attach tags by name, creating missing ones in the object's namespace.
    pub fn add_tags_or_create<T, I, S>(&self, object: &T, names: I) -> Result<usize>
    where
        T: Taggable,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(TagError::InvalidTagArgument(
                "expected at least one tag".to_string(),
            ));
        }
        let namespace = object.tag_namespace();
        self.backend.atomically(|backend| -> Result<usize> {
            let tags = TagRegistry::new(backend).find_or_create_many(names, namespace)?;
            let ids: BTreeSet<TagId> = tags.iter().map(|tag| tag.id).collect();
            Ok(AssociationStore::new(backend).attach(&ids, T::KIND, &object.object_id())?)
        })
    }

    /// Replace the object's tags. Detach and attach happen in one
    /// [`TagBackend::atomically`] block.
    pub fn set_tags<T: Taggable>(
        &self,
        object: &T,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
    ) -> Result<usize> {
        let ids = resolve_tag_ids(&self.backend, tags, object.tag_namespace())?;
        let object_id = object.object_id();
        self.backend.atomically(|backend| -> Result<usize> {
            let store = AssociationStore::new(backend);
            store.detach_all_for_objects(T::KIND, &BTreeSet::from([object_id.clone()]))?;
            Ok(store.attach(&ids, T::KIND, &object_id)?)
        })
    }

    pub fn del_tag<T: Taggable>(&self, object: &T, tag: impl Into<TagRef>) -> Result<usize> {
        let tag: TagRef = tag.into();
        self.del_tags(object, [tag])
    }

    pub fn del_tags<T: Taggable>(
        &self,
        object: &T,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
    ) -> Result<usize> {
        let ids = resolve_tag_ids(&self.backend, tags, object.tag_namespace())?;
        Ok(self.associations().detach(
            &ids,
            T::KIND,
            &BTreeSet::from([object.object_id()]),
        )?)
    }

    /// Detach the object's own tags whose names match `filter`.
    pub fn del_tags_matching<T, F>(&self, object: &T, filter: &F) -> Result<usize>
    where
        T: Taggable,
        F: NameFilter + ?Sized,
    {
        let ids: BTreeSet<TagId> = self
            .get_tags_matching(object, filter, 1)?
            .into_iter()
            .map(|tag| tag.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(self.associations().detach(
            &ids,
            T::KIND,
            &BTreeSet::from([object.object_id()]),
        )?)
    }

    /// Detach every tag from the object. The tags themselves stay.
    pub fn del_all_tags<T: Taggable>(&self, object: &T) -> Result<usize> {
        Ok(self
            .associations()
            .detach_all_for_objects(T::KIND, &BTreeSet::from([object.object_id()]))?)
    }

    // ------------------------------------------------------------------
    // Set queries

    /// Ids of `T` objects holding any of `tags`, or any tag those tags are
    /// applied to within `depth` levels.
    pub fn tagged_by_any<T: Taggable>(
        &self,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        depth: usize,
        namespace: Option<&str>,
    ) -> Result<BTreeSet<String>> {
        check_depth(depth, self.config.max_depth)?;
        let seed = resolve_tag_ids(&self.backend, tags, namespace)?;
        let matched = self.objects_tagged_by(T::KIND, &seed, depth)?;
        log::debug!(
            "tagged_by_any({}): {} seed tags, {} objects at depth {depth}",
            T::KIND,
            seed.len(),
            matched.len()
        );
        Ok(matched)
    }

    /// Ids of `T` objects holding every one of `tags`.
    ///
    /// At depth 1 this is one edge query plus a per-object tally. Deeper
    /// queries expand each tag on its own and intersect the matches, which
    /// costs a closure per tag and gets slow with many tags.
    pub fn tagged_by_all<T: Taggable>(
        &self,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        depth: usize,
        namespace: Option<&str>,
    ) -> Result<BTreeSet<String>> {
        check_depth(depth, self.config.max_depth)?;
        let ids = resolve_tag_ids(&self.backend, tags, namespace)?;

        let matched = if depth == 1 {
            let mut tally: BTreeMap<String, usize> = BTreeMap::new();
            for edge in self.associations().edges_for(T::KIND, Some(&ids), None)? {
                *tally.entry(edge.object_id).or_default() += 1;
            }
            tally
                .into_iter()
                .filter(|(_, count)| *count == ids.len())
                .map(|(object_id, _)| object_id)
                .collect()
        } else {
            let mut remaining = ids.iter();
            let mut matched = BTreeSet::new();
            if let Some(first) = remaining.next() {
                matched = self.objects_tagged_by(T::KIND, &BTreeSet::from([*first]), depth)?;
            }
            for id in remaining {
                if matched.is_empty() {
                    break;
                }
                let next = self.objects_tagged_by(T::KIND, &BTreeSet::from([*id]), depth)?;
                matched.retain(|object_id| next.contains(object_id));
            }
            matched
        };

        log::debug!(
            "tagged_by_all({}): {} tags, {} objects at depth {depth}",
            T::KIND,
            ids.len(),
            matched.len()
        );
        Ok(matched)
    }

    /// Members of `objects` not matched by [`TagEngine::tagged_by_any`], in
    /// input order.
    pub fn not_tagged_by_any<T: Taggable>(
        &self,
        objects: impl IntoIterator<Item = T>,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        depth: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<T>> {
        let tagged = self.tagged_by_any::<T>(tags, depth, namespace)?;
        Ok(objects
            .into_iter()
            .filter(|object| !tagged.contains(&object.object_id()))
            .collect())
    }

    /// Tag records tagged by any of `tags`, ascending by id.
    pub fn tags_tagged_by_any(
        &self,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        depth: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<Tag>> {
        let object_ids = self.tagged_by_any::<Tag>(tags, depth, namespace)?;
        let ids = object_ids
            .iter()
            .filter_map(|object_id| match object_id.parse::<TagId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("Skipping tag edge with non-numeric object id '{object_id}'");
                    None
                }
            });
        Ok(self.backend.select_tags(&TagFilter::ids(ids))?)
    }

    /// Objects of `object_type` with an edge to the carriers closure of `seed`.
    fn objects_tagged_by(
        &self,
        object_type: &str,
        seed: &BTreeSet<TagId>,
        depth: usize,
    ) -> Result<BTreeSet<String>> {
        let expanded = self.closure().expand(seed, depth, Direction::Carriers)?;
        Ok(self.associations().object_ids_for(object_type, &expanded)?)
    }

    /// Resolve references in `namespace` without touching any edge.
    pub fn resolve(
        &self,
        tags: impl IntoIterator<Item = impl Into<TagRef>>,
        namespace: Option<&str>,
    ) -> Result<Vec<Tag>> {
        resolve_tags(&self.backend, tags, namespace)
    }
}
