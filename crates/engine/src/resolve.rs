use std::collections::BTreeSet;

use tagnest_store::{normalize_namespace, Tag, TagBackend, TagFilter, TagId};

use crate::error::{Result, TagError};
use crate::taggable::TagRef;

/// Resolve tag references to records with at most two backend queries.
///
/// Names are matched in `namespace`; ids are taken as they are. The result is
/// deduplicated and sorted by id. An empty collection or an empty name is an
/// [`TagError::InvalidTagArgument`], and anything that does not resolve is an
/// [`TagError::UnknownTag`] listing what was missing.
pub fn resolve_tags<B, I, R>(backend: &B, refs: I, namespace: Option<&str>) -> Result<Vec<Tag>>
where
    B: TagBackend,
    I: IntoIterator<Item = R>,
    R: Into<TagRef>,
{
    let mut ids = BTreeSet::new();
    let mut names = BTreeSet::new();
    let mut seen_any = false;
    for tag_ref in refs {
        seen_any = true;
        match tag_ref.into() {
            TagRef::ById(id) => {
                ids.insert(id);
            }
            TagRef::ByName(name) if name.is_empty() => {
                return Err(TagError::InvalidTagArgument(
                    "tag name must not be empty".to_string(),
                ));
            }
            TagRef::ByName(name) => {
                names.insert(name);
            }
        }
    }
    if !seen_any {
        return Err(TagError::InvalidTagArgument(
            "expected at least one tag".to_string(),
        ));
    }

    let mut tags = Vec::with_capacity(ids.len() + names.len());
    let mut missing = Vec::new();

    if !ids.is_empty() {
        let found = backend.select_tags(&TagFilter::Ids(ids.clone()))?;
        let found_ids: BTreeSet<TagId> = found.iter().map(|tag| tag.id).collect();
        missing.extend(
            ids.difference(&found_ids)
                .map(|id| format!("id {id}")),
        );
        tags.extend(found);
    }

    if !names.is_empty() {
        let namespace = normalize_namespace(namespace);
        let found = backend.select_tags(&TagFilter::Names {
            names: names.clone(),
            namespace: namespace.clone(),
        })?;
        let found_names: BTreeSet<&str> = found.iter().map(|tag| tag.name.as_str()).collect();
        missing.extend(
            names
                .iter()
                .filter(|name| !found_names.contains(name.as_str()))
                .map(|name| match &namespace {
                    Some(ns) => format!("'{name}' in namespace '{ns}'"),
                    None => format!("'{name}'"),
                }),
        );
        tags.extend(found);
    }

    if !missing.is_empty() {
        return Err(TagError::UnknownTag(missing.join(", ")));
    }

    tags.sort_by_key(|tag| tag.id);
    tags.dedup_by_key(|tag| tag.id);
    Ok(tags)
}

/// Like [`resolve_tags`], keeping only the ids.
pub fn resolve_tag_ids<B, I, R>(
    backend: &B,
    refs: I,
    namespace: Option<&str>,
) -> Result<BTreeSet<TagId>>
where
    B: TagBackend,
    I: IntoIterator<Item = R>,
    R: Into<TagRef>,
{
    Ok(resolve_tags(backend, refs, namespace)?
        .into_iter()
        .map(|tag| tag.id)
        .collect())
}
