//! Bounded-depth transitive closure over tag-to-tag edges.
//!
//! A tag that is tagged is stored as an edge whose object is the tag itself
//! (`object_type = TAG_OBJECT_TYPE`, `object_id = id`), so the closure walks
//! the same association table as every other query, one level per backend
//! round trip.
//!
//! Cycles are not detected. Ids already in the closure are never expanded
//! again, so a cyclic graph simply stops growing while the depth bound runs
//! out.

use std::collections::BTreeSet;

use tagnest_store::{EdgeFilter, TagBackend, TagId, TAG_OBJECT_TYPE};

use crate::error::{Result, TagError};

/// Which side of a tag-to-tag edge to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From a tag to the tags applied to it: `duck` reaches `bird`, then
    /// `animal`. This is an object's tag closure.
    Applied,

    /// From a tag to the tags it is applied to: `animal` reaches `bird`, then
    /// `duck`. Used to widen a query seed so that carriers of nested tags
    /// match.
    Carriers,
}

/// Fail with [`TagError::InvalidDepth`] unless `1 <= depth <= max_depth`.
pub fn check_depth(depth: usize, max_depth: usize) -> Result<()> {
    if depth < 1 || depth > max_depth {
        return Err(TagError::InvalidDepth {
            depth,
            max: max_depth,
        });
    }
    Ok(())
}

pub struct ClosureResolver<'a, B> {
    backend: &'a B,
    max_depth: usize,
}

impl<'a, B: TagBackend> ClosureResolver<'a, B> {
    pub fn new(backend: &'a B, max_depth: usize) -> Self {
        Self { backend, max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// `seed` plus everything reachable within `depth - 1` hops.
    ///
    /// Depth 1 returns the seed untouched. Each further level issues one
    /// backend query for the ids discovered at the previous level only.
    pub fn expand(
        &self,
        seed: &BTreeSet<TagId>,
        depth: usize,
        direction: Direction,
    ) -> Result<BTreeSet<TagId>> {
        check_depth(depth, self.max_depth)?;

        let mut closure = seed.clone();
        let mut frontier = seed.clone();
        for level in 2..=depth {
            if frontier.is_empty() {
                break;
            }
            let reached = self.step(&frontier, direction)?;
            frontier = reached.difference(&closure).copied().collect();
            closure.extend(frontier.iter().copied());
            log::debug!(
                "Closure level {level} ({direction:?}): {} new, {} total",
                frontier.len(),
                closure.len()
            );
        }
        Ok(closure)
    }

    fn step(&self, frontier: &BTreeSet<TagId>, direction: Direction) -> Result<BTreeSet<TagId>> {
        let filter = EdgeFilter::object_type(TAG_OBJECT_TYPE);
        match direction {
            Direction::Applied => {
                let filter = filter.with_object_ids(frontier.iter().map(TagId::to_string));
                Ok(self
                    .backend
                    .select_edges(&filter)?
                    .into_iter()
                    .map(|edge| edge.tag_id)
                    .collect())
            }
            Direction::Carriers => {
                let filter = filter.with_tag_ids(frontier.iter().copied());
                Ok(self
                    .backend
                    .select_edges(&filter)?
                    .into_iter()
                    .filter_map(|edge| match edge.object_id.parse::<TagId>() {
                        Ok(id) => Some(id),
                        Err(_) => {
                            log::warn!(
                                "Skipping tag edge with non-numeric object id '{}'",
                                edge.object_id
                            );
                            None
                        }
                    })
                    .collect())
            }
        }
    }
}
