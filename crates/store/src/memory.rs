use crate::backend::{check_batch_unique, EdgeFilter, TagBackend, TagFilter};
use crate::error::{Result, StoreError};
use crate::types::{normalize_namespace, now_ms, Edge, NewEdge, NewTag, Tag, TagId, TAG_OBJECT_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

pub const MEMORY_SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey {
    tag_id: TagId,
    object_type: String,
    object_id: String,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    tags: BTreeMap<TagId, Tag>,
    /// (namespace, name) -> id
    names: BTreeMap<(Option<String>, String), TagId>,
    /// edge -> created_at_ms
    edges: BTreeMap<EdgeKey, i64>,
}

impl MemoryState {
    fn insert_tag(&mut self, tag: Tag) {
        self.names
            .insert((tag.namespace.clone(), tag.name.clone()), tag.id);
        self.tags.insert(tag.id, tag);
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedMemory {
    schema_version: u32,
    next_id: i64,
    tags: Vec<Tag>,
    edges: Vec<Edge>,
}

/// Thread currently inside [`TagBackend::atomically`], with its nesting depth.
#[derive(Debug, Default)]
struct Turn {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Releases the atomic turn when the outermost `atomically` call returns.
struct TurnGuard<'a> {
    backend: &'a MemoryBackend,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut turn = self
            .backend
            .turn
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        turn.depth = turn.depth.saturating_sub(1);
        if turn.depth == 0 {
            turn.owner = None;
            self.backend.turn_released.notify_all();
        }
    }
}

/// In-process backend built on ordered maps.
///
/// Useful for tests and for small embedded vocabularies; [`MemoryBackend::save`]
/// and [`MemoryBackend::load`] persist the whole state as a JSON snapshot.
///
/// While one thread is inside [`TagBackend::atomically`], every other thread
/// waits before touching the state, so a rollback only ever discards the
/// writes of the failed block.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    turn: Mutex<Turn>,
    turn_released: Condvar,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state once no other thread holds the atomic turn.
    ///
    /// Lock order is always `turn` then `state`.
    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let me = thread::current().id();
        let mut turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        while turn.owner.is_some_and(|owner| owner != me) {
            turn = self
                .turn_released
                .wait(turn)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::Other("memory backend lock poisoned".to_string()))?;
        drop(turn);
        Ok(state)
    }

    /// Claim the atomic turn for the calling thread; re-entrant.
    fn take_turn(&self) -> TurnGuard<'_> {
        let me = thread::current().id();
        let mut turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        while turn.owner.is_some_and(|owner| owner != me) {
            turn = self
                .turn_released
                .wait(turn)
                .unwrap_or_else(PoisonError::into_inner);
        }
        turn.owner = Some(me);
        turn.depth += 1;
        TurnGuard { backend: self }
    }

    pub fn tag_count(&self) -> Result<usize> {
        Ok(self.state()?.tags.len())
    }

    pub fn edge_count(&self) -> Result<usize> {
        Ok(self.state()?.edges.len())
    }

    /// Write a snapshot to `path` (temp file + rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let persisted = {
            let state = self.state()?;
            PersistedMemory {
                schema_version: MEMORY_SNAPSHOT_SCHEMA_VERSION,
                next_id: state.next_id,
                tags: state.tags.values().cloned().collect(),
                edges: state
                    .edges
                    .iter()
                    .map(|(key, created_at_ms)| Edge {
                        tag_id: key.tag_id,
                        object_type: key.object_type.clone(),
                        object_id: key.object_id.clone(),
                        created_at_ms: *created_at_ms,
                    })
                    .collect(),
            }
        };

        log::info!(
            "Saving tag snapshot to {:?} ({} tags, {} edges)",
            path,
            persisted.tags.len(),
            persisted.edges.len()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot written by [`MemoryBackend::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading tag snapshot from {:?}", path);
        let bytes = std::fs::read(path)?;
        let persisted: PersistedMemory = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != MEMORY_SNAPSHOT_SCHEMA_VERSION {
            return Err(StoreError::Other(format!(
                "Unsupported tag snapshot schema_version {} (expected {MEMORY_SNAPSHOT_SCHEMA_VERSION})",
                persisted.schema_version
            )));
        }

        let mut state = MemoryState {
            next_id: persisted.next_id,
            ..MemoryState::default()
        };
        for tag in persisted.tags {
            if tag.id.get() > state.next_id {
                return Err(StoreError::InvalidRow(format!(
                    "tag {} is above the id watermark {}",
                    tag.id, state.next_id
                )));
            }
            let key = (tag.namespace.clone(), tag.name.clone());
            if state.names.contains_key(&key) || state.tags.contains_key(&tag.id) {
                return Err(StoreError::InvalidRow(format!(
                    "tag '{}' (namespace {:?}, id {}) appears twice",
                    tag.name, tag.namespace, tag.id
                )));
            }
            state.insert_tag(tag);
        }
        for edge in persisted.edges {
            if !state.tags.contains_key(&edge.tag_id) {
                return Err(StoreError::InvalidRow(format!(
                    "edge references missing tag {}",
                    edge.tag_id
                )));
            }
            state.edges.insert(
                EdgeKey {
                    tag_id: edge.tag_id,
                    object_type: edge.object_type,
                    object_id: edge.object_id,
                },
                edge.created_at_ms,
            );
        }

        log::info!(
            "Loaded {} tags and {} edges",
            state.tags.len(),
            state.edges.len()
        );
        Ok(Self {
            state: Mutex::new(state),
            ..Self::default()
        })
    }
}

impl TagBackend for MemoryBackend {
    fn insert_tags(&self, rows: &[NewTag]) -> Result<Vec<TagId>> {
        check_batch_unique(rows)?;
        let mut state = self.state()?;

        for row in rows {
            let namespace = normalize_namespace(row.namespace.as_deref());
            if state.names.contains_key(&(namespace.clone(), row.name.clone())) {
                return Err(StoreError::DuplicateKey {
                    name: row.name.clone(),
                    namespace,
                });
            }
        }

        let now = now_ms();
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            state.next_id += 1;
            let id = TagId(state.next_id);
            state.insert_tag(Tag {
                id,
                name: row.name.clone(),
                namespace: normalize_namespace(row.namespace.as_deref()),
                description: row.description.clone(),
                created_at_ms: now,
                updated_at_ms: now,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    fn select_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>> {
        if filter.is_vacuous() {
            return Ok(Vec::new());
        }
        let state = self.state()?;
        let mut out: Vec<Tag> = match filter {
            TagFilter::All => state.tags.values().cloned().collect(),
            TagFilter::Ids(ids) => ids
                .iter()
                .filter_map(|id| state.tags.get(id).cloned())
                .collect(),
            TagFilter::Names { names, namespace } => names
                .iter()
                .filter_map(|name| state.names.get(&(namespace.clone(), name.clone())))
                .filter_map(|id| state.tags.get(id).cloned())
                .collect(),
        };
        out.sort_by_key(|tag| tag.id);
        Ok(out)
    }

    fn delete_tags(&self, filter: &TagFilter) -> Result<usize> {
        if filter.is_vacuous() {
            return Ok(0);
        }
        let mut state = self.state()?;
        let doomed: BTreeSet<TagId> = state
            .tags
            .values()
            .filter(|tag| filter.matches(tag))
            .map(|tag| tag.id)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let doomed_objects: BTreeSet<String> = doomed.iter().map(TagId::to_string).collect();
        state.edges.retain(|key, _| {
            !doomed.contains(&key.tag_id)
                && !(key.object_type == TAG_OBJECT_TYPE && doomed_objects.contains(&key.object_id))
        });
        for id in &doomed {
            if let Some(tag) = state.tags.remove(id) {
                state.names.remove(&(tag.namespace, tag.name));
            }
        }
        Ok(doomed.len())
    }

    fn insert_edges(&self, rows: &[NewEdge]) -> Result<usize> {
        let mut state = self.state()?;
        if let Some(missing) = rows.iter().find(|row| !state.tags.contains_key(&row.tag_id)) {
            return Err(StoreError::MissingTag(missing.tag_id));
        }

        let now = now_ms();
        let mut created = 0;
        for row in rows {
            let key = EdgeKey {
                tag_id: row.tag_id,
                object_type: row.object_type.clone(),
                object_id: row.object_id.clone(),
            };
            if let std::collections::btree_map::Entry::Vacant(slot) = state.edges.entry(key) {
                slot.insert(now);
                created += 1;
            }
        }
        Ok(created)
    }

    fn select_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        if filter.is_vacuous() {
            return Ok(Vec::new());
        }
        let state = self.state()?;
        Ok(state
            .edges
            .iter()
            .map(|(key, created_at_ms)| Edge {
                tag_id: key.tag_id,
                object_type: key.object_type.clone(),
                object_id: key.object_id.clone(),
                created_at_ms: *created_at_ms,
            })
            .filter(|edge| filter.matches(edge))
            .collect())
    }

    fn delete_edges(&self, filter: &EdgeFilter) -> Result<usize> {
        if filter.is_vacuous() {
            return Ok(0);
        }
        let mut state = self.state()?;
        let before = state.edges.len();
        state.edges.retain(|key, created_at_ms| {
            let edge = Edge {
                tag_id: key.tag_id,
                object_type: key.object_type.clone(),
                object_id: key.object_id.clone(),
                created_at_ms: *created_at_ms,
            };
            !filter.matches(&edge)
        });
        Ok(before - state.edges.len())
    }

    fn atomically<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let _turn = self.take_turn();
        let snapshot = self.state()?.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self.state()? = snapshot;
                Err(err)
            }
        }
    }
}
