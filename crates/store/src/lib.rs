//! # Tagnest Store
//!
//! Tag identity and polymorphic tag associations over a pluggable backend.
//!
//! ## Features
//!
//! - **Namespaced tags** - `(name, namespace)` is unique, `None` is its own partition
//! - **Polymorphic edges** - `(tag_id, object_type, object_id)`, tags can tag tags
//! - **Bulk operations** - batch create, cross-product attach, set-based detach
//! - **Two backends** - in-memory (JSON snapshots) and SQLite
//!
//! ## Architecture
//!
//! ```text
//! TagRegistry ───────┐
//!   create / find    │
//!   delete (cascade) │
//!                    ├──> TagBackend (trait)
//! AssociationStore ──┘      ├─ MemoryBackend (ordered maps, JSON snapshot)
//!   attach / detach         └─ SqliteBackend (rusqlite, tags + tagged tables)
//!   tag ids / object ids
//! ```
//!
//! ## Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use tagnest_store::{AssociationStore, MemoryBackend, TagRegistry};
//!
//! # fn main() -> tagnest_store::Result<()> {
//! let backend = MemoryBackend::new();
//! let tags = TagRegistry::new(&backend).create_many(["rust", "sqlite"], None)?;
//!
//! let ids: BTreeSet<_> = tags.iter().map(|tag| tag.id).collect();
//! let edges = AssociationStore::new(&backend);
//! edges.attach(&ids, "app::Post", "42")?;
//!
//! assert_eq!(edges.tag_ids_for("app::Post", "42")?, ids);
//! # Ok(())
//! # }
//! ```

mod associations;
mod backend;
mod error;
mod memory;
mod registry;
mod sqlite;
mod types;

pub use associations::AssociationStore;
pub use backend::{EdgeFilter, TagBackend, TagFilter};
pub use error::{Result, StoreError};
pub use memory::{MemoryBackend, MEMORY_SNAPSHOT_SCHEMA_VERSION};
pub use registry::TagRegistry;
pub use sqlite::SqliteBackend;
pub use types::{normalize_namespace, Edge, NewEdge, NewTag, Tag, TagId, TAG_OBJECT_TYPE};
