//! # Tagnest Engine
//!
//! Nested tags and tag queries on top of [`tagnest_store`].
//!
//! ## Features
//!
//! - **Nested tags** - tags can be tagged; queries follow those edges to a bounded depth
//! - **Per-object queries** - has / has-all / has-any with sorted-merge counting
//! - **Set queries** - objects tagged by any / all / none of a tag set
//! - **Batch loading** - tags for a whole collection in two queries
//!
//! ## Architecture
//!
//! ```text
//! TagEngine ──> resolve (TagRef -> Tag) ──> TagRegistry
//!    │
//!    ├──> ClosureResolver (Applied / Carriers, one query per level)
//!    │         └──> AssociationStore (object_type = TAG_OBJECT_TYPE)
//!    │
//!    ├──> AssociationStore (object_type = Taggable::KIND)
//!    │
//!    └──> BatchLoader (hash joins over edges + tags)
//! ```
//!
//! ## Example
//!
//! ```
//! use tagnest_engine::{TagEngine, Taggable};
//! use tagnest_store::MemoryBackend;
//!
//! struct Post(u64);
//!
//! impl Taggable for Post {
//!     const KIND: &'static str = "blog::Post";
//!
//!     fn object_id(&self) -> String {
//!         self.0.to_string()
//!     }
//! }
//!
//! # fn main() -> tagnest_engine::Result<()> {
//! let engine = TagEngine::new(MemoryBackend::new());
//! let tags = engine.create_tags(["animal", "bird"], None)?;
//! engine.add_tag(&tags[1], "animal")?; // a bird is an animal
//!
//! let post = Post(1);
//! engine.add_tag(&post, "bird")?;
//! assert!(!engine.has_tag(&post, "animal", 1)?);
//! assert!(engine.has_tag(&post, "animal", 2)?);
//! assert_eq!(engine.tagged_by_any::<Post>(["animal"], 2, None)?.len(), 1);
//! # Ok(())
//! # }
//! ```

mod batch;
mod closure;
mod config;
mod error;
mod intersect;
mod pattern;
mod query;
mod resolve;
mod taggable;

pub use batch::{BatchLoader, WithTags};
pub use closure::{check_depth, ClosureResolver, Direction};
pub use config::{EngineConfig, DEFAULT_MAX_DEPTH, MAX_DEPTH_ENV, MAX_DEPTH_LIMIT};
pub use error::{Result, TagError};
pub use intersect::sorted_merge_count;
pub use pattern::{MatchKind, NameFilter, TagPattern};
pub use query::TagEngine;
pub use resolve::{resolve_tag_ids, resolve_tags};
pub use taggable::{TagRef, Taggable};
