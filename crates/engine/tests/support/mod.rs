#![allow(dead_code)]

use std::collections::BTreeSet;

use tagnest_engine::{TagEngine, Taggable};
use tagnest_store::{MemoryBackend, SqliteBackend};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    pub namespace: Option<&'static str>,
}

impl Taggable for Post {
    const KIND: &'static str = "app::Post";

    fn object_id(&self) -> String {
        self.id.to_string()
    }

    fn tag_namespace(&self) -> Option<&str> {
        self.namespace
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: u64,
}

impl Taggable for Video {
    const KIND: &'static str = "app::Video";

    fn object_id(&self) -> String {
        self.id.to_string()
    }

    fn tag_namespace(&self) -> Option<&str> {
        Some("video")
    }
}

pub fn post(id: u64) -> Post {
    Post {
        id,
        namespace: None,
    }
}

pub fn posts(count: u64) -> Vec<Post> {
    (1..=count).map(post).collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn memory_engine() -> TagEngine<MemoryBackend> {
    init_logging();
    TagEngine::new(MemoryBackend::new())
}

/// Engine over a file-backed SQLite database; keep the `TempDir` alive.
pub fn sqlite_engine() -> (TempDir, TagEngine<SqliteBackend>) {
    init_logging();
    let temp = TempDir::new().expect("tempdir");
    let backend = SqliteBackend::open(temp.path()).expect("open sqlite backend");
    (temp, TagEngine::new(backend))
}

/// `t0`, `t1`, ... `t{count-1}`
pub fn tag_names(count: usize) -> Vec<String> {
    (0..count).map(|n| format!("t{n}")).collect()
}

pub fn id_set<I, S>(ids: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    ids.into_iter().map(|id| id.to_string()).collect()
}

/// Generates one test per backend for a scenario `fn(&TagEngine<impl TagBackend>)`.
macro_rules! on_both_backends {
    ($($scenario:ident),* $(,)?) => {
        mod memory_backend {
            $(
                #[test]
                fn $scenario() {
                    let engine = $crate::support::memory_engine();
                    super::$scenario(&engine);
                }
            )*
        }

        mod sqlite_backend {
            $(
                #[test]
                fn $scenario() {
                    let (_temp, engine) = $crate::support::sqlite_engine();
                    super::$scenario(&engine);
                }
            )*
        }
    };
}
