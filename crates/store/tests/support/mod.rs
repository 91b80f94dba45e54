#![allow(dead_code)]

use std::collections::BTreeSet;

use tagnest_store::{MemoryBackend, SqliteBackend, Tag, TagId};
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn memory() -> MemoryBackend {
    init_logging();
    MemoryBackend::new()
}

/// File-backed SQLite database; keep the `TempDir` alive for the test.
pub fn sqlite() -> (TempDir, SqliteBackend) {
    init_logging();
    let temp = TempDir::new().expect("tempdir");
    let backend = SqliteBackend::open(temp.path()).expect("open sqlite backend");
    (temp, backend)
}

pub fn ids(tags: &[Tag]) -> BTreeSet<TagId> {
    tags.iter().map(|tag| tag.id).collect()
}

pub fn objects(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// Generates one test per backend for a scenario `fn(&impl TagBackend)`.
macro_rules! on_both_backends {
    ($($scenario:ident),* $(,)?) => {
        mod memory_backend {
            $(
                #[test]
                fn $scenario() {
                    let backend = $crate::support::memory();
                    super::$scenario(&backend);
                }
            )*
        }

        mod sqlite_backend {
            $(
                #[test]
                fn $scenario() {
                    let (_temp, backend) = $crate::support::sqlite();
                    super::$scenario(&backend);
                }
            )*
        }
    };
}
