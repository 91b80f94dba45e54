use crate::backend::{check_batch_unique, EdgeFilter, TagBackend, TagFilter};
use crate::error::{Result, StoreError};
use crate::types::{normalize_namespace, now_ms, Edge, NewEdge, NewTag, Tag, TagId, TAG_OBJECT_TYPE};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE_NAME: &str = "tagnest.db";
const SAVEPOINT: &str = "tagnest";

/// Values bound per `IN (...)` list. Statements with two lists bind at most
/// twice this, well below SQLite's host parameter limit.
const MAX_IN_LIST: usize = 500;

/// SQLite backend: a `tags` table and a polymorphic `tagged` table.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Open (or create) `tagnest.db` inside `storage_dir`.
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self> {
        let storage_dir = storage_dir.as_ref();
        std::fs::create_dir_all(storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        log::info!("Opening tag database at {:?}", db_path);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn, Some(db_path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        install_schema(&conn)?;
        Ok(Self { conn, db_path })
    }

    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn with_savepoint<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))
            .map_err(StoreError::from)?;
        match f() {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {SAVEPOINT}"))
                    .map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                let rollback = format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}");
                if let Err(rollback_err) = self.conn.execute_batch(&rollback) {
                    log::warn!("Failed to roll back savepoint: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    fn matching_tag_ids(&self, filter: &TagFilter) -> Result<BTreeSet<TagId>> {
        Ok(self.select_tags(filter)?.into_iter().map(|tag| tag.id).collect())
    }

    /// Run `head ?,?,...)` once per chunk of `values`, summing affected rows.
    fn execute_in_chunks(
        &self,
        head: &str,
        leading: &[SqlValue],
        values: Vec<SqlValue>,
    ) -> Result<usize> {
        let mut affected = 0;
        for chunk in values.chunks(MAX_IN_LIST) {
            let mut sql = head.to_string();
            let mut params = leading.to_vec();
            push_in_list(&mut sql, &mut params, chunk.iter().cloned());
            affected += self.conn.execute(&sql, params_from_iter(params.iter()))?;
        }
        Ok(affected)
    }
}

impl TagBackend for SqliteBackend {
    fn insert_tags(&self, rows: &[NewTag]) -> Result<Vec<TagId>> {
        check_batch_unique(rows)?;
        self.with_savepoint(|| {
            let now = now_ms();
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO tags(name, namespace, description, created_at_ms, updated_at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut ids = Vec::with_capacity(rows.len());
            for row in rows {
                let namespace = normalize_namespace(row.namespace.as_deref());
                let inserted = stmt.execute(params![row.name, namespace, row.description, now, now]);
                match inserted {
                    Ok(_) => ids.push(TagId(self.conn.last_insert_rowid())),
                    Err(err) if is_constraint_violation(&err) => {
                        return Err(StoreError::DuplicateKey {
                            name: row.name.clone(),
                            namespace,
                        });
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Ok(ids)
        })
    }

    fn select_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>> {
        if filter.is_vacuous() {
            return Ok(Vec::new());
        }

        let parts = split_tag_filter(filter);
        let mut out = Vec::new();
        for part in &parts {
            let mut sql = String::from(
                "SELECT id, name, namespace, description, created_at_ms, updated_at_ms FROM tags",
            );
            let mut params: Vec<SqlValue> = Vec::new();
            push_tag_filter(&mut sql, &mut params, part);
            sql.push_str(" ORDER BY id ASC");

            let mut stmt = self.conn.prepare_cached(&sql)?;
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            while let Some(row) = rows.next()? {
                out.push(tag_from_row(row)?);
            }
        }
        if parts.len() > 1 {
            out.sort_by_key(|tag| tag.id);
        }
        Ok(out)
    }

    fn delete_tags(&self, filter: &TagFilter) -> Result<usize> {
        if filter.is_vacuous() {
            return Ok(0);
        }
        self.with_savepoint(|| {
            let doomed = self.matching_tag_ids(filter)?;
            if doomed.is_empty() {
                return Ok(0);
            }

            let as_objects: Vec<SqlValue> = doomed
                .iter()
                .map(|id| SqlValue::Text(id.to_string()))
                .collect();
            let as_ids: Vec<SqlValue> = doomed.iter().map(|id| SqlValue::Integer(id.get())).collect();

            // edges where a doomed tag is the tagged object
            self.execute_in_chunks(
                "DELETE FROM tagged WHERE object_type = ? AND object_id IN (",
                &[SqlValue::Text(TAG_OBJECT_TYPE.to_string())],
                as_objects,
            )?;
            // edges owned by a doomed tag
            self.execute_in_chunks("DELETE FROM tagged WHERE tag_id IN (", &[], as_ids.clone())?;
            self.execute_in_chunks("DELETE FROM tags WHERE id IN (", &[], as_ids)
        })
    }

    fn insert_edges(&self, rows: &[NewEdge]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.with_savepoint(|| {
            let wanted: BTreeSet<TagId> = rows.iter().map(|row| row.tag_id).collect();
            let present = self.matching_tag_ids(&TagFilter::Ids(wanted.clone()))?;
            if let Some(missing) = wanted.difference(&present).next() {
                return Err(StoreError::MissingTag(*missing));
            }

            let now = now_ms();
            let mut stmt = self.conn.prepare_cached(
                "INSERT OR IGNORE INTO tagged(tag_id, object_type, object_id, created_at_ms) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut created = 0;
            for row in rows {
                created += stmt.execute(params![row.tag_id.get(), row.object_type, row.object_id, now])?;
            }
            Ok(created)
        })
    }

    fn select_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        if filter.is_vacuous() {
            return Ok(Vec::new());
        }

        let parts = split_edge_filter(filter);
        let mut out = Vec::new();
        for part in &parts {
            let mut sql =
                String::from("SELECT tag_id, object_type, object_id, created_at_ms FROM tagged");
            let mut params: Vec<SqlValue> = Vec::new();
            push_edge_filter(&mut sql, &mut params, part);
            sql.push_str(" ORDER BY tag_id ASC, object_type ASC, object_id ASC");

            let mut stmt = self.conn.prepare_cached(&sql)?;
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            while let Some(row) = rows.next()? {
                out.push(Edge {
                    tag_id: TagId(row.get(0)?),
                    object_type: row.get(1)?,
                    object_id: row.get(2)?,
                    created_at_ms: row.get(3)?,
                });
            }
        }
        if parts.len() > 1 {
            out.sort_by(|a, b| {
                (a.tag_id, &a.object_type, &a.object_id).cmp(&(b.tag_id, &b.object_type, &b.object_id))
            });
        }
        Ok(out)
    }

    fn delete_edges(&self, filter: &EdgeFilter) -> Result<usize> {
        if filter.is_vacuous() {
            return Ok(0);
        }
        self.with_savepoint(|| {
            let mut deleted = 0;
            for part in split_edge_filter(filter) {
                let mut sql = String::from("DELETE FROM tagged");
                let mut params: Vec<SqlValue> = Vec::new();
                push_edge_filter(&mut sql, &mut params, &part);
                deleted += self.conn.execute(&sql, params_from_iter(params.iter()))?;
            }
            Ok(deleted)
        })
    }

    fn atomically<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        self.with_savepoint(|| f(self))
    }
}

fn install_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          namespace TEXT,
          description TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          CHECK(name <> ''),
          CHECK(namespace IS NULL OR namespace <> '')
        );

        CREATE UNIQUE INDEX IF NOT EXISTS tags_name_namespace
          ON tags(name, IFNULL(namespace, ''));

        CREATE TABLE IF NOT EXISTS tagged (
          tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
          object_type TEXT NOT NULL,
          object_id TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY(tag_id, object_type, object_id)
        );

        CREATE INDEX IF NOT EXISTS tagged_object
          ON tagged(object_type, object_id);
        "#,
    )?;
    Ok(())
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: TagId(row.get(0)?),
        name: row.get(1)?,
        namespace: row.get(2)?,
        description: row.get(3)?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

/// Split a membership set into pieces of at most [`MAX_IN_LIST`] values.
fn chunk_set<T: Ord + Clone>(set: &BTreeSet<T>) -> Vec<BTreeSet<T>> {
    let values: Vec<&T> = set.iter().collect();
    values
        .chunks(MAX_IN_LIST)
        .map(|chunk| chunk.iter().map(|value| (*value).clone()).collect())
        .collect()
}

/// Disjoint sub-filters whose union matches what `filter` matches.
fn split_tag_filter(filter: &TagFilter) -> Vec<TagFilter> {
    match filter {
        TagFilter::All => vec![TagFilter::All],
        TagFilter::Ids(ids) => chunk_set(ids).into_iter().map(TagFilter::Ids).collect(),
        TagFilter::Names { names, namespace } => chunk_set(names)
            .into_iter()
            .map(|names| TagFilter::Names {
                names,
                namespace: namespace.clone(),
            })
            .collect(),
    }
}

/// Cross product of the chunked `tag_ids` and `object_ids` sets.
fn split_edge_filter(filter: &EdgeFilter) -> Vec<EdgeFilter> {
    let tag_chunks: Vec<Option<BTreeSet<TagId>>> = match &filter.tag_ids {
        Some(ids) => chunk_set(ids).into_iter().map(Some).collect(),
        None => vec![None],
    };
    let object_chunks: Vec<Option<BTreeSet<String>>> = match &filter.object_ids {
        Some(ids) => chunk_set(ids).into_iter().map(Some).collect(),
        None => vec![None],
    };

    let mut parts = Vec::with_capacity(tag_chunks.len() * object_chunks.len());
    for tag_ids in &tag_chunks {
        for object_ids in &object_chunks {
            parts.push(EdgeFilter {
                object_type: filter.object_type.clone(),
                tag_ids: tag_ids.clone(),
                object_ids: object_ids.clone(),
            });
        }
    }
    parts
}

fn push_tag_filter(sql: &mut String, params: &mut Vec<SqlValue>, filter: &TagFilter) {
    match filter {
        TagFilter::All => {}
        TagFilter::Ids(ids) => {
            sql.push_str(" WHERE id IN (");
            push_in_list(sql, params, ids.iter().map(|id| SqlValue::Integer(id.get())));
        }
        TagFilter::Names { names, namespace } => {
            sql.push_str(" WHERE namespace IS ? AND name IN (");
            params.push(namespace.clone().map_or(SqlValue::Null, SqlValue::Text));
            push_in_list(sql, params, names.iter().cloned().map(SqlValue::Text));
        }
    }
}

fn push_edge_filter(sql: &mut String, params: &mut Vec<SqlValue>, filter: &EdgeFilter) {
    sql.push_str(" WHERE object_type = ?");
    params.push(SqlValue::Text(filter.object_type.clone()));
    if let Some(tag_ids) = &filter.tag_ids {
        sql.push_str(" AND tag_id IN (");
        push_in_list(sql, params, tag_ids.iter().map(|id| SqlValue::Integer(id.get())));
    }
    if let Some(object_ids) = &filter.object_ids {
        sql.push_str(" AND object_id IN (");
        push_in_list(sql, params, object_ids.iter().cloned().map(SqlValue::Text));
    }
}

/// Appends `?,?,...)` for each value. The caller has already written `IN (`.
fn push_in_list(
    sql: &mut String,
    params: &mut Vec<SqlValue>,
    values: impl IntoIterator<Item = SqlValue>,
) {
    for (i, value) in values.into_iter().enumerate() {
        if i != 0 {
            sql.push(',');
        }
        sql.push('?');
        params.push(value);
    }
    sql.push(')');
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message
                    .as_deref()
                    .is_some_and(|value| value.contains("UNIQUE constraint failed"))
        }
        _ => false,
    }
}
