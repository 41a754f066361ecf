//! File catalog storage operations.

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Deserialize;

use super::models::{now_unix, FileRecord, Page};
use crate::error::StorageError;
use crate::scanner::{Changeset, FileDescriptor};
use crate::Result;

/// Default page size for file listings.
pub const DEFAULT_PAGE_SIZE: usize = 150;

/// Largest page a single listing may return.
pub const MAX_PAGE_SIZE: usize = 1000;

const FILE_COLUMNS: &str = "id, directory_id, filename, parent_path, full_path, size_bytes, \
                            extension, modified_at, indexed_at";

/// Column a file listing can be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    Id,
    Filename,
    SizeBytes,
    Extension,
    ModifiedAt,
    FullPath,
}

impl SortColumn {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Filename => "filename",
            Self::SizeBytes => "size_bytes",
            Self::Extension => "extension",
            Self::ModifiedAt => "modified_at",
            Self::FullPath => "full_path",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filter, sort and pagination options for listing files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileQuery {
    /// Case-insensitive filename substring.
    pub search: Option<String>,

    /// Extension, with or without the leading dot.
    pub extension: Option<String>,

    /// Restrict to one directory.
    pub directory_id: Option<i64>,

    /// Minimum size in bytes (inclusive).
    pub min_size: Option<i64>,

    /// Maximum size in bytes (inclusive).
    pub max_size: Option<i64>,

    pub sort_by: SortColumn,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: usize,
}

impl Default for FileQuery {
    fn default() -> Self {
        Self {
            search: None,
            extension: None,
            directory_id: None,
            min_size: None,
            max_size: None,
            sort_by: SortColumn::default(),
            order: SortOrder::default(),
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FileQuery {
    /// Create a query returning the first `limit` files.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    /// Filter by filename substring.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Filter by extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Filter by owning directory.
    #[must_use]
    pub const fn with_directory(mut self, directory_id: i64) -> Self {
        self.directory_id = Some(directory_id);
        self
    }

    /// Filter by inclusive size range.
    #[must_use]
    pub const fn with_size_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    /// Set ordering.
    #[must_use]
    pub const fn sorted_by(mut self, column: SortColumn, order: SortOrder) -> Self {
        self.sort_by = column;
        self.order = order;
        self
    }

    /// Skip the first `offset` matches.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            conditions.push("filename LIKE ? ESCAPE '\\'");
            values.push(Value::Text(format!("%{}%", escape_like(search))));
        }
        if let Some(ext) = self.extension.as_deref().filter(|e| !e.is_empty()) {
            conditions.push("extension = ?");
            values.push(Value::Text(normalize_extension(ext)));
        }
        if let Some(id) = self.directory_id {
            conditions.push("directory_id = ?");
            values.push(Value::Integer(id));
        }
        if let Some(min) = self.min_size {
            conditions.push("size_bytes >= ?");
            values.push(Value::Integer(min));
        }
        if let Some(max) = self.max_size {
            conditions.push("size_bytes <= ?");
            values.push(Value::Integer(max));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

/// Lowercase an extension and make sure it starts with a dot.
fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        directory_id: row.get(1)?,
        filename: row.get(2)?,
        parent_path: row.get(3)?,
        full_path: row.get(4)?,
        size_bytes: row.get(5)?,
        extension: row.get(6)?,
        modified_at: row.get(7)?,
        indexed_at: row.get(8)?,
    })
}

fn collect_files(
    conn: &Connection,
    sql: &str,
    values: impl IntoIterator<Item = Value>,
) -> Result<Vec<FileRecord>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| StorageError::Database(format!("failed to prepare file query: {e}")))?;

    let files = stmt
        .query_map(params_from_iter(values), row_to_file)
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(files)
}

/// Load every file of a directory keyed by absolute path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_files_by_directory(
    conn: &Connection,
    directory_id: i64,
) -> Result<HashMap<String, FileRecord>> {
    let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE directory_id = ?");
    let files = collect_files(conn, &sql, [Value::Integer(directory_id)])?;
    Ok(files
        .into_iter()
        .map(|file| (file.full_path.clone(), file))
        .collect())
}

/// Insert one observed file for a directory.
///
/// # Errors
///
/// Returns an error if the insert fails (for example a duplicate `full_path`).
pub fn insert_file(conn: &Connection, directory_id: i64, file: &FileDescriptor) -> Result<i64> {
    let size = i64::try_from(file.size_bytes).unwrap_or(i64::MAX);
    conn.execute(
        "INSERT INTO files (directory_id, filename, parent_path, full_path, size_bytes, \
         extension, modified_at, indexed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            directory_id,
            file.filename(),
            file.parent_path(),
            file.full_path(),
            size,
            file.extension(),
            file.modified_at,
            now_unix(),
        ],
    )
    .map_err(|e| {
        StorageError::Database(format!(
            "failed to insert file '{}': {e}",
            file.absolute_path.display()
        ))
    })?;

    Ok(conn.last_insert_rowid())
}

/// Apply a changeset: delete stale rows first, then insert new ones.
///
/// Deletes are scoped to `directory_id`. Not transactional by itself; run it
/// inside [`Database::with_transaction`](super::Database::with_transaction).
///
/// # Errors
///
/// Returns an error on the first failing statement.
pub fn apply_changeset(conn: &Connection, directory_id: i64, changeset: &Changeset) -> Result<()> {
    {
        let mut delete = conn
            .prepare_cached("DELETE FROM files WHERE id = ? AND directory_id = ?")
            .map_err(|e| StorageError::Database(e.to_string()))?;
        for id in &changeset.to_delete {
            delete
                .execute(params![id, directory_id])
                .map_err(|e| StorageError::Database(format!("failed to delete file {id}: {e}")))?;
        }
    }

    for file in &changeset.to_insert {
        insert_file(conn, directory_id, file)?;
    }

    tracing::debug!(
        directory_id,
        inserted = changeset.to_insert.len(),
        deleted = changeset.to_delete.len(),
        "Applied changeset"
    );
    Ok(())
}

/// Get a file by ID.
///
/// # Errors
///
/// Returns an error if the file is not found or the query fails.
pub fn get_file(conn: &Connection, id: i64) -> Result<FileRecord> {
    let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?");
    conn.query_row(&sql, [id], row_to_file).map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::not_found("file", id.to_string()).into()
        }
        e => StorageError::Database(format!("failed to get file: {e}")).into(),
    })
}

/// Get the files with the given IDs. Unknown IDs are silently absent.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_files(conn: &Connection, ids: &[i64]) -> Result<Vec<FileRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(",");
    let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id IN ({placeholders}) ORDER BY id");
    collect_files(conn, &sql, ids.iter().map(|id| Value::Integer(*id)))
}

/// Delete file rows by ID, returning how many existed.
///
/// # Errors
///
/// Returns an error if a delete fails.
pub fn delete_files_by_id(conn: &Connection, ids: &[i64]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached("DELETE FROM files WHERE id = ?")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut deleted = 0;
    for id in ids {
        deleted += stmt
            .execute([id])
            .map_err(|e| StorageError::Database(format!("failed to delete file {id}: {e}")))?;
    }
    Ok(deleted)
}

/// List files matching `query`, with the total match count.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn query_files(conn: &Connection, query: &FileQuery) -> Result<Page<FileRecord>> {
    let (where_sql, values) = query.where_clause();

    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM files{where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )
        .map_err(|e| StorageError::Database(format!("failed to count files: {e}")))?;

    let limit = i64::try_from(query.limit.min(MAX_PAGE_SIZE)).unwrap_or(0);
    let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
    let sql = format!(
        "SELECT {FILE_COLUMNS} FROM files{where_sql} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
        query.sort_by.as_sql(),
        query.order.as_sql()
    );

    let items = collect_files(
        conn,
        &sql,
        values
            .into_iter()
            .chain([Value::Integer(limit), Value::Integer(offset)]),
    )?;

    Ok(Page { items, total })
}

/// Count all cataloged files.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_files(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{insert_directory, migrate, Database};
    use std::path::PathBuf;

    fn setup_db() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let dir_id = db
            .with_conn(|conn| {
                migrate(conn)?;
                Ok(insert_directory(conn, "/data")?.id)
            })
            .unwrap();
        (db, dir_id)
    }

    fn descriptor(rel: &str, size: u64) -> FileDescriptor {
        FileDescriptor {
            absolute_path: PathBuf::from("/data").join(rel),
            relative_path: PathBuf::from(rel),
            size_bytes: size,
            modified_at: 1_000,
        }
    }

    fn seed(db: &Database, dir_id: i64, files: &[(&str, u64)]) {
        db.with_conn(|conn| {
            for (rel, size) in files {
                insert_file(conn, dir_id, &descriptor(rel, *size))?;
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_insert_and_index_by_path() {
        let (db, dir_id) = setup_db();
        seed(&db, dir_id, &[("a.TXT", 3), ("sub/b.md", 5)]);

        let index = db
            .with_conn(|conn| list_files_by_directory(conn, dir_id))
            .unwrap();
        assert_eq!(index.len(), 2);

        let a = &index["/data/a.TXT"];
        assert_eq!(a.filename, "a.TXT");
        assert_eq!(a.extension, ".txt");
        assert_eq!(a.parent_path, "/data");
        assert_eq!(index["/data/sub/b.md"].parent_path, "/data/sub");
    }

    #[test]
    fn test_apply_changeset_replaces_rows() {
        let (db, dir_id) = setup_db();
        seed(&db, dir_id, &[("x.txt", 1), ("y.txt", 1)]);

        let index = db
            .with_conn(|conn| list_files_by_directory(conn, dir_id))
            .unwrap();
        let changeset = Changeset {
            to_insert: vec![descriptor("z.txt", 1)],
            to_delete: vec![index["/data/y.txt"].id],
        };
        db.with_transaction(|conn| apply_changeset(conn, dir_id, &changeset))
            .unwrap();

        let mut paths: Vec<_> = db
            .with_conn(|conn| list_files_by_directory(conn, dir_id))
            .unwrap()
            .into_keys()
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["/data/x.txt", "/data/z.txt"]);
    }

    #[test]
    fn test_failed_changeset_rolls_back_deletes() {
        let (db, dir_id) = setup_db();
        seed(&db, dir_id, &[("x.txt", 1), ("y.txt", 1)]);

        let index = db
            .with_conn(|conn| list_files_by_directory(conn, dir_id))
            .unwrap();
        // Inserting x.txt again violates the unique full_path after y.txt is deleted.
        let changeset = Changeset {
            to_insert: vec![descriptor("x.txt", 9)],
            to_delete: vec![index["/data/y.txt"].id],
        };
        let result = db.with_transaction(|conn| apply_changeset(conn, dir_id, &changeset));
        assert!(result.is_err());

        let after = db
            .with_conn(|conn| list_files_by_directory(conn, dir_id))
            .unwrap();
        assert_eq!(after, index);
    }

    #[test]
    fn test_get_files_and_delete() {
        let (db, dir_id) = setup_db();
        seed(&db, dir_id, &[("a.txt", 1), ("b.txt", 2)]);

        db.with_conn(|conn| {
            let all = query_files(conn, &FileQuery::default())?.items;
            let ids: Vec<i64> = all.iter().map(|f| f.id).collect();

            let fetched = get_files(conn, &[ids[1], 9999])?;
            assert_eq!(fetched.len(), 1);
            assert_eq!(fetched[0].filename, "b.txt");

            assert_eq!(delete_files_by_id(conn, &[ids[0], 9999])?, 1);
            assert_eq!(count_files(conn)?, 1);
            assert!(get_file(conn, ids[0]).unwrap_err().is_not_found());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_query_filters_and_pagination() {
        let (db, dir_id) = setup_db();
        seed(
            &db,
            dir_id,
            &[
                ("report_2023.pdf", 500),
                ("report_2024.PDF", 1500),
                ("notes.txt", 20),
                ("100%_done.txt", 40),
            ],
        );

        db.with_conn(|conn| {
            let page = query_files(conn, &FileQuery::default().with_search("REPORT"))?;
            assert_eq!(page.total, 2);

            let page = query_files(conn, &FileQuery::default().with_extension("pdf"))?;
            assert_eq!(page.total, 2);
            let page = query_files(conn, &FileQuery::default().with_extension(".TXT"))?;
            assert_eq!(page.total, 2);

            // `%` is matched literally.
            let page = query_files(conn, &FileQuery::default().with_search("%"))?;
            assert_eq!(page.total, 1);
            assert_eq!(page.items[0].filename, "100%_done.txt");

            let page = query_files(
                conn,
                &FileQuery::default().with_size_range(Some(30), Some(1000)),
            )?;
            assert_eq!(page.total, 2);

            let page = query_files(
                conn,
                &FileQuery::new(1)
                    .sorted_by(SortColumn::SizeBytes, SortOrder::Desc)
                    .with_offset(1),
            )?;
            assert_eq!(page.total, 4);
            assert_eq!(page.items.len(), 1);
            assert_eq!(page.items[0].size_bytes, 500);

            let page = query_files(conn, &FileQuery::default().with_directory(dir_id + 1))?;
            assert_eq!(page.total, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_page_size_is_capped() {
        let (db, _) = setup_db();
        let page = db
            .with_conn(|conn| query_files(conn, &FileQuery::new(MAX_PAGE_SIZE * 10)))
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_sort_params_deserialize() {
        let query: FileQuery =
            serde_json::from_str(r#"{"sort_by":"size_bytes","order":"desc","limit":5}"#).unwrap();
        assert_eq!(query.sort_by, SortColumn::SizeBytes);
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.limit, 5);
        assert_eq!(query.offset, 0);
    }
}
