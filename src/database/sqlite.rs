use crate::data::datatable::{DataTable, DataValue};
use crate::database::pool::{ConnectionPool, SharedConnection};
use crate::database::{Database, QUERY_RESULTS_TABLE};
use crate::error::{AppError, AppResult};
use crate::sql::query_builder::{BuiltQuery, Dialect};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Batch, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const TABLE_NAMES_QUERY: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'";

pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn placeholder(&self) -> &str {
        "?"
    }
}

/// SQLite backend. Holds the path of the live file and a pooled connection
/// to it; the pool is shared with the rest of the application.
pub struct SqliteDatabase {
    file_name: PathBuf,
    pool: Arc<ConnectionPool>,
    conn: Option<SharedConnection>,
    dialect: SqliteDialect,
}

impl SqliteDatabase {
    pub fn open(path: impl Into<PathBuf>, pool: Arc<ConnectionPool>) -> AppResult<Self> {
        let mut db = Self {
            file_name: path.into(),
            pool,
            conn: None,
            dialect: SqliteDialect,
        };
        let path = db.file_name.clone();
        db.open_handle(&path)?;
        Ok(db)
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self.conn.as_ref().ok_or_else(|| {
            AppError::QueryExecution(format!(
                "Database {} is not open",
                self.file_name.display()
            ))
        })?;
        let mut guard = conn
            .lock()
            .map_err(|_| AppError::QueryExecution("database connection lock poisoned".into()))?;
        f(&mut guard)
    }

    fn run_query(&self, sql: &str, table_name: &str) -> AppResult<DataTable> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;

            let mut columns = Vec::with_capacity(stmt.column_count());
            let mut kinds = Vec::with_capacity(stmt.column_count());
            for col in stmt.columns() {
                columns.push(col.name().to_string());
                kinds.push(DeclaredKind::from_decl_type(col.decl_type()));
            }

            let mut rows = Vec::new();
            let mut result = stmt.query([])?;
            while let Some(row) = result.next()? {
                let mut values = Vec::with_capacity(kinds.len());
                for (idx, kind) in kinds.iter().enumerate() {
                    values.push(read_value(row.get_ref(idx)?, *kind));
                }
                rows.push(values);
            }

            debug!(target: "database", "Query '{}' returned {} rows", sql, rows.len());
            DataTable::load(table_name, columns, rows)
        })
    }
}

impl Database for SqliteDatabase {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn file_name(&self) -> &Path {
        &self.file_name
    }

    fn open_handle(&mut self, path: &Path) -> AppResult<()> {
        if !path.exists() {
            return Err(AppError::storage(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database file not found"),
            ));
        }
        let conn = self.pool.get_or_open(path)?;
        self.conn = Some(conn);
        self.file_name = path.to_path_buf();
        info!(target: "database", "Database handle now points at {}", path.display());
        Ok(())
    }

    fn close_handle(&mut self) {
        if self.conn.take().is_some() {
            self.pool.close(&self.file_name);
        }
    }

    fn list_table_names(&self) -> AppResult<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(TABLE_NAMES_QUERY)?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
    }

    fn primary_key_columns(&self, table: &str) -> AppResult<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", self.dialect.quote_identifier(table));
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut keys = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>("name")?, row.get::<_, i64>("pk")?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            keys.retain(|(_, pk)| *pk > 0);
            keys.sort_by_key(|(_, pk)| *pk);
            Ok(keys.into_iter().map(|(name, _)| name).collect())
        })
    }

    fn select_all(&self, table: &str) -> AppResult<DataTable> {
        let sql = format!("SELECT * FROM {}", self.dialect.quote_identifier(table));
        self.run_query(&sql, table)
    }

    fn query(&self, sql: &str) -> AppResult<DataTable> {
        self.run_query(sql, QUERY_RESULTS_TABLE)
    }

    fn is_read_only(&self, sql: &str) -> AppResult<bool> {
        self.with_connection(|conn| {
            let mut batch = Batch::new(conn, sql);
            let mut statements = 0;
            let mut read_only = true;
            while let Some(stmt) = batch.next()? {
                read_only &= stmt.readonly();
                statements += 1;
            }
            Ok(statements > 0 && read_only)
        })
    }

    fn execute(&self, sql: &str) -> AppResult<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            let changed = tx.changes() as usize;
            tx.commit()?;
            info!(target: "query", "Executed statement, {} rows changed", changed);
            Ok(changed)
        })
    }

    fn execute_prepared(&self, query: &BuiltQuery) -> AppResult<usize> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let changed = {
                let mut stmt = tx.prepare(&query.sql)?;
                stmt.execute(params_from_iter(query.params.iter()))?
            };

            // Dropping the transaction without commit rolls it back
            match changed {
                0 => Err(AppError::not_found(
                    "No row in the database matched the selected cell",
                )),
                1 => {
                    tx.commit()?;
                    debug!(target: "query", "Committed: {}", query.sql);
                    Ok(changed)
                }
                n => Err(AppError::MalformedEdit(format!(
                    "Edit would change {} identical rows; nothing was written",
                    n
                ))),
            }
        })
    }
}

/// What the declared column type says about how to read a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclaredKind {
    Boolean,
    Temporal,
    Other,
}

impl DeclaredKind {
    fn from_decl_type(decl: Option<&str>) -> Self {
        let Some(decl) = decl else {
            return DeclaredKind::Other;
        };
        let decl = decl.to_ascii_uppercase();
        if decl.starts_with("BOOL") {
            DeclaredKind::Boolean
        } else if decl.contains("DATE") || decl.contains("TIME") {
            DeclaredKind::Temporal
        } else {
            DeclaredKind::Other
        }
    }
}

fn read_value(value: ValueRef<'_>, kind: DeclaredKind) -> DataValue {
    match value {
        ValueRef::Null => DataValue::Null,
        ValueRef::Integer(i) if kind == DeclaredKind::Boolean && (i == 0 || i == 1) => {
            DataValue::Boolean(i == 1)
        }
        ValueRef::Integer(i) => DataValue::Integer(i),
        ValueRef::Real(f) => DataValue::Float(f),
        ValueRef::Text(t) => {
            let text = String::from_utf8_lossy(t).into_owned();
            if kind == DeclaredKind::Temporal {
                DataValue::DateTime(text)
            } else {
                DataValue::String(text)
            }
        }
        ValueRef::Blob(b) => DataValue::Blob(b.to_vec()),
    }
}

impl ToSql for DataValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            DataValue::Null => ToSqlOutput::Owned(Value::Null),
            DataValue::Boolean(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            DataValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            DataValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            DataValue::String(s) | DataValue::DateTime(s) => {
                ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))
            }
            DataValue::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::query_builder::PendingUpdate;
    use tempfile::TempDir;

    fn create_db(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("test.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, active BOOLEAN, joined DATETIME, score REAL);
             INSERT INTO users VALUES (1, 'Alice', 1, '2024-01-01 09:00:00', 1.5);
             INSERT INTO users VALUES (2, 'Bob', 0, NULL, 2.25);
             CREATE TABLE notes (body TEXT);",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_select_all_types() {
        let dir = TempDir::new().unwrap();
        let db = SqliteDatabase::open(create_db(&dir), Arc::new(ConnectionPool::new())).unwrap();

        assert_eq!(db.list_table_names().unwrap(), vec!["users", "notes"]);

        let users = db.select_all("users").unwrap();
        assert_eq!(users.row_count(), 2);
        assert_eq!(users.value(0, "id"), Some(&DataValue::Integer(1)));
        assert_eq!(users.value(0, "active"), Some(&DataValue::Boolean(true)));
        assert_eq!(
            users.value(0, "joined"),
            Some(&DataValue::DateTime("2024-01-01 09:00:00".into()))
        );
        assert_eq!(users.value(1, "joined"), Some(&DataValue::Null));
        assert_eq!(users.value(1, "score"), Some(&DataValue::Float(2.25)));
    }

    #[test]
    fn test_primary_key_lookup() {
        let dir = TempDir::new().unwrap();
        let db = SqliteDatabase::open(create_db(&dir), Arc::new(ConnectionPool::new())).unwrap();
        assert_eq!(db.primary_key_columns("users").unwrap(), vec!["id"]);
        assert!(db.primary_key_columns("notes").unwrap().is_empty());
    }

    #[test]
    fn test_update_commits_one_row() {
        let dir = TempDir::new().unwrap();
        let db = SqliteDatabase::open(create_db(&dir), Arc::new(ConnectionPool::new())).unwrap();
        let update = PendingUpdate {
            table: "users".into(),
            column: "name".into(),
            keys: vec![("id".into(), DataValue::Integer(2))],
            new_value: DataValue::String("Bobby".into()),
        };
        assert_eq!(db.update(&update).unwrap(), 1);
        let users = db.select_all("users").unwrap();
        assert_eq!(users.value(1, "name"), Some(&DataValue::String("Bobby".into())));
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let dir = TempDir::new().unwrap();
        let db = SqliteDatabase::open(create_db(&dir), Arc::new(ConnectionPool::new())).unwrap();

        let missing_row = PendingUpdate {
            table: "users".into(),
            column: "name".into(),
            keys: vec![("id".into(), DataValue::Integer(99))],
            new_value: DataValue::String("Nobody".into()),
        };
        assert!(matches!(db.update(&missing_row), Err(AppError::DataNotFound(_))));

        let bad_column = PendingUpdate {
            table: "users".into(),
            column: "nope".into(),
            keys: vec![("id".into(), DataValue::Integer(1))],
            new_value: DataValue::Integer(1),
        };
        assert!(matches!(db.update(&bad_column), Err(AppError::QueryExecution(_))));

        let users = db.select_all("users").unwrap();
        assert_eq!(users.value(0, "name"), Some(&DataValue::String("Alice".into())));
    }

    #[test]
    fn test_read_only_detection() {
        let dir = TempDir::new().unwrap();
        let db = SqliteDatabase::open(create_db(&dir), Arc::new(ConnectionPool::new())).unwrap();

        assert!(db.is_read_only("SELECT * FROM users").unwrap());
        assert!(db.is_read_only("-- names only\nSELECT name FROM users").unwrap());
        assert!(!db.is_read_only("-- cleanup\nDELETE FROM users").unwrap());
        assert!(!db
            .is_read_only("WITH old AS (SELECT id FROM users) DELETE FROM users WHERE id IN (SELECT id FROM old)")
            .unwrap());
        assert!(!db.is_read_only("SELECT 1; UPDATE users SET score = 0").unwrap());
        assert!(!db.is_read_only("PRAGMA user_version = 3").unwrap());
        assert!(db.is_read_only("UPDATE missing SET x = 1").is_err());

        // Checking must not run anything
        assert_eq!(db.select_all("users").unwrap().row_count(), 2);
    }

    #[test]
    fn test_join_with_repeated_column_names() {
        let dir = TempDir::new().unwrap();
        let db = SqliteDatabase::open(create_db(&dir), Arc::new(ConnectionPool::new())).unwrap();
        let result = db
            .query("SELECT a.id, b.id FROM users a JOIN users b ON a.id = b.id")
            .unwrap();
        assert_eq!(result.column_names(), &["id", "id:1"]);
        assert_eq!(result.value(1, "id:1"), Some(&DataValue::Integer(2)));
    }

    #[test]
    fn test_blob_values_round_trip_as_row_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blobs.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE files (name TEXT, data BLOB);
                 INSERT INTO files VALUES ('greeting', X'68656C6C6F'), ('raw', X'FF00');",
            )
            .unwrap();
        let db = SqliteDatabase::open(&path, Arc::new(ConnectionPool::new())).unwrap();

        let files = db.select_all("files").unwrap();
        assert_eq!(files.value(0, "data"), Some(&DataValue::Blob(b"hello".to_vec())));
        assert_eq!(files.value(1, "data"), Some(&DataValue::Blob(vec![0xff, 0x00])));

        // No primary key: every other column, blob included, anchors the row
        let rename = PendingUpdate::for_cell(
            &files,
            0,
            "name",
            DataValue::String("hello.txt".into()),
            &[],
        )
        .unwrap();
        assert_eq!(db.update(&rename).unwrap(), 1);

        let binary_row = PendingUpdate::for_cell(
            &files,
            1,
            "name",
            DataValue::String("raw.bin".into()),
            &[],
        )
        .unwrap();
        assert_eq!(db.update(&binary_row).unwrap(), 1);

        let files = db.select_all("files").unwrap();
        assert_eq!(files.value(0, "name"), Some(&DataValue::String("hello.txt".into())));
        assert_eq!(files.value(1, "name"), Some(&DataValue::String("raw.bin".into())));
        assert_eq!(files.value(0, "data"), Some(&DataValue::Blob(b"hello".to_vec())));
    }

    #[test]
    fn test_closed_handle_reports_error() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(ConnectionPool::new());
        let path = create_db(&dir);
        let mut db = SqliteDatabase::open(&path, Arc::clone(&pool)).unwrap();
        assert!(pool.is_open(&path));

        db.close_handle();
        assert!(!db.is_open());
        assert!(!pool.is_open(&path));
        assert!(matches!(db.select_all("users"), Err(AppError::QueryExecution(_))));

        db.open_handle(&path).unwrap();
        assert_eq!(db.select_all("users").unwrap().row_count(), 2);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = SqliteDatabase::open(dir.path().join("absent.db"), Arc::new(ConnectionPool::new()));
        assert!(matches!(result, Err(ref e) if e.is_missing_file()));
    }
}
