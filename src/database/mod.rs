//! Database collaborator.
//!
//! The engine never talks to a driver directly; it goes through the
//! [`Database`] trait so dialect rules (placeholders, quoting, how to list
//! tables) stay behind one boundary. Every error that crosses it is an
//! [`AppError`] the caller can show and recover from.

pub mod pool;
pub mod sqlite;

use crate::data::datatable::DataTable;
use crate::error::AppResult;
use crate::sql::query_builder::{build_update, BuiltQuery, Dialect, PendingUpdate};
use std::path::Path;

pub use pool::ConnectionPool;
pub use sqlite::SqliteDatabase;

/// Name given to the table produced by an ad-hoc query
pub const QUERY_RESULTS_TABLE: &str = "results";

pub trait Database {
    fn dialect(&self) -> &dyn Dialect;

    /// Path of the file the live handle points at
    fn file_name(&self) -> &Path;

    /// Point the handle at `path`, reusing a pooled connection if one exists
    fn open_handle(&mut self, path: &Path) -> AppResult<()>;

    /// Drop the live connection so the file can be copied or deleted
    fn close_handle(&mut self);

    fn list_table_names(&self) -> AppResult<Vec<String>>;

    fn primary_key_columns(&self, table: &str) -> AppResult<Vec<String>>;

    /// `SELECT * FROM <table>` as a column store
    fn select_all(&self, table: &str) -> AppResult<DataTable>;

    /// Run an arbitrary row-returning statement
    fn query(&self, sql: &str) -> AppResult<DataTable>;

    /// Whether `sql` only reads, as judged by the engine when preparing it.
    /// Fails for text the engine cannot prepare.
    fn is_read_only(&self, sql: &str) -> AppResult<bool>;

    /// Run an arbitrary statement, returning the affected row count
    fn execute(&self, sql: &str) -> AppResult<usize>;

    /// Run one prepared statement with positional parameters inside a
    /// transaction. Any error rolls the transaction back.
    fn execute_prepared(&self, query: &BuiltQuery) -> AppResult<usize>;

    fn generate_query(&self, update: &PendingUpdate) -> AppResult<BuiltQuery> {
        build_update(update, self.dialect())
    }

    fn update(&self, update: &PendingUpdate) -> AppResult<usize> {
        let query = self.generate_query(update)?;
        self.execute_prepared(&query)
    }
}
