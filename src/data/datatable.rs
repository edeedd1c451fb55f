use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Represents the data type of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Blob,
    Null,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::DateTime => "timestamp",
            DataType::Blob => "blob",
            DataType::Null => "null",
        };
        write!(f, "{}", name)
    }
}

/// A single cell value in the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(String), // Stored as the text SQLite handed us
    Blob(Vec<u8>),
    Null,
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::String(_) => DataType::String,
            DataValue::Integer(_) => DataType::Integer,
            DataValue::Float(_) => DataType::Float,
            DataValue::Boolean(_) => DataType::Boolean,
            DataValue::DateTime(_) => DataType::DateTime,
            DataValue::Blob(_) => DataType::Blob,
            DataValue::Null => DataType::Null,
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::String(s) => write!(f, "{}", s),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::DateTime(dt) => write!(f, "{}", dt),
            DataValue::Blob(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => write!(f, "{}", text),
                Err(_) => write!(f, "<blob {} bytes>", bytes.len()),
            },
            DataValue::Null => write!(f, "NULL"),
        }
    }
}

/// Column-oriented table: one value vector per column, all of equal length.
/// Row identity is the shared positional index.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub name: String,
    columns: Vec<String>,
    data: HashMap<String, Vec<DataValue>>,
}

impl DataTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            data: HashMap::new(),
        }
    }

    /// Build the column store from a row-oriented result set. Column order is
    /// kept exactly as given and the position in `rows` becomes the row index.
    /// A repeated header (a join selecting `a.id, b.id`) gets a `:n` suffix.
    pub fn load(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<DataValue>>,
    ) -> AppResult<Self> {
        let name = name.into();
        let columns = unique_headers(columns);
        let mut data: HashMap<String, Vec<DataValue>> = columns
            .iter()
            .map(|c| (c.clone(), Vec::with_capacity(rows.len())))
            .collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(AppError::QueryExecution(format!(
                    "Row {} has {} values but table {} has {} columns",
                    row_idx,
                    row.len(),
                    name,
                    columns.len()
                )));
            }
            for (column, value) in columns.iter().zip(row) {
                if let Some(values) = data.get_mut(column) {
                    values.push(value);
                }
            }
        }

        let table = Self {
            name,
            columns,
            data,
        };
        debug!(
            "Loaded table '{}' with {} columns and {} rows",
            table.name,
            table.column_count(),
            table.row_count()
        );
        Ok(table)
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns
            .first()
            .and_then(|c| self.data.get(c))
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn column(&self, name: &str) -> Option<&[DataValue]> {
        self.data.get(name).map(Vec::as_slice)
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&DataValue> {
        self.data.get(column)?.get(row)
    }

    /// Replace one cell and hand back the value it held
    pub fn set_value(&mut self, row: usize, column: &str, value: DataValue) -> AppResult<DataValue> {
        let table = &self.name;
        let values = self
            .data
            .get_mut(column)
            .ok_or_else(|| AppError::not_found(format!("No such column: {}.{}", table, column)))?;
        let cell = values.get_mut(row).ok_or_else(|| {
            AppError::not_found(format!("Row {} is out of range for {}", row, table))
        })?;
        Ok(std::mem::replace(cell, value))
    }

    /// One row as ordered (column, value) pairs
    pub fn row_values(&self, row: usize) -> Option<Vec<(String, DataValue)>> {
        if row >= self.row_count() {
            return None;
        }
        self.columns
            .iter()
            .map(|c| Some((c.clone(), self.value(row, c)?.clone())))
            .collect()
    }

    /// One row as display strings, in column order
    pub fn row_as_strings(&self, row: usize) -> Option<Vec<String>> {
        self.row_values(row)
            .map(|values| values.into_iter().map(|(_, v)| v.to_string()).collect())
    }
}

fn unique_headers(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(columns.len());
    columns
        .into_iter()
        .map(|column| {
            let mut candidate = column.clone();
            let mut n = 1;
            while seen.contains(&candidate) {
                candidate = format!("{}:{}", column, n);
                n += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Everything that gets snapshotted for undo/redo: the path of the database
/// file the data belongs to and every loaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    database_path: PathBuf,
    tables: HashMap<String, DataTable>,
    order: Vec<String>,
}

impl TableState {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            tables: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn set_database_path(&mut self, path: impl Into<PathBuf>) {
        self.database_path = path.into();
    }

    /// Insert or replace a table; new tables are appended to the display order
    pub fn insert_table(&mut self, table: DataTable) {
        if !self.tables.contains_key(&table.name) {
            self.order.push(table.name.clone());
        }
        self.tables.insert(table.name.clone(), table);
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.order.clear();
    }

    pub fn table(&self, name: &str) -> AppResult<&DataTable> {
        self.tables
            .get(name)
            .ok_or_else(|| AppError::not_found(format!("No such table: {}", name)))
    }

    pub fn table_mut(&mut self, name: &str) -> AppResult<&mut DataTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| AppError::not_found(format!("No such table: {}", name)))
    }

    pub fn table_names(&self) -> &[String] {
        &self.order
    }

    pub fn table_count(&self) -> usize {
        self.order.len()
    }

    /// Independent copy of every column vector. Nothing is shared with `self`,
    /// so the live state can be mutated freely afterwards.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }
}
