use crate::error::{AppError, AppResult};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type SharedConnection = Arc<Mutex<Connection>>;

/// At most one open connection per database file.
///
/// Owned by the application context and handed to each database handle, so
/// reopening a file that is already open reuses the pooled connection.
#[derive(Default)]
pub struct ConnectionPool {
    connections: Mutex<HashMap<PathBuf, SharedConnection>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_open(&self, path: &Path) -> AppResult<SharedConnection> {
        let mut connections = self.lock()?;
        if let Some(conn) = connections.get(path) {
            return Ok(Arc::clone(conn));
        }

        let conn = Connection::open(path)?;
        debug!(target: "database", "Opened connection to {}", path.display());
        let conn = Arc::new(Mutex::new(conn));
        connections.insert(path.to_path_buf(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Remove the pooled connection for `path`. The connection closes once
    /// the last clone of it is dropped.
    pub fn close(&self, path: &Path) {
        if let Ok(mut connections) = self.connections.lock() {
            if connections.remove(path).is_some() {
                debug!(target: "database", "Closed connection to {}", path.display());
            }
        }
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.connections
            .lock()
            .map(|c| c.contains_key(path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<PathBuf, SharedConnection>>> {
        self.connections
            .lock()
            .map_err(|_| AppError::QueryExecution("connection pool lock poisoned".to_string()))
    }
}
