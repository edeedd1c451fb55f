use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SNIPPETS_FILE: &str = "snippets.json";

/// A stored SQL fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SqlSnippet {
    pub name: String,
    pub query: String,
}

/// Named SQL snippets persisted as a JSON array
#[derive(Debug)]
pub struct SnippetStore {
    path: PathBuf,
    snippets: Vec<SqlSnippet>,
}

impl SnippetStore {
    /// Load snippets from `dir`. A missing or unreadable file starts an
    /// empty store rather than failing startup.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(SNIPPETS_FILE);
        let snippets = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(target: "snippets", "Ignoring malformed {}: {}", path.display(), e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        debug!(target: "snippets", "Loaded {} snippets", snippets.len());
        Self { path, snippets }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn list(&self) -> &[SqlSnippet] {
        &self.snippets
    }

    /// Store `query` under `name` (or a generated one), replacing any snippet
    /// with the same name, and write the file
    pub fn stow(&mut self, name: Option<&str>, query: &str) -> AppResult<&SqlSnippet> {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => self.unused_name(),
        };
        self.snippets.retain(|s| s.name != name);
        self.snippets.push(SqlSnippet {
            name,
            query: query.to_string(),
        });
        self.save()?;
        info!(target: "snippets", "Stored snippet, {} total", self.snippets.len());
        Ok(&self.snippets[self.snippets.len() - 1])
    }

    /// SQL text of a snippet, addressed by name or by 1-based position.
    /// An exact name wins over a position.
    pub fn get(&self, key: &str) -> AppResult<&str> {
        self.snippets
            .iter()
            .find(|s| s.name == key)
            .or_else(|| {
                key.parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| self.snippets.get(i))
            })
            .map(|s| s.query.as_str())
            .ok_or_else(|| AppError::not_found(format!("No such snippet: {}", key)))
    }

    /// First `snippetN` not already taken
    fn unused_name(&self) -> String {
        (self.snippets.len() + 1..)
            .map(|n| format!("snippet{}", n))
            .find(|name| self.snippets.iter().all(|s| &s.name != name))
            .unwrap_or_default()
    }

    fn save(&self) -> AppResult<()> {
        let json = serde_json::to_string_pretty(&self.snippets).map_err(|e| {
            AppError::storage(&self.path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        fs::write(&self.path, json).map_err(|e| AppError::storage(&self.path, e))
    }
}
