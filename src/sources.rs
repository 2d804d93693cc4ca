//! Table sources: where `/get_data` rows and the song catalog come from

use crate::error::SourceError;
use crate::types::Row;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Trait for pluggable read-only table backends
#[async_trait]
pub trait TableSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// All rows of `table`, in the order the backend returns them
    async fn fetch_table(&self, table: &str) -> Result<Vec<Row>, SourceError>;
}

/// In-memory tables, for tests and demos
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    tables: HashMap<String, Vec<Row>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(table.into(), rows);
        self
    }
}

#[async_trait]
impl TableSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_table(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| SourceError::UnknownTable(table.to_string()))
    }
}

/// Tables stored as `<dir>/<table>.json`, each a JSON array of objects
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.json", table))
    }
}

#[async_trait]
impl TableSource for JsonFileSource {
    fn name(&self) -> &'static str {
        "json_files"
    }

    async fn fetch_table(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        // Table names come from the allow-list, but never let one escape the directory
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SourceError::UnknownTable(table.to_string()));
        }

        let path = self.table_path(table);
        debug!("Reading table {} from {}", table, path.display());

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::UnknownTable(table.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice::<Vec<Row>>(&bytes)
            .map_err(|e| SourceError::Decode(format!("{}: {}", path.display(), e)))
    }
}
