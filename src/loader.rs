//! Dataset loading: JSON rows in, deduplicated and complete catalog out

use crate::error::{LoadError, SourceError};
use crate::sources::TableSource;
use crate::types::*;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Catalog plus what was dropped on the way
#[derive(Debug)]
pub struct LoadReport {
    pub catalog: Catalog,
    pub total_rows: usize,
    pub duplicate_rows: usize,
    pub incomplete_rows: usize,
}

/// Parse a dataset payload.
///
/// Accepts the array of row objects served by `/get_data/<table>`. The
/// service's `{"message": ...}` answer for an empty table is read as no rows,
/// and an `{"error": ...}` answer becomes [`LoadError::Service`].
pub fn parse_dataset(bytes: &[u8]) -> Result<Vec<Row>, LoadError> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                _ => Err(LoadError::NotAnArray),
            })
            .collect(),
        Value::Object(obj) => {
            if let Some(err) = obj.get("error") {
                Err(LoadError::Service(value_to_text(err).unwrap_or_default()))
            } else if obj.contains_key("message") {
                Ok(Vec::new())
            } else {
                Err(LoadError::NotAnArray)
            }
        }
        _ => Err(LoadError::NotAnArray),
    }
}

/// Drop exact duplicates, then rows with any missing value, then build songs
pub fn build_catalog(rows: Vec<Row>) -> LoadReport {
    let total_rows = rows.len();

    let mut seen = HashSet::new();
    let unique: Vec<Row> = rows
        .into_iter()
        .filter(|row| seen.insert(Value::Object(row.clone()).to_string()))
        .collect();
    let duplicate_rows = total_rows - unique.len();

    // A column present in any row must be present in every kept row
    let columns: BTreeSet<&str> = unique
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut songs = Vec::with_capacity(unique.len());
    let mut incomplete_rows = 0;
    for row in &unique {
        let complete = columns
            .iter()
            .all(|col| row.get(*col).map_or(false, |v| !v.is_null()));
        match complete.then(|| song_from_row(row)).flatten() {
            Some(song) => songs.push(song),
            None => {
                incomplete_rows += 1;
                debug!("  SKIP: incomplete row {:?}", row.get(TITLE_COLUMN));
            }
        }
    }

    if incomplete_rows > 0 || duplicate_rows > 0 {
        info!(
            "Dropped {} duplicate and {} incomplete rows out of {}",
            duplicate_rows, incomplete_rows, total_rows
        );
    }
    info!("Catalog has {} songs", songs.len());

    LoadReport {
        catalog: Catalog::new(songs),
        total_rows,
        duplicate_rows,
        incomplete_rows,
    }
}

fn song_from_row(row: &Row) -> Option<SongRecord> {
    let title = value_to_text(row.get(TITLE_COLUMN)?)?;
    let artist = value_to_text(row.get(ARTIST_COLUMN)?)?;

    let mut features = [0.0; FEATURE_COUNT];
    for feature in Feature::ALL {
        features[feature.index()] = value_to_f64(row.get(feature.column())?)?;
    }

    Some(SongRecord {
        title,
        artist,
        features,
    })
}

fn value_to_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers, or strings holding a number (the SQL API returns those)
fn value_to_f64(v: &Value) -> Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

/// Load the catalog from a local JSON file
pub fn read_catalog<P: AsRef<Path>>(path: P) -> Result<LoadReport, LoadError> {
    let path = path.as_ref();
    info!("Reading dataset from {}", path.display());
    let bytes = std::fs::read(path)?;
    Ok(build_catalog(parse_dataset(&bytes)?))
}

/// Fetch the catalog from the data service
pub async fn fetch_catalog(client: &reqwest::Client, url: &str) -> Result<LoadReport, LoadError> {
    info!("Fetching dataset from {}", url);

    let response = client.get(url).send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        // Error bodies are JSON {"error": ...} when the service produced them
        if let Err(LoadError::Service(msg)) = parse_dataset(&bytes) {
            return Err(LoadError::Service(msg));
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();
        warn!("Dataset service returned {}", status);
        return Err(LoadError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(build_catalog(parse_dataset(&bytes)?))
}

/// Load the catalog from a table of a table source
pub async fn load_from_source(
    source: &dyn TableSource,
    table: &str,
) -> Result<LoadReport, SourceError> {
    info!("Loading catalog from {} table '{}'", source.name(), table);
    let rows = source.fetch_table(table).await?;
    Ok(build_catalog(rows))
}
