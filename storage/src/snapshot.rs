use crate::graph::GraphStore;
use chrono::{DateTime, Utc};
use defectgraph_core::error::{DefectGraphError, ErrorCode};
use defectgraph_core::model::{Node, Relationship};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DefectGraphError for SnapshotError {
    fn error_code(&self) -> ErrorCode {
        match self {
            SnapshotError::Io(_) => ErrorCode::Unavailable,
            SnapshotError::Serialization(_) => ErrorCode::Internal,
        }
    }
}

/// On-disk layout of a whole-store snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
    /// Informational. Absent or unparseable timestamps load as `None`.
    #[serde(default, with = "saved_at")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: String,
}

/// `savedAt` is written as RFC 3339 and read as any ISO-8601 date-time,
/// with or without an offset. Offset-less values are taken as UTC.
mod saved_at {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::debug;

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.and_then(|raw| parse(&raw)))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Utc));
        }
        let parsed = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| Utc.from_utc_datetime(&naive));
        if parsed.is_none() {
            debug!("Ignoring unparseable savedAt {:?}", raw);
        }
        parsed
    }
}

impl GraphSnapshot {
    pub fn capture(store: &GraphStore) -> Self {
        Self {
            nodes: store.nodes().to_vec(),
            relationships: store.relationships().to_vec(),
            saved_at: Some(Utc::now()),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    pub fn into_store(self) -> GraphStore {
        GraphStore::from_parts(self.nodes, self.relationships)
    }
}

/// Serializes the store and replaces whatever is at `path`.
/// Writes to a sibling temp file first, then renames over the target.
pub async fn save_to_file(store: &GraphStore, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let snapshot = GraphSnapshot::capture(store);
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, &bytes).await?;
    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }

    info!(
        "Saved knowledge graph to {} ({} nodes, {} relationships)",
        path.display(),
        snapshot.nodes.len(),
        snapshot.relationships.len()
    );
    Ok(())
}

/// Reads a snapshot back. Every failure mode (missing file, unreadable
/// file, malformed JSON) yields `None` so the caller can rebuild instead.
pub async fn load_snapshot(path: impl AsRef<Path>) -> Option<GraphSnapshot> {
    let path = path.as_ref();
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("No cached graph at {}", path.display());
            return None;
        }
        Err(err) => {
            warn!("Error loading graph from {}: {}", path.display(), err);
            return None;
        }
    };

    match serde_json::from_slice::<GraphSnapshot>(&raw) {
        Ok(snapshot) => {
            info!(
                "Loaded knowledge graph from {} ({} nodes, {} relationships, saved {})",
                path.display(),
                snapshot.nodes.len(),
                snapshot.relationships.len(),
                snapshot
                    .saved_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "at an unknown time".to_string())
            );
            Some(snapshot)
        }
        Err(err) => {
            warn!("Error loading graph from {}: {}", path.display(), err);
            None
        }
    }
}

pub async fn load_from_file(path: impl AsRef<Path>) -> Option<GraphStore> {
    load_snapshot(path).await.map(GraphSnapshot::into_store)
}

/// Existence check only; the file is not opened or validated.
pub fn cache_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// Removes the snapshot. Returns whether a file was actually deleted.
pub async fn delete_cache(path: impl AsRef<Path>) -> Result<bool, SnapshotError> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => {
            info!("Deleted cached graph {}", path.as_ref().display());
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}
