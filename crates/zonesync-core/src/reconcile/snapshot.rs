// # Zone Snapshot
//
// A JSON copy of a domain's live records, taken right after the live fetch.
// Written before the first mutation of a run so a prune or replace can be
// undone by feeding the records back as desired state.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "domain": "example.com",
//   "taken_at": "2025-01-09T12:00:00Z",
//   "records": [
//     {"name": "www", "type": "A", "data": "1.2.3.4", "ttl": 600}
//   ]
// }
// ```
//
// Writes go to a temporary sibling file that is then renamed over the
// target, so a crash never leaves a half-written snapshot behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::record::{Record, RecordSet, RecordType};

/// Snapshot file format version
const SNAPSHOT_VERSION: &str = "1.0";

/// Live records of one domain at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    /// File format version
    pub version: String,
    /// Domain the records belong to
    pub domain: String,
    /// When the records were fetched
    pub taken_at: DateTime<Utc>,
    /// Records in provider order
    pub records: Vec<Record>,
}

impl ZoneSnapshot {
    /// Snapshot `records` of `domain` as of now
    pub fn new(domain: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            domain: domain.into(),
            taken_at: Utc::now(),
            records,
        }
    }

    /// Records of the supported types, grouped by key
    ///
    /// Suitable as the desired state of a restoring run.
    pub fn to_record_set(&self) -> RecordSet {
        RecordSet::from_records(
            self.records
                .iter()
                .filter(|r| !matches!(r.record_type, RecordType::Other(_)))
                .cloned(),
        )
    }

    /// Write the snapshot to `path` atomically
    pub async fn write(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to create snapshot directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let temp_path = temp_path(path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.flush().await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, path).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::debug!(
            "Wrote snapshot of {} ({} record(s)) to {}",
            self.domain,
            self.records.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a snapshot written by [`ZoneSnapshot::write`]
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::snapshot(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;
        let snapshot: Self = serde_json::from_str(&content).map_err(|e| {
            Error::snapshot(format!("Failed to parse snapshot {}: {}", path.display(), e))
        })?;
        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                "Snapshot version mismatch: expected {}, got {}. Loading anyway.",
                SNAPSHOT_VERSION,
                snapshot.version
            );
        }
        Ok(snapshot)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
