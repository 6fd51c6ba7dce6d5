//! `MetricsStore` — periodic, on-disk snapshots of aggregate tracker state,
//! per spec.md §4.7.
//!
//! `StoreFormat::Json` keeps one JSON array re-encoded on every append (easy
//! to read back with a plain `serde_json::from_str`); `StoreFormat::Ndjson`
//! appends one line per snapshot instead, cheaper to write but requiring a
//! line-oriented reader. Both cap total size: `Json` drops the oldest
//! snapshots to fit, `Ndjson` rejects an individual record that alone
//! exceeds `max_bytes`.

use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Json,
    Ndjson,
}

/// A point-in-time snapshot of tracker occupancy, analogous to the
/// teacher's `CacheMetricsSnapshot` but covering the whole analytics core
/// rather than a single template cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub timestamp: f64,
    pub tracked_flows: u64,
    pub tracked_bursts: u64,
    pub classifier_cache_entries: u64,
    pub ring_buffer_len: u64,
}

pub struct MetricsStore {
    path: PathBuf,
    format: StoreFormat,
    max_snapshots: usize,
    max_bytes: u64,
}

impl MetricsStore {
    pub fn new(path: PathBuf, format: StoreFormat, max_snapshots: usize, max_bytes: u64) -> Self {
        Self {
            path,
            format,
            max_snapshots: max_snapshots.max(1),
            max_bytes: max_bytes.max(1),
        }
    }

    pub fn append(&self, snapshot: &MetricsSnapshot) -> Result<(), PersistenceError> {
        match self.format {
            StoreFormat::Ndjson => self.append_ndjson(snapshot),
            StoreFormat::Json => self.append_json(snapshot),
        }
    }

    fn append_ndjson(&self, snapshot: &MetricsSnapshot) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_string(snapshot)?;
        if line.len() as u64 + 1 > self.max_bytes {
            return Err(PersistenceError::RecordTooLarge {
                record_bytes: line.len() + 1,
                max_bytes: self.max_bytes as usize,
            });
        }
        line.push('\n');
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn append_json(&self, snapshot: &MetricsSnapshot) -> Result<(), PersistenceError> {
        let mut snapshots = self.load();
        snapshots.push(*snapshot);
        while snapshots.len() > self.max_snapshots {
            snapshots.remove(0);
        }
        loop {
            let json = serde_json::to_string(&snapshots)?;
            if (json.len() as u64) <= self.max_bytes || snapshots.len() <= 1 {
                fs::write(&self.path, json)?;
                return Ok(());
            }
            snapshots.remove(0);
        }
    }

    /// Reads every persisted snapshot back. A corrupt or missing file yields
    /// an empty list rather than an error — the store always starts clean
    /// rather than blocking the core on a damaged history file.
    pub fn load(&self) -> Vec<MetricsSnapshot> {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match self.format {
            StoreFormat::Json => serde_json::from_str(&text).unwrap_or_default(),
            StoreFormat::Ndjson => text
                .lines()
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn snapshot(timestamp: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp,
            tracked_flows: 1,
            tracked_bursts: 1,
            classifier_cache_entries: 1,
            ring_buffer_len: 1,
        }
    }

    #[test]
    fn json_store_round_trips_multiple_appends() {
        let file = NamedTempFile::new().unwrap();
        let store = MetricsStore::new(file.path().to_path_buf(), StoreFormat::Json, 10, 1_000_000);
        store.append(&snapshot(1.0)).unwrap();
        store.append(&snapshot(2.0)).unwrap();
        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].timestamp, 2.0);
    }

    #[test]
    fn json_store_drops_oldest_past_max_snapshots() {
        let file = NamedTempFile::new().unwrap();
        let store = MetricsStore::new(file.path().to_path_buf(), StoreFormat::Json, 2, 1_000_000);
        for i in 0..5 {
            store.append(&snapshot(i as f64)).unwrap();
        }
        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].timestamp, 3.0);
        assert_eq!(loaded[1].timestamp, 4.0);
    }

    #[test]
    fn ndjson_store_appends_one_line_per_snapshot() {
        let file = NamedTempFile::new().unwrap();
        let store = MetricsStore::new(file.path().to_path_buf(), StoreFormat::Ndjson, 10, 1_000_000);
        store.append(&snapshot(1.0)).unwrap();
        store.append(&snapshot(2.0)).unwrap();
        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn ndjson_rejects_record_larger_than_max_bytes() {
        let file = NamedTempFile::new().unwrap();
        let store = MetricsStore::new(file.path().to_path_buf(), StoreFormat::Ndjson, 10, 8);
        let err = store.append(&snapshot(1.0)).unwrap_err();
        assert!(matches!(err, PersistenceError::RecordTooLarge { .. }));
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "{ not json").unwrap();
        let store = MetricsStore::new(file.path().to_path_buf(), StoreFormat::Json, 10, 1_000_000);
        assert!(store.load().is_empty());
    }
}
