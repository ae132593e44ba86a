//! TombStoneStore — redb-backed snapshot persistence.
//!
//! The store holds at most one snapshot. Saving replaces the previous one
//! wholesale inside a single write transaction; loading returns `None`
//! until the first save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, DatabaseError, ReadableDatabase, ReadableTable};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Durable home of the tombstone.
#[derive(Clone)]
pub struct TombStoneStore {
    db: Arc<Database>,
}

impl TombStoneStore {
    /// Open (or create) the tombstone file at `path`.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "tombstone store opened");
        Ok(store)
    }

    /// Open the tombstone at `path`, moving an unreadable file aside to
    /// `<name>.corrupt` and starting a fresh store in its place.
    ///
    /// A file held open by another process is still an error.
    pub fn open_or_reset(path: &Path) -> StateResult<Self> {
        match Database::create(path) {
            Ok(db) => {
                let store = Self { db: Arc::new(db) };
                store.ensure_tables()?;
                debug!(?path, "tombstone store opened");
                Ok(store)
            }
            Err(e @ DatabaseError::DatabaseAlreadyOpen) => Err(StateError::Open(e.to_string())),
            Err(e) if path.exists() => {
                let aside = corrupt_path(path);
                warn!(?path, moved_to = ?aside, error = %e, "unreadable tombstone moved aside");
                if let Err(rename) = std::fs::rename(path, &aside) {
                    warn!(?path, error = %rename, "could not move tombstone, removing it");
                    std::fs::remove_file(path).map_err(map_err!(Open))?;
                }
                Self::open(path)
            }
            Err(e) => Err(StateError::Open(e.to_string())),
        }
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(TOMBSTONE).map_err(map_err!(Table))?;
        txn.open_table(TOMBSTONE_CHECKS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Replace the stored snapshot with `tombstone`.
    pub fn save(&self, tombstone: &TombStone) -> StateResult<()> {
        let captured = serde_json::to_vec(&tombstone.time).map_err(map_err!(Serialize))?;
        let mut rows = Vec::with_capacity(tombstone.checks.len());
        for (name, check) in &tombstone.checks {
            let value = serde_json::to_vec(check).map_err(map_err!(Serialize))?;
            rows.push((name.as_str(), value));
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut checks = txn.open_table(TOMBSTONE_CHECKS).map_err(map_err!(Table))?;
            let stale: Vec<String> = checks
                .iter()
                .map_err(map_err!(Read))?
                .filter_map(|entry| {
                    let (key, _) = entry.ok()?;
                    Some(key.value().to_string())
                })
                .collect();
            for key in &stale {
                checks.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            for (name, value) in &rows {
                checks
                    .insert(*name, value.as_slice())
                    .map_err(map_err!(Write))?;
            }

            let mut meta = txn.open_table(TOMBSTONE).map_err(map_err!(Table))?;
            meta.insert(CAPTURED_KEY, captured.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(checks = rows.len(), time = %tombstone.time, "tombstone saved");
        Ok(())
    }

    /// Read the stored snapshot, if one has been saved.
    pub fn load(&self) -> StateResult<Option<TombStone>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;

        let meta = txn.open_table(TOMBSTONE).map_err(map_err!(Table))?;
        let time: DateTime<Utc> = match meta.get(CAPTURED_KEY).map_err(map_err!(Read))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
            None => return Ok(None),
        };

        let table = txn.open_table(TOMBSTONE_CHECKS).map_err(map_err!(Table))?;
        let mut checks = BTreeMap::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let check: CheckTombStone =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            checks.insert(key.value().to_string(), check);
        }

        debug!(checks = checks.len(), %time, "tombstone loaded");
        Ok(Some(TombStone { time, checks }))
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".corrupt");
    path.with_file_name(name)
}
