//! Snapshot types written to the tombstone file.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use plum_core::{CheckState, ResultHistory};
use serde::{Deserialize, Serialize};

/// Snapshots at least this old are refused on restore.
pub const MAX_TOMBSTONE_AGE: Duration = Duration::from_secs(10 * 60);

/// Mutable status of one check at capture time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckTombStone {
    pub last_run: Option<DateTime<Utc>>,
    pub settled: bool,
    pub state: CheckState,
    pub suspended: bool,
    pub history: ResultHistory,
    /// Opaque state returned by a stateful check's `save`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_state: Option<serde_json::Value>,
}

/// A full snapshot of every check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TombStone {
    pub time: DateTime<Utc>,
    pub checks: BTreeMap<String, CheckTombStone>,
}

impl TombStone {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time,
            checks: BTreeMap::new(),
        }
    }

    /// Whether the snapshot is too old to restore at `now`. A capture time
    /// in the future is never stale.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.time)
            .to_std()
            .is_ok_and(|age| age >= MAX_TOMBSTONE_AGE)
    }
}
