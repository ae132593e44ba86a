//! Capturing and restoring check status across restarts.

use chrono::{DateTime, Utc};
use plum_state::{CheckTombStone, TombStone, TombStoneStore};
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::scheduler::Scheduler;

impl Scheduler {
    /// Snapshot every check's status now.
    pub fn tombstone(&self) -> TombStone {
        self.tombstone_at(Utc::now())
    }

    pub fn tombstone_at(&self, now: DateTime<Utc>) -> TombStone {
        let mut tombstone = TombStone::new(now);
        for check in self.registered() {
            let plugin_state = check.check().as_stateful().and_then(|stateful| {
                stateful
                    .save()
                    .inspect_err(|e| warn!(check = %check.name, error = %e, "failed to save check state"))
                    .ok()
            });

            let status = check.status();
            tombstone.checks.insert(
                check.name.clone(),
                CheckTombStone {
                    last_run: status.last_run,
                    settled: status.settled,
                    state: status.state,
                    suspended: status.suspended,
                    history: status.history.clone(),
                    plugin_state,
                },
            );
        }
        tombstone
    }

    /// Apply a snapshot, returning how many checks were restored.
    pub fn restore(&self, tombstone: &TombStone) -> SchedulerResult<usize> {
        self.restore_at(tombstone, Utc::now())
    }

    /// Apply a snapshot as of `now`.
    ///
    /// A stale snapshot is rejected without touching any check. Otherwise
    /// each check present both here and in the snapshot takes the saved
    /// status; the rest keep theirs.
    pub fn restore_at(&self, tombstone: &TombStone, now: DateTime<Utc>) -> SchedulerResult<usize> {
        if tombstone.is_stale_at(now) {
            return Err(SchedulerError::TombStoneStale {
                captured: tombstone.time,
            });
        }

        let mut restored = 0;
        for check in self.registered() {
            let Some(saved) = tombstone.checks.get(&check.name) else {
                continue;
            };

            {
                let mut status = check.status();
                status.last_run = saved.last_run;
                status.settled = saved.settled;
                status.state = saved.state;
                status.suspended = saved.suspended;
                status.history = saved.history.clone();
            }

            if let (Some(state), Some(stateful)) = (&saved.plugin_state, check.check().as_stateful()) {
                if let Err(e) = stateful.restore(state.clone()) {
                    warn!(check = %check.name, error = %e, "failed to restore check state");
                }
            }

            debug!(check = %check.name, state = %saved.state, "check restored");
            restored += 1;
        }

        info!(restored, captured = %tombstone.time, "tombstone restored");
        Ok(restored)
    }

    /// Capture a snapshot and write it to `store`.
    pub fn save_tombstone(&self, store: &TombStoneStore) -> SchedulerResult<()> {
        store.save(&self.tombstone())?;
        Ok(())
    }

    /// Restore from `store`. Returns `Ok(0)` when nothing was saved.
    pub fn restore_tombstone(&self, store: &TombStoneStore) -> SchedulerResult<usize> {
        match store.load()? {
            Some(tombstone) => self.restore(&tombstone),
            None => Ok(0),
        }
    }
}
