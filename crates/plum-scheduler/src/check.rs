//! Scheduled checks and their mutable status.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use plum_alert::{AlertTarget, WildcardSet};
use plum_core::{Check, CheckResult, CheckSettings, CheckState, ResultHistory};
use plum_health::Thresholds;
use serde::Serialize;

/// Mutable per-check status, guarded by the check's mutex.
#[derive(Debug, Clone, Default)]
pub struct CheckStatus {
    /// Start time of the most recent execution.
    pub last_run: Option<DateTime<Utc>>,
    /// Queued or running; a scheduled check is never queued again.
    pub scheduled: bool,
    /// An initial state has been established.
    pub settled: bool,
    pub state: CheckState,
    pub suspended: bool,
    pub history: ResultHistory,
}

/// A configured check and everything the scheduler tracks about it.
pub struct ScheduledCheck {
    pub name: String,
    /// `plugin.kind` type string.
    pub kind: String,
    pub config: CheckSettings,
    check: Arc<dyn Check>,
    matcher: WildcardSet,
    status: Mutex<CheckStatus>,
}

impl ScheduledCheck {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        config: CheckSettings,
        check: Arc<dyn Check>,
    ) -> Result<Self, regex::Error> {
        let matcher = WildcardSet::new(config.alerts.as_slice())?;
        Ok(Self {
            name: name.into(),
            kind: kind.into(),
            config,
            check,
            matcher,
            status: Mutex::new(CheckStatus::default()),
        })
    }

    pub fn check(&self) -> &Arc<dyn Check> {
        &self.check
    }

    /// Lock the status. Never hold the guard across an await.
    pub fn status(&self) -> MutexGuard<'_, CheckStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::from(&self.config)
    }

    /// The timeout an execution runs under.
    pub fn effective_timeout(&self) -> Duration {
        self.check.timeout().unwrap_or(self.config.timeout)
    }

    pub fn alert_target(&self) -> AlertTarget<'_> {
        AlertTarget {
            name: &self.name,
            kind: &self.kind,
            groups: &self.config.groups,
            matcher: &self.matcher,
        }
    }

    /// Time left before the check is due at `now`; zero when due.
    ///
    /// A check that never ran is due immediately. A `last_run` in the
    /// future counts as having just run.
    pub fn until_due(status: &CheckStatus, interval: Duration, now: DateTime<Utc>) -> Duration {
        let Some(last_run) = status.last_run else {
            return Duration::ZERO;
        };
        let elapsed = now
            .signed_duration_since(last_run)
            .to_std()
            .unwrap_or(Duration::ZERO);
        interval.saturating_sub(elapsed)
    }

    pub fn info(&self) -> CheckInfo {
        let status = self.status();
        CheckInfo {
            name: self.name.clone(),
            kind: self.kind.clone(),
            last_run: status.last_run,
            settled: status.settled,
            state: status.state,
            suspended: status.suspended,
            last_result: status.history.latest().cloned(),
        }
    }

    /// Set the suspended flag, returning whether it changed.
    pub(crate) fn set_suspended(&self, suspended: bool) -> bool {
        let mut status = self.status();
        let changed = status.suspended != suspended;
        status.suspended = suspended;
        changed
    }
}

impl std::fmt::Debug for ScheduledCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledCheck")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Public view of a check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub last_run: Option<DateTime<Utc>>,
    pub settled: bool,
    pub state: CheckState,
    pub suspended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<CheckResult>,
}

/// Result of a suspend or unsuspend request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuspendOutcome {
    pub check: CheckInfo,
    /// False when the check was already in the requested state.
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use plum_core::{BoxFuture, CheckContext};

    struct Noop;

    impl Check for Noop {
        fn execute<'a>(&'a self, _ctx: &'a CheckContext) -> BoxFuture<'a, CheckResult> {
            Box::pin(async { CheckResult::good() })
        }
    }

    struct Slow;

    impl Check for Slow {
        fn execute<'a>(&'a self, _ctx: &'a CheckContext) -> BoxFuture<'a, CheckResult> {
            Box::pin(async { CheckResult::good() })
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_secs(300))
        }
    }

    fn scheduled(check: Arc<dyn Check>) -> ScheduledCheck {
        ScheduledCheck::new("web", "debug.random", CheckSettings::default(), check).unwrap()
    }

    #[test]
    fn never_run_is_due() {
        let status = CheckStatus::default();
        assert_eq!(
            ScheduledCheck::until_due(&status, Duration::from_secs(30), Utc::now()),
            Duration::ZERO
        );
    }

    #[test]
    fn remaining_counts_down_from_last_run() {
        let now = Utc::now();
        let status = CheckStatus {
            last_run: Some(now - TimeDelta::seconds(10)),
            ..CheckStatus::default()
        };
        let interval = Duration::from_secs(30);
        assert_eq!(ScheduledCheck::until_due(&status, interval, now), Duration::from_secs(20));
        assert_eq!(
            ScheduledCheck::until_due(&status, interval, now + TimeDelta::seconds(25)),
            Duration::ZERO
        );
        assert_eq!(
            ScheduledCheck::until_due(&status, interval, now - TimeDelta::seconds(60)),
            interval
        );
    }

    #[test]
    fn check_timeout_overrides_configured_one() {
        assert_eq!(scheduled(Arc::new(Noop)).effective_timeout(), Duration::from_secs(20));
        assert_eq!(scheduled(Arc::new(Slow)).effective_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn suspend_reports_change() {
        let check = scheduled(Arc::new(Noop));
        assert!(check.set_suspended(true));
        assert!(!check.set_suspended(true));
        assert!(check.info().suspended);
        assert!(check.set_suspended(false));
    }

    #[test]
    fn info_serializes_type_and_latest_result() {
        let check = scheduled(Arc::new(Noop));
        check.status().history.push(CheckResult::failing("down"));
        let value = serde_json::to_value(check.info()).unwrap();
        assert_eq!(value["type"], "debug.random");
        assert_eq!(value["state"], "indeterminate");
        assert_eq!(value["last_result"]["detail"], "down");
    }
}
