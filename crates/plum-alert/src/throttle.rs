//! Per-group alert throttling.
//!
//! A group with an `alert_limit` allows at most that many alerts inside
//! any sliding `alert_window`. Emission instants are kept per group behind
//! the group's own mutex; workers evaluating different checks that share a
//! group serialize on it.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use plum_core::SettingsFragment;
use plum_core::duration;
use serde::Deserialize;
use tracing::debug;

/// Window applied when a limit is configured without one.
pub const DEFAULT_ALERT_WINDOW: Duration = Duration::from_secs(60);

/// Settings accepted in a `[[group]]` block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSettings {
    #[serde(default)]
    pub alert_limit: u32,
    #[serde(default, with = "duration::option")]
    pub alert_window: Option<Duration>,
    #[serde(default)]
    pub defaults: Option<toml::Table>,
}

/// A named collection of checks sharing an alert budget and defaults.
#[derive(Debug)]
pub struct Group {
    pub name: String,
    /// Maximum alerts per window; 0 means unlimited.
    pub alert_limit: u32,
    pub alert_window: Duration,
    /// Settings applied to member checks before their own overrides.
    pub defaults: SettingsFragment,
    alert_history: Mutex<VecDeque<Instant>>,
}

impl Group {
    pub fn new(name: impl Into<String>, alert_limit: u32, alert_window: Duration) -> Self {
        Self {
            name: name.into(),
            alert_limit,
            alert_window,
            defaults: SettingsFragment::default(),
            alert_history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_defaults(mut self, defaults: SettingsFragment) -> Self {
        self.defaults = defaults;
        self
    }

    /// Build a group from its decoded block settings.
    pub fn from_settings(name: &str, settings: GroupSettings) -> Result<Self, toml::de::Error> {
        let defaults = match settings.defaults {
            Some(table) => SettingsFragment::from_table(table)?,
            None => SettingsFragment::default(),
        };
        let window = settings
            .alert_window
            .filter(|w| !w.is_zero())
            .unwrap_or(DEFAULT_ALERT_WINDOW);
        Ok(Self::new(name, settings.alert_limit, window).with_defaults(defaults))
    }

    /// Ask to emit an alert now. Returns `(can_send, is_last)`.
    pub fn can_send_alert(&self) -> (bool, bool) {
        self.can_send_alert_at(Instant::now())
    }

    /// Ask to emit an alert at `now`.
    ///
    /// `is_last` is true for the emission that fills the window, so callers
    /// can warn that further alerts will be held back until it slides.
    pub fn can_send_alert_at(&self, now: Instant) -> (bool, bool) {
        if self.alert_limit == 0 {
            return (true, false);
        }

        let limit = self.alert_limit as usize;
        let mut history = self.alert_history.lock().expect("alert history lock");

        if let Some(cutoff) = now.checked_sub(self.alert_window) {
            while history.front().is_some_and(|&t| t < cutoff) {
                history.pop_front();
            }
        }

        if history.len() >= limit {
            debug!(group = %self.name, limit, "group alert limit reached");
            return (false, false);
        }

        history.push_back(now);
        (true, history.len() == limit)
    }

    /// Alerts recorded inside the current window (as of the last call).
    pub fn recorded_alerts(&self) -> usize {
        self.alert_history.lock().expect("alert history lock").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn group(limit: u32) -> Group {
        Group::new("test", limit, Duration::from_secs(60))
    }

    #[test]
    fn no_limit_always_sends() {
        let g = group(0);
        for _ in 0..100 {
            assert_eq!(g.can_send_alert(), (true, false));
        }
        assert_eq!(g.recorded_alerts(), 0);
    }

    #[test]
    fn single_alert_limit() {
        let g = group(1);
        assert_eq!(g.can_send_alert(), (true, true));
        assert_eq!(g.can_send_alert(), (false, false));
    }

    #[test]
    fn multiple_alert_limit() {
        let g = group(3);
        let now = Instant::now();
        assert_eq!(g.can_send_alert_at(now), (true, false));
        assert_eq!(g.can_send_alert_at(now + Duration::from_secs(1)), (true, false));
        assert_eq!(g.can_send_alert_at(now + Duration::from_secs(2)), (true, true));
        assert_eq!(g.can_send_alert_at(now + Duration::from_secs(3)), (false, false));
    }

    #[test]
    fn window_slides_past_earliest_alert() {
        let g = group(2);
        let start = Instant::now();
        assert_eq!(g.can_send_alert_at(start), (true, false));
        assert_eq!(g.can_send_alert_at(start + Duration::from_secs(30)), (true, true));
        assert_eq!(g.can_send_alert_at(start + Duration::from_secs(59)), (false, false));

        // The first emission has left the window; the second has not.
        assert_eq!(g.can_send_alert_at(start + Duration::from_secs(61)), (true, true));
        assert_eq!(g.recorded_alerts(), 2);

        // Both later emissions expire.
        assert_eq!(g.can_send_alert_at(start + Duration::from_secs(200)), (true, false));
        assert_eq!(g.recorded_alerts(), 1);
    }

    #[test]
    fn refusals_are_not_recorded() {
        let g = group(1);
        let start = Instant::now();
        g.can_send_alert_at(start);
        for i in 1..10 {
            assert_eq!(g.can_send_alert_at(start + Duration::from_secs(i)), (false, false));
        }
        assert_eq!(g.recorded_alerts(), 1);
        assert!(g.can_send_alert_at(start + Duration::from_secs(61)).0);
    }

    #[test]
    fn concurrent_callers_share_the_budget() {
        let g = Arc::new(group(5));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = Arc::clone(&g);
                std::thread::spawn(move || (0..10).filter(|_| g.can_send_alert().0).count())
            })
            .collect();

        let sent: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(sent, 5);
    }

    #[test]
    fn settings_fill_default_window_and_defaults() {
        let settings: GroupSettings = toml::from_str(
            r#"
alert_limit = 3
[defaults]
interval = "10s"
"#,
        )
        .unwrap();
        let g = Group::from_settings("web", settings).unwrap();
        assert_eq!(g.alert_limit, 3);
        assert_eq!(g.alert_window, DEFAULT_ALERT_WINDOW);
        assert_eq!(g.defaults.interval, Some(Duration::from_secs(10)));
    }

    #[test]
    fn settings_reject_unknown_keys() {
        assert!(toml::from_str::<GroupSettings>("alert_limt = 3").is_err());

        let settings: GroupSettings = toml::from_str("[defaults]\nbogus = 1").unwrap();
        assert!(Group::from_settings("web", settings).is_err());
    }
}
