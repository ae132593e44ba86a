//! Check settings and cascading defaults.
//!
//! Settings arrive as [`SettingsFragment`]s from three places: the global
//! `[defaults]` table, each group's `defaults`, and the check block itself.
//! [`resolve`] layers them global < groups (declared order) < check, where a
//! field set to a zero or empty value counts as unset, then fills whatever is
//! still missing from the built-in fallbacks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration;

/// Literal alert pattern meaning "send no alerts".
pub const NO_ALERTS: &str = "-";

/// Keys in a check block that belong to [`SettingsFragment`] rather than
/// to the check's plugin.
pub const SETTINGS_KEYS: &[&str] = &[
    "alerts",
    "groups",
    "interval",
    "timeout",
    "good_threshold",
    "failing_threshold",
];

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_GOOD_THRESHOLD: u32 = 2;
pub const DEFAULT_FAILING_THRESHOLD: u32 = 2;

/// Fully resolved settings attached to a scheduled check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSettings {
    pub alerts: Vec<String>,
    pub groups: Vec<String>,
    #[serde(with = "duration")]
    pub interval: Duration,
    #[serde(with = "duration")]
    pub timeout: Duration,
    pub good_threshold: u32,
    pub failing_threshold: u32,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            alerts: vec!["*".to_string()],
            groups: Vec::new(),
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            good_threshold: DEFAULT_GOOD_THRESHOLD,
            failing_threshold: DEFAULT_FAILING_THRESHOLD,
        }
    }
}

/// A partially specified set of check settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFragment {
    #[serde(default)]
    pub alerts: Option<Vec<String>>,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default, with = "duration::option")]
    pub interval: Option<Duration>,
    #[serde(default, with = "duration::option")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub good_threshold: Option<u32>,
    #[serde(default)]
    pub failing_threshold: Option<u32>,
}

impl SettingsFragment {
    /// Decode a fragment from a settings table, treating zero values as unset.
    pub fn from_table(table: toml::Table) -> Result<Self, toml::de::Error> {
        let fragment: SettingsFragment = toml::Value::Table(table).try_into()?;
        Ok(fragment.normalized())
    }

    /// Drop zero and empty values so they never override a lower layer.
    pub fn normalized(self) -> Self {
        Self {
            alerts: self.alerts.filter(|a| !a.is_empty()),
            groups: self.groups.filter(|g| !g.is_empty()),
            interval: self.interval.filter(|d| !d.is_zero()),
            timeout: self.timeout.filter(|d| !d.is_zero()),
            good_threshold: self.good_threshold.filter(|&t| t > 0),
            failing_threshold: self.failing_threshold.filter(|&t| t > 0),
        }
    }

    /// Overlay `other` on top of `self`: every field `other` sets wins.
    pub fn overlay(&mut self, other: &SettingsFragment) {
        let other = other.clone().normalized();
        if other.alerts.is_some() {
            self.alerts = other.alerts;
        }
        if other.groups.is_some() {
            self.groups = other.groups;
        }
        if other.interval.is_some() {
            self.interval = other.interval;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.good_threshold.is_some() {
            self.good_threshold = other.good_threshold;
        }
        if other.failing_threshold.is_some() {
            self.failing_threshold = other.failing_threshold;
        }
    }

    /// Fill unset fields from the built-in defaults.
    pub fn finish(self) -> CheckSettings {
        let fallback = CheckSettings::default();
        let this = self.normalized();
        CheckSettings {
            alerts: this.alerts.unwrap_or(fallback.alerts),
            groups: this.groups.unwrap_or(fallback.groups),
            interval: this.interval.unwrap_or(fallback.interval),
            timeout: this.timeout.unwrap_or(fallback.timeout),
            good_threshold: this.good_threshold.unwrap_or(fallback.good_threshold),
            failing_threshold: this.failing_threshold.unwrap_or(fallback.failing_threshold),
        }
    }
}

/// Merge global, group, and check settings into one effective record.
///
/// `groups` are applied in iteration order, so later groups override
/// earlier ones. The result is an independent copy; nothing is shared
/// with the inputs.
pub fn resolve<'a>(
    global: &SettingsFragment,
    groups: impl IntoIterator<Item = &'a SettingsFragment>,
    check: &SettingsFragment,
) -> CheckSettings {
    let mut merged = global.clone().normalized();
    for group in groups {
        merged.overlay(group);
    }
    merged.overlay(check);
    merged.finish()
}
