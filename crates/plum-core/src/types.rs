//! Core domain types: check states, results, and result history.
//!
//! A [`CheckResult`] is immutable once produced. The scheduler pushes each
//! one into the owning check's [`ResultHistory`], a fixed ring that keeps the
//! ten most recent results and iterates newest first.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of results retained per check.
pub const HISTORY_SIZE: usize = 10;

/// Fact recording how long a check took to respond, in milliseconds.
pub const FACT_RESPONSE_TIME: &str = "response_time";

/// Fact recording the total execution time of a check, in milliseconds.
pub const FACT_CHECK_TIME: &str = "check_time";

/// Open map of named measurements attached to a result.
pub type Facts = BTreeMap<String, serde_json::Value>;

// ── State ─────────────────────────────────────────────────────────

/// Health of a service, either raw (per result) or debounced (per check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// Not enough information to say either way.
    #[default]
    Indeterminate,
    Good,
    Failing,
}

impl CheckState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Indeterminate => "indeterminate",
            CheckState::Good => "good",
            CheckState::Failing => "failing",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Result ────────────────────────────────────────────────────────

/// Outcome of a single check execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub state: CheckState,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facts: Facts,
}

impl CheckResult {
    /// A result with the given state and detail, timestamped now.
    pub fn new(state: CheckState, detail: impl Into<String>) -> Self {
        Self {
            state,
            time: Utc::now(),
            detail: detail.into(),
            facts: Facts::new(),
        }
    }

    pub fn good() -> Self {
        Self::new(CheckState::Good, "")
    }

    pub fn failing(detail: impl Into<String>) -> Self {
        Self::new(CheckState::Failing, detail)
    }

    pub fn indeterminate(detail: impl Into<String>) -> Self {
        Self::new(CheckState::Indeterminate, detail)
    }

    /// Attach a fact, replacing any previous value with the same name.
    pub fn with_fact(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.facts.insert(name.to_string(), value.into());
        self
    }
}

// ── History ───────────────────────────────────────────────────────

/// Fixed-capacity ring of the most recent results, newest first.
///
/// `head` is the slot holding the newest result; each push steps it back
/// one slot (mod [`HISTORY_SIZE`]) and overwrites whatever was there, which
/// is always the oldest entry. Serialized as a newest-first list of
/// [`HISTORY_SIZE`] optional results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Option<CheckResult>>", into = "Vec<Option<CheckResult>>")]
pub struct ResultHistory {
    slots: [Option<CheckResult>; HISTORY_SIZE],
    head: usize,
}

impl ResultHistory {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            head: 0,
        }
    }

    /// Insert a result as the newest entry, evicting the oldest.
    pub fn push(&mut self, result: CheckResult) {
        self.head = (self.head + HISTORY_SIZE - 1) % HISTORY_SIZE;
        self.slots[self.head] = Some(result);
    }

    /// The result `age` steps back from the newest (0 = newest).
    pub fn get(&self, age: usize) -> Option<&CheckResult> {
        if age >= HISTORY_SIZE {
            return None;
        }
        self.slots[(self.head + age) % HISTORY_SIZE].as_ref()
    }

    /// The most recent result, if any.
    pub fn latest(&self) -> Option<&CheckResult> {
        self.get(0)
    }

    /// Iterate all slots newest first; unfilled slots yield `None`.
    pub fn iter(&self) -> impl Iterator<Item = Option<&CheckResult>> + '_ {
        (0..HISTORY_SIZE).map(move |age| self.get(age))
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResultHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ResultHistory {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl From<Vec<Option<CheckResult>>> for ResultHistory {
    fn from(entries: Vec<Option<CheckResult>>) -> Self {
        let mut history = ResultHistory::new();
        for (slot, entry) in history.slots.iter_mut().zip(entries) {
            *slot = entry;
        }
        history
    }
}

impl From<ResultHistory> for Vec<Option<CheckResult>> {
    fn from(history: ResultHistory) -> Self {
        history.iter().map(|r| r.cloned()).collect()
    }
}

impl FromIterator<CheckResult> for ResultHistory {
    /// Build a history by pushing results oldest first.
    fn from_iter<I: IntoIterator<Item = CheckResult>>(iter: I) -> Self {
        let mut history = ResultHistory::new();
        for result in iter {
            history.push(result);
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(detail: &str) -> CheckResult {
        CheckResult::failing(detail)
    }

    #[test]
    fn state_display_is_lowercase() {
        assert_eq!(CheckState::Good.to_string(), "good");
        assert_eq!(CheckState::Failing.to_string(), "failing");
        assert_eq!(CheckState::Indeterminate.to_string(), "indeterminate");
    }

    #[test]
    fn empty_history_has_no_entries() {
        let history = ResultHistory::new();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
        assert!(history.iter().all(|r| r.is_none()));
    }

    #[test]
    fn push_places_newest_first() {
        let mut history = ResultHistory::new();
        history.push(result("first"));
        history.push(result("second"));
        history.push(result("third"));

        assert_eq!(history.len(), 3);
        assert_eq!(history.get(0).unwrap().detail, "third");
        assert_eq!(history.get(1).unwrap().detail, "second");
        assert_eq!(history.get(2).unwrap().detail, "first");
        assert!(history.get(3).is_none());
    }

    #[test]
    fn push_evicts_oldest_when_full() {
        let mut history = ResultHistory::new();
        for i in 0..HISTORY_SIZE + 3 {
            history.push(result(&format!("r{i}")));
        }

        assert_eq!(history.len(), HISTORY_SIZE);
        assert_eq!(history.latest().unwrap().detail, "r12");
        assert_eq!(history.get(HISTORY_SIZE - 1).unwrap().detail, "r3");
        assert!(history.get(HISTORY_SIZE).is_none());
    }

    #[test]
    fn equality_ignores_ring_offset() {
        let mut a = ResultHistory::new();
        let r = result("x");
        a.push(r.clone());

        let b = ResultHistory::from(vec![Some(r)]);
        assert_eq!(a, b);
    }

    #[test]
    fn history_serializes_newest_first() {
        let history: ResultHistory = [result("old"), result("new")].into_iter().collect();
        let json = serde_json::to_value(&history).unwrap();
        let entries = json.as_array().unwrap();

        assert_eq!(entries.len(), HISTORY_SIZE);
        assert_eq!(entries[0]["detail"], "new");
        assert_eq!(entries[1]["detail"], "old");
        assert!(entries[2].is_null());

        let back: ResultHistory = serde_json::from_value(json).unwrap();
        assert_eq!(back, history);
    }

    #[test]
    fn facts_are_attached() {
        let r = CheckResult::good().with_fact(FACT_CHECK_TIME, 12);
        assert_eq!(r.facts[FACT_CHECK_TIME], serde_json::json!(12));
        assert_eq!(r.state, CheckState::Good);
        assert!(r.detail.is_empty());
    }
}
