//! Threshold evaluation over a check's result history.

use plum_core::{CheckSettings, CheckState, ResultHistory};
use tracing::debug;

/// Consecutive-run lengths required before a state is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub good: u32,
    pub failing: u32,
}

impl Thresholds {
    pub fn new(good: u32, failing: u32) -> Self {
        Self { good, failing }
    }

    /// Threshold for a state. `Indeterminate` never has one.
    pub fn for_state(&self, state: CheckState) -> Option<u32> {
        match state {
            CheckState::Good => Some(self.good),
            CheckState::Failing => Some(self.failing),
            CheckState::Indeterminate => None,
        }
    }
}

impl From<&CheckSettings> for Thresholds {
    fn from(settings: &CheckSettings) -> Self {
        Self::new(settings.good_threshold, settings.failing_threshold)
    }
}

/// Compute the debounced state of a history.
///
/// Scans newest to oldest, counting the length of the current run of
/// identical states. The first run whose length reaches its state's
/// threshold decides the result; if none does, the state is
/// `Indeterminate`.
pub fn evaluate(history: &ResultHistory, thresholds: &Thresholds) -> CheckState {
    let mut last_state = CheckState::Indeterminate;
    let mut count = 0u32;

    for result in history.iter().flatten() {
        if result.state != last_state {
            last_state = result.state;
            count = 0;
        }
        count += 1;
        if thresholds.for_state(last_state) == Some(count) {
            return last_state;
        }
    }

    CheckState::Indeterminate
}

/// What happened to a check's stored state after a new evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed.
    Unchanged,
    /// The check established its first state; no alert is due.
    Settled(CheckState),
    /// A settled check moved between states; alerts are due.
    Changed { from: CheckState, to: CheckState },
}

/// Apply a freshly computed state to a check's stored `(settled, state)`.
///
/// An `Indeterminate` evaluation never overwrites a stored state.
pub fn observe(settled: &mut bool, state: &mut CheckState, computed: CheckState) -> Transition {
    if computed == CheckState::Indeterminate || computed == *state {
        return Transition::Unchanged;
    }

    let previous = *state;
    *state = computed;

    if *settled {
        debug!(%previous, %computed, "check state changed");
        Transition::Changed {
            from: previous,
            to: computed,
        }
    } else {
        *settled = true;
        debug!(%computed, "check settled");
        Transition::Settled(computed)
    }
}
