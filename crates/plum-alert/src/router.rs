//! Wildcard matching of alert names.
//!
//! A check names the alerts it wants with patterns where `*` matches any
//! substring. All of a check's patterns compile into one anchored
//! alternation, so matching an alert name is a single regex test.

use std::sync::Arc;

use plum_core::Alert;
use plum_core::settings::NO_ALERTS;
use regex::Regex;

/// A compiled list of alert-name patterns.
#[derive(Debug, Clone)]
pub struct WildcardSet {
    regex: Option<Regex>,
}

impl WildcardSet {
    /// Compile patterns. The literal `-` contributes nothing, so a list
    /// made only of `-` matches no alert at all.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = patterns
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| *p != NO_ALERTS)
            .map(|p| regex::escape(p).replace(r"\*", ".*"))
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { regex: None });
        }

        let regex = Regex::new(&format!("^(?:{})$", alternatives.join("|")))?;
        Ok(Self { regex: Some(regex) })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(name))
    }

    /// True when no alert name can ever match.
    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }
}

/// An alert instance and the name it was configured under.
#[derive(Clone)]
pub struct NamedAlert {
    pub name: String,
    pub alert: Arc<dyn Alert>,
}

/// Registered alerts in configuration order.
#[derive(Clone, Default)]
pub struct AlertRouter {
    alerts: Vec<NamedAlert>,
}

impl AlertRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, alert: Arc<dyn Alert>) {
        self.alerts.push(NamedAlert {
            name: name.into(),
            alert,
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.alerts.iter().any(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Alerts whose names match the set, in registration order.
    pub fn matching<'a>(&'a self, set: &'a WildcardSet) -> impl Iterator<Item = &'a NamedAlert> + 'a {
        self.alerts.iter().filter(move |a| set.is_match(&a.name))
    }

    /// Whether a single pattern matches at least one registered alert.
    pub fn resolves(&self, pattern: &str) -> Result<bool, regex::Error> {
        let set = WildcardSet::new(&[pattern])?;
        Ok(self.matching(&set).next().is_some())
    }
}
