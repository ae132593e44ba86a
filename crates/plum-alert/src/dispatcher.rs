//! Raising alerts for a check state transition.

use std::collections::HashMap;
use std::sync::Arc;

use plum_core::{AlertDetails, CheckResult, CheckState};
use tracing::{debug, info, warn};

use crate::error::AlertError;
use crate::router::{AlertRouter, WildcardSet};
use crate::throttle::Group;

/// Render the human-readable alert message.
pub fn render_text(name: &str, new_state: CheckState, detail: &str, previous: CheckState) -> String {
    if detail.is_empty() {
        format!("Check '{name}' is now {new_state}, was {previous}.")
    } else {
        format!("Check '{name}' is now {new_state} ({detail}), was {previous}.")
    }
}

/// The check an alert is raised for.
#[derive(Debug, Clone, Copy)]
pub struct AlertTarget<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub groups: &'a [String],
    pub matcher: &'a WildcardSet,
}

/// What happened when an alert was raised.
#[derive(Debug)]
pub enum RaiseOutcome {
    /// A group refused; nothing was sent.
    Suppressed { group: String },
    /// Sent to `attempted` alerts, of which `failed` reported errors.
    Sent {
        attempted: usize,
        failed: Vec<AlertError>,
    },
}

/// Alerts plus the groups that throttle them.
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    router: AlertRouter,
    groups: HashMap<String, Arc<Group>>,
}

impl AlertDispatcher {
    pub fn new(router: AlertRouter, groups: HashMap<String, Arc<Group>>) -> Self {
        Self { router, groups }
    }

    pub fn router(&self) -> &AlertRouter {
        &self.router
    }

    pub fn group(&self, name: &str) -> Option<&Arc<Group>> {
        self.groups.get(name)
    }

    /// Notify every matching alert that `target` moved from `previous` to
    /// `new_state`.
    ///
    /// Groups are consulted in the check's declared order. The first one
    /// that refuses suppresses the alert; groups consulted before it have
    /// already counted the emission.
    pub async fn raise(
        &self,
        target: AlertTarget<'_>,
        previous: CheckState,
        new_state: CheckState,
        last_result: &CheckResult,
    ) -> RaiseOutcome {
        let mut text = render_text(target.name, new_state, &last_result.detail, previous);

        let mut limited = Vec::new();
        for group_name in target.groups {
            let Some(group) = self.groups.get(group_name) else {
                continue;
            };
            let (can_send, is_last) = group.can_send_alert();
            if !can_send {
                info!(check = %target.name, group = %group_name, "alert suppressed by group limit");
                return RaiseOutcome::Suppressed {
                    group: group_name.clone(),
                };
            }
            if is_last {
                limited.push(format!("[GROUP ALERT LIMIT REACHED: {group_name}]"));
            }
        }
        if !limited.is_empty() {
            text.push(' ');
            text.push_str(&limited.join(" "));
        }

        let details = AlertDetails {
            text,
            name: target.name.to_string(),
            kind: target.kind.to_string(),
            last_result: last_result.clone(),
            previous_state: previous,
            new_state,
        };

        let mut attempted = 0;
        let mut failed = Vec::new();
        for named in self.router.matching(target.matcher) {
            attempted += 1;
            debug!(check = %target.name, alert = %named.name, "sending alert");
            if let Err(source) = named.alert.send(&details).await {
                warn!(check = %target.name, alert = %named.name, error = %source, "alert failed");
                failed.push(AlertError::Delivery {
                    alert: named.name.clone(),
                    source,
                });
            }
        }

        RaiseOutcome::Sent { attempted, failed }
    }
}
