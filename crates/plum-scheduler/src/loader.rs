//! Building checks, alerts, and groups from a configuration document.
//!
//! Registration order is alerts, groups, then checks, so that every check
//! can be validated against the alerts and groups it refers to. Any error
//! aborts the whole load before a single check runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use plum_alert::{AlertDispatcher, AlertRouter, Group, GroupSettings};
use plum_core::config::take_keys;
use plum_core::settings::{NO_ALERTS, SETTINGS_KEYS, resolve};
use plum_core::{
    Block, ConfigDocument, ConfigError, ConfigResult, Lookup, PluginRegistry, PluginSettings,
    SettingsFragment,
};
use tracing::{debug, info};

use crate::check::ScheduledCheck;

/// Everything a configuration produced.
pub struct Registration {
    pub checks: Vec<ScheduledCheck>,
    pub dispatcher: AlertDispatcher,
}

/// Register every block in `doc` using the plugins in `plugins`.
pub fn load(doc: &ConfigDocument, plugins: &PluginRegistry) -> ConfigResult<Registration> {
    let global = SettingsFragment::from_table(doc.defaults.clone()).map_err(|e| ConfigError::Settings {
        what: "defaults",
        name: "defaults".into(),
        message: e.to_string(),
    })?;

    let router = load_alerts(&doc.alerts, plugins)?;
    let groups = load_groups(&doc.groups)?;

    let mut names = HashSet::new();
    let mut checks = Vec::with_capacity(doc.checks.len());
    for block in &doc.checks {
        if !names.insert(block.name.as_str()) {
            return Err(ConfigError::Duplicate {
                what: "check",
                name: block.name.clone(),
            });
        }
        checks.push(load_check(block, &global, &groups, &router, plugins)?);
    }

    info!(
        checks = checks.len(),
        alerts = router.len(),
        groups = groups.len(),
        "configuration loaded"
    );
    Ok(Registration {
        checks,
        dispatcher: AlertDispatcher::new(router, groups),
    })
}

fn settings_error(what: &'static str, name: &str, e: impl ToString) -> ConfigError {
    ConfigError::Settings {
        what,
        name: name.to_string(),
        message: e.to_string(),
    }
}

/// Keys the plugin left untouched are typos as far as the file is concerned.
fn reject_unused(what: &'static str, name: &str, settings: &PluginSettings) -> ConfigResult<()> {
    let keys = settings.unused();
    if keys.is_empty() {
        return Ok(());
    }
    Err(ConfigError::UnknownKeys {
        what,
        name: name.to_string(),
        keys,
    })
}

fn load_alerts(blocks: &[Block], plugins: &PluginRegistry) -> ConfigResult<AlertRouter> {
    let mut router = AlertRouter::new();
    for block in blocks {
        if router.contains(&block.name) {
            return Err(ConfigError::Duplicate {
                what: "alert",
                name: block.name.clone(),
            });
        }

        let mut settings = PluginSettings::new(block.settings.clone());
        let mut alert = match plugins.create_alert(&block.kind, &mut settings) {
            Lookup::NoPlugin => {
                return Err(ConfigError::UnknownPlugin {
                    what: "alert",
                    name: block.name.clone(),
                    kind: block.kind.clone(),
                });
            }
            Lookup::NoKind => {
                return Err(ConfigError::UnknownType {
                    what: "alert",
                    name: block.name.clone(),
                    kind: block.kind.clone(),
                });
            }
            Lookup::Found(result) => result.map_err(|e| settings_error("alert", &block.name, e))?,
        };
        reject_unused("alert", &block.name, &settings)?;

        alert.validate().map_err(|e| ConfigError::Validation {
            what: "alert",
            name: block.name.clone(),
            message: e.to_string(),
        })?;

        debug!(alert = %block.name, kind = %block.kind, "alert registered");
        router.register(block.name.clone(), Arc::from(alert));
    }
    Ok(router)
}

fn load_groups(blocks: &[Block]) -> ConfigResult<HashMap<String, Arc<Group>>> {
    let mut groups = HashMap::new();
    for block in blocks {
        if groups.contains_key(&block.name) {
            return Err(ConfigError::Duplicate {
                what: "group",
                name: block.name.clone(),
            });
        }

        let settings: GroupSettings = toml::Value::Table(block.settings.clone())
            .try_into()
            .map_err(|e| settings_error("group", &block.name, e))?;
        let group =
            Group::from_settings(&block.name, settings).map_err(|e| settings_error("group", &block.name, e))?;

        debug!(group = %block.name, limit = group.alert_limit, "group registered");
        groups.insert(block.name.clone(), Arc::new(group));
    }
    Ok(groups)
}

fn load_check(
    block: &Block,
    global: &SettingsFragment,
    groups: &HashMap<String, Arc<Group>>,
    router: &AlertRouter,
    plugins: &PluginRegistry,
) -> ConfigResult<ScheduledCheck> {
    let mut plugin_settings = block.settings.clone();
    let own = SettingsFragment::from_table(take_keys(&mut plugin_settings, SETTINGS_KEYS))
        .map_err(|e| settings_error("check", &block.name, e))?;

    // Membership comes from global + check only.
    let membership = resolve(global, [], &own).groups;
    let mut member_of = Vec::with_capacity(membership.len());
    for name in &membership {
        let group = groups.get(name).ok_or_else(|| ConfigError::UnknownGroup {
            check: block.name.clone(),
            group: name.clone(),
        })?;
        member_of.push(&group.defaults);
    }

    let mut config = resolve(global, member_of, &own);
    config.groups = membership;

    for pattern in &config.alerts {
        if pattern == NO_ALERTS {
            continue;
        }
        let resolves = router
            .resolves(pattern)
            .map_err(|e| settings_error("check", &block.name, e))?;
        if !resolves {
            return Err(ConfigError::UnmatchedAlert {
                check: block.name.clone(),
                pattern: pattern.clone(),
            });
        }
    }

    let mut settings = PluginSettings::new(plugin_settings);
    let mut check = match plugins.create_check(&block.kind, &mut settings) {
        Lookup::NoPlugin => {
            return Err(ConfigError::UnknownPlugin {
                what: "check",
                name: block.name.clone(),
                kind: block.kind.clone(),
            });
        }
        Lookup::NoKind => {
            return Err(ConfigError::UnknownType {
                what: "check",
                name: block.name.clone(),
                kind: block.kind.clone(),
            });
        }
        Lookup::Found(result) => result.map_err(|e| settings_error("check", &block.name, e))?,
    };
    reject_unused("check", &block.name, &settings)?;

    check.validate().map_err(|e| ConfigError::Validation {
        what: "check",
        name: block.name.clone(),
        message: e.to_string(),
    })?;

    debug!(
        check = %block.name,
        kind = %block.kind,
        interval = ?config.interval,
        groups = ?config.groups,
        "check registered"
    );
    ScheduledCheck::new(block.name.clone(), block.kind.clone(), config, Arc::from(check))
        .map_err(|e| settings_error("check", &block.name, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use plum_core::{
        Alert, AlertDetails, BoxFuture, Check, CheckContext, CheckResult, Plugin, PluginError,
        PluginResult,
    };
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Ping {
        #[serde(default)]
        target: String,
    }

    impl Check for Ping {
        fn execute<'a>(&'a self, _ctx: &'a CheckContext) -> BoxFuture<'a, CheckResult> {
            Box::pin(async { CheckResult::good() })
        }

        fn validate(&mut self) -> PluginResult<()> {
            if self.target == "invalid" {
                return Err(PluginError::Invalid("target is invalid".into()));
            }
            Ok(())
        }
    }

    struct Nop;

    impl Alert for Nop {
        fn send<'a>(&'a self, _details: &'a AlertDetails) -> BoxFuture<'a, PluginResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct TestPlugin;

    impl Plugin for TestPlugin {
        fn check(&self, kind: &str, settings: &mut PluginSettings) -> Option<PluginResult<Box<dyn Check>>> {
            match kind {
                "ping" => Some(settings.decode::<Ping>().map(|c| Box::new(c) as Box<dyn Check>)),
                "idle" => Some(Ok(Box::new(Ping {
                    target: String::new(),
                }) as Box<dyn Check>)),
                _ => None,
            }
        }

        fn alert(&self, kind: &str, _settings: &mut PluginSettings) -> Option<PluginResult<Box<dyn Alert>>> {
            (kind == "nop").then(|| Ok(Box::new(Nop) as Box<dyn Alert>))
        }
    }

    fn load_str(text: &str) -> ConfigResult<Registration> {
        let doc = ConfigDocument::parse(text).unwrap();
        let plugins = PluginRegistry::new().with("test", Arc::new(TestPlugin));
        load(&doc, &plugins)
    }

    fn err(text: &str) -> String {
        match load_str(text) {
            Ok(_) => panic!("expected configuration error"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn resolves_defaults_groups_and_check_overrides() {
        let reg = load_str(
            r#"
[defaults]
interval = "1m"
timeout = "5s"
good_threshold = 3

[[alert]]
name = "ops"
type = "test.nop"

[[group]]
name = "web"
[group.defaults]
interval = "10s"
failing_threshold = 4

[[check]]
name = "home"
type = "test.ping"
groups = ["web"]
timeout = "2s"
target = "example.com"
"#,
        )
        .unwrap();

        let config = &reg.checks[0].config;
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.good_threshold, 3);
        assert_eq!(config.failing_threshold, 4);
        assert_eq!(config.alerts, ["*"]);
        assert_eq!(config.groups, ["web"]);
        assert!(reg.dispatcher.group("web").is_some());
        assert_eq!(reg.dispatcher.router().len(), 1);
    }

    #[test]
    fn group_defaults_cannot_change_membership() {
        let reg = load_str(
            r#"
[[group]]
name = "a"
[group.defaults]
groups = ["b"]

[[group]]
name = "b"

[[check]]
name = "home"
type = "test.ping"
groups = ["a"]
alerts = ["-"]
"#,
        )
        .unwrap();
        assert_eq!(reg.checks[0].config.groups, ["a"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let e = err("[[check]]\nname = \"a\"\ntype = \"test.ping\"\nalerts = [\"-\"]\n[[check]]\nname = \"a\"\ntype = \"test.ping\"\nalerts = [\"-\"]");
        assert_eq!(e, "duplicate check name: a");

        let e = err("[[alert]]\nname = \"ops\"\ntype = \"test.nop\"\n[[alert]]\nname = \"ops\"\ntype = \"test.nop\"");
        assert_eq!(e, "duplicate alert name: ops");
    }

    #[test]
    fn unknown_plugin_and_kind_name_the_block() {
        let e = err("[[check]]\nname = \"a\"\ntype = \"http.get\"\nalerts = [\"-\"]");
        assert!(e.contains("check 'a'") && e.contains("http.get"), "{e}");

        let e = err("[[check]]\nname = \"a\"\ntype = \"test.tcp\"\nalerts = [\"-\"]");
        assert!(e.contains("unknown type 'test.tcp'"), "{e}");
    }

    #[test]
    fn unknown_group_is_rejected() {
        let e = err("[[check]]\nname = \"a\"\ntype = \"test.ping\"\ngroups = [\"nope\"]\nalerts = [\"-\"]");
        assert_eq!(e, "check 'a': unknown group 'nope'");
    }

    #[test]
    fn unmatched_alert_pattern_is_rejected() {
        let text = r#"
[[alert]]
name = "ops"
type = "test.nop"

[[check]]
name = "a"
type = "test.ping"
alerts = ["ops", "dev*"]
"#;
        assert!(err(text).contains("'dev*' does not match"));
    }

    #[test]
    fn default_star_needs_at_least_one_alert() {
        let e = err("[[check]]\nname = \"a\"\ntype = \"test.ping\"");
        assert!(e.contains("'*' does not match"), "{e}");
    }

    #[test]
    fn leftover_keys_are_errors() {
        let e = err("[[check]]\nname = \"a\"\ntype = \"test.ping\"\nalerts = [\"-\"]\ntragret = \"x\"");
        assert!(e.contains("check 'a'") && e.contains("tragret"), "{e}");

        let e = err("[defaults]\nintervl = \"1m\"");
        assert!(e.starts_with("defaults 'defaults'"), "{e}");

        let e = err("[[group]]\nname = \"g\"\nalert_limitt = 1");
        assert!(e.starts_with("group 'g'"), "{e}");
    }

    #[test]
    fn validation_failures_are_reported() {
        let e = err("[[check]]\nname = \"a\"\ntype = \"test.ping\"\nalerts = [\"-\"]\ntarget = \"invalid\"");
        assert_eq!(e, "check 'a': validation failed: target is invalid");
    }

    #[test]
    fn keys_a_plugin_ignores_are_errors() {
        let e = err("[[alert]]\nname = \"ops\"\ntype = \"test.nop\"\nbogus_alert_key = 1");
        assert_eq!(e, "alert 'ops': unknown settings: bogus_alert_key");

        let e = err("[[alert]]\nname = \"ops\"\ntype = \"test.nop\"\n[[check]]\nname = \"a\"\ntype = \"test.idle\"\nintreval = \"5s\"");
        assert_eq!(e, "check 'a': unknown settings: intreval");
    }

    #[test]
    fn plugins_without_settings_accept_core_keys() {
        let reg = load_str(
            r#"
[[alert]]
name = "ops"
type = "test.nop"

[[check]]
name = "a"
type = "test.idle"
interval = "5s"
alerts = ["ops"]
"#,
        )
        .unwrap();
        assert_eq!(reg.checks[0].config.interval, Duration::from_secs(5));
    }
}
