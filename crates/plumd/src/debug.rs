//! Built-in `debug` plugin for exercising a configuration end to end.
//!
//! - `debug.random`: passes with probability `percent_good` (default 0.5)
//! - `debug.sysout`: writes alerts to the log

use plum_core::{
    Alert, AlertDetails, BoxFuture, Check, CheckContext, CheckResult, Plugin, PluginError, PluginResult,
    PluginSettings,
};
use serde::Deserialize;
use tracing::info;

pub struct DebugPlugin;

impl Plugin for DebugPlugin {
    fn check(&self, kind: &str, settings: &mut PluginSettings) -> Option<PluginResult<Box<dyn Check>>> {
        match kind {
            "random" => Some(settings.decode::<RandomCheck>().map(|c| Box::new(c) as Box<dyn Check>)),
            _ => None,
        }
    }

    fn alert(&self, kind: &str, settings: &mut PluginSettings) -> Option<PluginResult<Box<dyn Alert>>> {
        match kind {
            "sysout" => Some(settings.decode::<SysOutAlert>().map(|a| Box::new(a) as Box<dyn Alert>)),
            _ => None,
        }
    }
}

fn default_percent_good() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomCheck {
    #[serde(default = "default_percent_good")]
    percent_good: f64,
}

impl RandomCheck {
    fn judge(&self, value: f64) -> CheckResult {
        if value <= self.percent_good {
            CheckResult::good()
        } else {
            CheckResult::failing(format!(
                "Random value {value:.6} greater than percent_good {:.6}",
                self.percent_good
            ))
        }
    }
}

impl Check for RandomCheck {
    fn execute<'a>(&'a self, _ctx: &'a CheckContext) -> BoxFuture<'a, CheckResult> {
        Box::pin(async move { self.judge(rand::random::<f64>()) })
    }

    fn validate(&mut self) -> PluginResult<()> {
        if !(0.0..=1.0).contains(&self.percent_good) {
            return Err(PluginError::Invalid(format!(
                "percent_good must be between 0 and 1, got {}",
                self.percent_good
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SysOutAlert {}

impl Alert for SysOutAlert {
    fn send<'a>(&'a self, details: &'a AlertDetails) -> BoxFuture<'a, PluginResult<()>> {
        Box::pin(async move {
            info!(check = %details.name, "DEBUG ALERT - {}", details.text);
            Ok(())
        })
    }
}
