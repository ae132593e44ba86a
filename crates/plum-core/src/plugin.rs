//! The contract between the core and check/alert implementations.
//!
//! A [`Plugin`] turns a kind string plus its [`PluginSettings`] into a [`Check`]
//! or an [`Alert`]. Optional capabilities are default trait methods
//! that implementations override when they need them:
//!
//! - [`Check::validate`] / [`Alert::validate`]: run once at registration
//! - [`Check::timeout`]: replaces the configured timeout for checks that
//!   intentionally run long
//! - [`Check::as_stateful`]: exposes [`Stateful`] so check-local state
//!   survives restarts through the tombstone

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::types::{CheckResult, CheckState};

/// Boxed future returned by plugin methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type alias for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors raised by plugin implementations.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Settings(#[from] toml::de::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("state error: {0}")]
    State(#[from] serde_json::Error),
}

// ── Checks ────────────────────────────────────────────────────────

/// Per-execution context handed to [`Check::execute`].
#[derive(Debug, Clone)]
pub struct CheckContext {
    started: Instant,
    timeout: Duration,
}

impl CheckContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    /// Total time the scheduler will wait for this execution.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Instant {
        self.started + self.timeout
    }

    /// Time left before the scheduler stops waiting.
    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }
}

/// A configured health check.
///
/// `execute` is called repeatedly over the lifetime of the process, never
/// concurrently for the same instance.
pub trait Check: Send + Sync + 'static {
    /// Perform the check. Should finish within `ctx.timeout()`.
    fn execute<'a>(&'a self, ctx: &'a CheckContext) -> BoxFuture<'a, CheckResult>;

    /// Reject bad settings before the check ever runs.
    fn validate(&mut self) -> PluginResult<()> {
        Ok(())
    }

    /// Override the configured timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Access to persisted check-local state, if the check has any.
    fn as_stateful(&self) -> Option<&dyn Stateful> {
        None
    }
}

/// Check-local state carried across restarts.
pub trait Stateful: Send + Sync {
    fn save(&self) -> PluginResult<serde_json::Value>;

    fn restore(&self, state: serde_json::Value) -> PluginResult<()>;
}

// ── Alerts ────────────────────────────────────────────────────────

/// Everything an alert needs to describe a state transition.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AlertDetails {
    /// Rendered human-readable message.
    pub text: String,
    /// Name of the check that changed state.
    pub name: String,
    /// Type of the check (`plugin.kind`).
    pub kind: String,
    pub last_result: CheckResult,
    pub previous_state: CheckState,
    pub new_state: CheckState,
}

/// A configured alert destination.
pub trait Alert: Send + Sync + 'static {
    fn send<'a>(&'a self, details: &'a AlertDetails) -> BoxFuture<'a, PluginResult<()>>;

    fn validate(&mut self) -> PluginResult<()> {
        Ok(())
    }
}

// ── Plugins ───────────────────────────────────────────────────────

/// A provider of check and alert kinds.
///
/// Both factories return `None` when the kind is unknown, otherwise the
/// decoded instance or the decoding error.
pub trait Plugin: Send + Sync {
    fn check(&self, kind: &str, settings: &mut PluginSettings) -> Option<PluginResult<Box<dyn Check>>>;

    fn alert(&self, kind: &str, settings: &mut PluginSettings) -> Option<PluginResult<Box<dyn Alert>>>;
}

/// A block's plugin-specific keys, tracking which of them were consumed.
///
/// Whatever [`PluginSettings::unused`] reports once the factory returns is
/// rejected by the loader, so a plugin that never decodes its settings
/// accepts none.
#[derive(Debug, Clone, Default)]
pub struct PluginSettings {
    table: toml::Table,
    ignored: Option<Vec<String>>,
}

impl PluginSettings {
    pub fn new(table: toml::Table) -> Self {
        Self { table, ignored: None }
    }

    pub fn table(&self) -> &toml::Table {
        &self.table
    }

    /// Decode into a typed struct, recording the keys it did not use.
    pub fn decode<T: DeserializeOwned>(&mut self) -> PluginResult<T> {
        let mut ignored = Vec::new();
        let value = toml::Value::Table(self.table.clone());
        let decoded = serde_ignored::deserialize(value, |path| ignored.push(path.to_string()))?;
        self.ignored = Some(ignored);
        Ok(decoded)
    }

    /// Keys the last [`PluginSettings::decode`] ignored, or every key if nothing
    /// was decoded.
    pub fn unused(&self) -> Vec<String> {
        match &self.ignored {
            Some(ignored) => ignored.clone(),
            None => self.table.keys().cloned().collect(),
        }
    }
}

impl From<toml::Table> for PluginSettings {
    fn from(table: toml::Table) -> Self {
        Self::new(table)
    }
}

/// Outcome of resolving a `plugin.kind` type string.
pub enum Lookup<T> {
    /// No plugin registered under the prefix.
    NoPlugin,
    /// The plugin exists but does not provide this kind.
    NoKind,
    Found(PluginResult<T>),
}

/// Plugins registered by name; a type string `http.get` resolves the
/// `get` kind of the `http` plugin.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(name.into(), plugin);
    }

    pub fn with(mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) -> Self {
        self.register(name, plugin);
        self
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn split<'a>(&self, kind: &'a str) -> Option<(&Arc<dyn Plugin>, &'a str)> {
        let (plugin, kind) = kind.split_once('.')?;
        Some((self.plugins.get(plugin)?, kind))
    }

    pub fn create_check(&self, kind: &str, settings: &mut PluginSettings) -> Lookup<Box<dyn Check>> {
        match self.split(kind) {
            None => Lookup::NoPlugin,
            Some((plugin, kind)) => match plugin.check(kind, settings) {
                None => Lookup::NoKind,
                Some(result) => Lookup::Found(result),
            },
        }
    }

    pub fn create_alert(&self, kind: &str, settings: &mut PluginSettings) -> Lookup<Box<dyn Alert>> {
        match self.split(kind) {
            None => Lookup::NoPlugin,
            Some((plugin, kind)) => match plugin.alert(kind, settings) {
                None => Lookup::NoKind,
                Some(result) => Lookup::Found(result),
            },
        }
    }
}
