//! plum-core — shared types for the Plum health checker.
//!
//! Everything the other crates agree on lives here:
//!
//! - [`types`]: check states, results, facts, and the bounded result history
//! - [`settings`]: per-check settings and the cascading merge of defaults
//! - [`plugin`]: the contract between the core and check/alert implementations
//! - [`config`]: the TOML configuration provider that yields typed blocks
//! - [`duration`]: human-readable duration parsing shared by all decoders

pub mod config;
pub mod duration;
pub mod error;
pub mod plugin;
pub mod settings;
pub mod types;

pub use config::{Block, ConfigDocument};
pub use error::{ConfigError, ConfigResult};
pub use plugin::{
    Alert, AlertDetails, BoxFuture, Check, CheckContext, Lookup, Plugin, PluginError, PluginRegistry,
    PluginResult, PluginSettings, Stateful,
};
pub use settings::{CheckSettings, SettingsFragment};
pub use types::*;
