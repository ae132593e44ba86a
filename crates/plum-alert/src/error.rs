//! Error types for alert routing.

use plum_core::PluginError;
use thiserror::Error;

/// Result type alias for alert operations.
pub type AlertResult<T> = Result<T, AlertError>;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("invalid alert pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("alert '{alert}' failed: {source}")]
    Delivery {
        alert: String,
        #[source]
        source: PluginError,
    },
}
