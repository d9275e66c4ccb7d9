//! Configuration error: inconsistent dimensions or parameters.
//!
//! Always fatal and always surfaced before any trace work begins — the
//! orchestrator validates the full configuration in its `Configured` state.

use thiserror::Error;

/// An invalid radar configuration, naming the offending parameter.
#[derive(Debug, Clone, Error)]
#[error("configuration error in `{parameter}`: {reason}")]
pub struct ConfigurationError {
    pub parameter: String,
    pub reason: String,
}

impl ConfigurationError {
    pub fn new(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}
