//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and returns every
//! problem found rather than stopping at the first.

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a [`ProxyConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend host must not be empty")]
    EmptyBackendHost,

    #[error("backend port must be between 1 and 65535, got {0}")]
    InvalidBackendPort(u16),

    #[error("listener host {0:?} is neither an IP address nor \"localhost\"")]
    InvalidListenHost(String),

    #[error("shutdown grace period must be greater than zero")]
    ZeroGracePeriod,
}

/// Render a list of validation errors as one line.
pub(crate) fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check a configuration, collecting all errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backend.host.trim().is_empty() {
        errors.push(ValidationError::EmptyBackendHost);
    }
    if config.backend.port == 0 {
        errors.push(ValidationError::InvalidBackendPort(config.backend.port));
    }

    let host = config.listener.host.as_str();
    if host != "localhost" && host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidListenHost(host.to_string()));
    }

    if config.timeouts.shutdown_grace_secs == 0 {
        errors.push(ValidationError::ZeroGracePeriod);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
