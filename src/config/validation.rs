//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (depths, intervals, sizes > 0)
//! - Check that addresses parse and pattern overrides compile
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GuardConfig;

/// Upper bound for CSRF durations. Keeps token expiry inside the range
/// `chrono` can represent.
pub const MAX_CSRF_SECS: u64 = 365 * 24 * 60 * 60;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid header name {value:?}")]
    InvalidHeader { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("patterns.{category}[{index}]: {reason}")]
    InvalidPattern {
        category: &'static str,
        index: usize,
        reason: String,
    },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let positive = [
        ("pipeline.max_depth", config.pipeline.max_depth as u64),
        ("pipeline.max_body_bytes", config.pipeline.max_body_bytes as u64),
        ("pipeline.request_timeout_secs", config.pipeline.request_timeout_secs),
        ("csrf.token_ttl_secs", config.csrf.token_ttl_secs),
        ("csrf.cleanup_interval_secs", config.csrf.cleanup_interval_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    for (field, value) in [
        ("csrf.token_ttl_secs", config.csrf.token_ttl_secs),
        ("csrf.cleanup_interval_secs", config.csrf.cleanup_interval_secs),
    ] {
        if value > MAX_CSRF_SECS {
            errors.push(ValidationError::TooLarge {
                field,
                max: MAX_CSRF_SECS,
            });
        }
    }

    if config.csrf.header_name.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "csrf.header_name" });
    } else if axum::http::HeaderName::from_bytes(config.csrf.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeader {
            field: "csrf.header_name",
            value: config.csrf.header_name.clone(),
        });
    }
    if config.csrf.body_field.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "csrf.body_field" });
    }
    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::Empty { field: "auth.jwt_secret" });
    }

    for (category, sources) in config.patterns.overrides() {
        for (index, source) in sources.iter().enumerate() {
            if let Err(e) = regex::Regex::new(source) {
                errors.push(ValidationError::InvalidPattern {
                    category,
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
