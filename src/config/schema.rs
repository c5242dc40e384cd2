//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the ingress guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deployment mode; controls how much error detail reaches clients.
    pub environment: Environment,

    /// Screening pipeline settings.
    pub pipeline: PipelineConfig,

    /// SSRF guard settings.
    pub ssrf: SsrfConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Optional detector pattern overrides.
    pub patterns: PatternsConfig,

    /// Credential verification settings.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Screening pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Strip forbidden keys and characters before detection.
    pub sanitize: bool,

    /// Deepest nesting accepted in any payload tree.
    pub max_depth: usize,

    /// Maximum body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sanitize: true,
            max_depth: 32,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 30,
        }
    }
}

/// SSRF guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SsrfConfig {
    pub enabled: bool,

    /// Resolve hostnames and check every resolved address.
    pub resolve_dns: bool,
}

impl Default for SsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolve_dns: true,
        }
    }
}

/// Anti-forgery token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// `None` means "on, except in test mode".
    pub enabled: Option<bool>,

    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,

    /// Interval between expiry sweeps in seconds.
    pub cleanup_interval_secs: u64,

    /// Header carrying the token in both directions.
    pub header_name: String,

    /// Body field accepted as an alternative to the header.
    pub body_field: String,
}

impl CsrfConfig {
    /// Whether verification runs in the given mode.
    pub fn is_enabled(&self, environment: Environment) -> bool {
        self.enabled
            .unwrap_or(!matches!(environment, Environment::Test))
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            token_ttl_secs: 3600,
            cleanup_interval_secs: 3600,
            header_name: "X-CSRF-Token".to_string(),
            body_field: "_csrf".to_string(),
        }
    }
}

/// Regex sources replacing the built-in detector tables.
///
/// A category left unset keeps its default table.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PatternsConfig {
    pub sql: Option<Vec<String>>,
    pub nosql: Option<Vec<String>>,
    pub command: Option<Vec<String>>,
    pub prototype: Option<Vec<String>>,
    pub ssrf_hosts: Option<Vec<String>>,
}

impl PatternsConfig {
    /// `(category, sources)` for every overridden table.
    pub fn overrides(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        [
            ("sql", &self.sql),
            ("nosql", &self.nosql),
            ("command", &self.command),
            ("prototype", &self.prototype),
            ("ssrf_hosts", &self.ssrf_hosts),
        ]
        .into_iter()
        .filter_map(|(name, sources)| sources.as_deref().map(|s| (name, s)))
    }
}

/// Credential verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret for bearer tokens.
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            jwt_secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
