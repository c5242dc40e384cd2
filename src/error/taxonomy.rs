//! Classification axes shared by every failure the service reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    #[serde(rename = "VALIDATION")]
    Validation,
    #[serde(rename = "AUTHENTICATION")]
    Authentication,
    #[serde(rename = "AUTHORIZATION")]
    Authorization,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "CONFLICT")]
    Conflict,
    #[serde(rename = "INTERNAL")]
    Internal,
    #[serde(rename = "TOO_MANY_REQUESTS")]
    TooManyRequests,
    #[serde(rename = "SECURITY_ERROR")]
    Security,
    #[serde(rename = "INJECTION_ERROR")]
    Injection,
    #[serde(rename = "SSRF_ERROR")]
    Ssrf,
    #[serde(rename = "CSRF_ERROR")]
    Csrf,
}

impl ErrorType {
    /// Wire name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Validation => "VALIDATION",
            ErrorType::Authentication => "AUTHENTICATION",
            ErrorType::Authorization => "AUTHORIZATION",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Conflict => "CONFLICT",
            ErrorType::Internal => "INTERNAL",
            ErrorType::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorType::Security => "SECURITY_ERROR",
            ErrorType::Injection => "INJECTION_ERROR",
            ErrorType::Ssrf => "SSRF_ERROR",
            ErrorType::Csrf => "CSRF_ERROR",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which layer of the service raised the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorModule {
    User,
    Auth,
    Database,
    Validation,
    System,
    Security,
    Cache,
}

impl ErrorModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorModule::User => "USER",
            ErrorModule::Auth => "AUTH",
            ErrorModule::Database => "DATABASE",
            ErrorModule::Validation => "VALIDATION",
            ErrorModule::System => "SYSTEM",
            ErrorModule::Security => "SECURITY",
            ErrorModule::Cache => "CACHE",
        }
    }
}

impl fmt::Display for ErrorModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where inside a module the failure was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    pub module: ErrorModule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ErrorSource {
    pub fn new(module: ErrorModule) -> Self {
        Self {
            module,
            service: None,
            method: None,
        }
    }

    /// Shorthand for the common `{ module, method }` pair.
    pub fn method(module: ErrorModule, method: impl Into<String>) -> Self {
        Self {
            module,
            service: None,
            method: Some(method.into()),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for ty in [
            ErrorType::Validation,
            ErrorType::NotFound,
            ErrorType::Injection,
            ErrorType::Csrf,
        ] {
            let json = serde_json::to_value(ty).unwrap();
            assert_eq!(json, serde_json::Value::String(ty.as_str().to_string()));
        }
        let json = serde_json::to_value(ErrorModule::Database).unwrap();
        assert_eq!(json, "DATABASE");
    }

    #[test]
    fn test_source_skips_empty_fields() {
        let source = ErrorSource::method(ErrorModule::Security, "sql_injection_protection");
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "module": "SECURITY", "method": "sql_injection_protection" })
        );
    }
}
