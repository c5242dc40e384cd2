//! The classified error value.

use axum::http::StatusCode;
use serde_json::{Map, Value};
use std::panic::Location;
use thiserror::Error;

use super::messages;
use super::taxonomy::{ErrorModule, ErrorSource, ErrorType};

/// A failure classified by type and module, carrying the HTTP status the
/// client will see.
///
/// Construct one with [`ClassifiedError::registered`] when the message comes
/// from the registry, or [`ClassifiedError::new`] for a literal message.
/// The call site is recorded and reported as the error's `stack` outside
/// production.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub error_type: ErrorType,
    pub module: ErrorModule,
    pub message: String,
    pub status_code: StatusCode,
    /// True for errors raised on purpose by this taxonomy, false for
    /// unexpected defects downgraded by the translator.
    pub is_operational: bool,
    /// Serialized as `source` on the wire.
    pub origin: Option<ErrorSource>,
    pub details: Option<Map<String, Value>>,
    location: &'static Location<'static>,
}

impl ClassifiedError {
    #[track_caller]
    pub fn new(
        error_type: ErrorType,
        module: ErrorModule,
        message: impl Into<String>,
        status_code: StatusCode,
    ) -> Self {
        Self {
            error_type,
            module,
            message: message.into(),
            status_code,
            is_operational: true,
            origin: None,
            details: None,
            location: Location::caller(),
        }
    }

    /// Build an error whose message is resolved through the registry.
    ///
    /// # Panics
    /// Panics if `(module, error_type, key)` is not registered.
    #[track_caller]
    pub fn registered(
        error_type: ErrorType,
        module: ErrorModule,
        key: &str,
        status_code: StatusCode,
    ) -> Self {
        let message = messages::resolve(module, error_type, key);
        Self::new(error_type, module, message, status_code)
    }

    pub fn with_origin(mut self, origin: ErrorSource) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Attach one detail entry, creating the map on first use.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    pub(crate) fn non_operational(mut self) -> Self {
        self.is_operational = false;
        self
    }

    /// `"fail"` for 4xx statuses, `"error"` otherwise.
    pub fn status(&self) -> &'static str {
        if self.status_code.is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// `file:line:col` of the construction site.
    pub fn location(&self) -> String {
        self.location.to_string()
    }
}
