//! Failures that reach the translator.
//!
//! Besides [`ClassifiedError`], handlers and collaborators surface their own
//! native failure shapes. They are kept typed here so the translator can map
//! the ones it recognizes and downgrade everything else.

use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use jsonwebtoken::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use super::classified::ClassifiedError;

/// A single field-level problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failures reported by the persistence layer.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    /// A lookup was given something that is not a valid identifier.
    #[error("cast to identifier failed for value {value:?}")]
    InvalidId { value: String },

    /// A uniqueness constraint rejected the write.
    #[error("duplicate key error")]
    DuplicateKey { key_value: Map<String, Value> },

    /// Document-level schema validation failed.
    #[error("schema validation failed")]
    Schema { errors: Vec<FieldIssue> },
}

/// Structured input validation failed before reaching business logic.
#[derive(Debug, Clone, Error)]
#[error("input validation failed with {} issue(s)", .issues.len())]
pub struct InputValidationError {
    pub issues: Vec<FieldIssue>,
}

impl InputValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(path, message)],
        }
    }
}

impl From<serde_json::Error> for InputValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::single("body", err.to_string())
    }
}

/// Credential verification outcome, as reported by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential is malformed or its signature is invalid")]
    Malformed,
    #[error("credential has expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for CredentialError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => CredentialError::Expired,
            _ => CredentialError::Malformed,
        }
    }
}

/// A bare error response that a transport layer produced on its own, such
/// as the body limit, the timeout or the router's method check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request rejected with status {status}")]
pub struct Rejection {
    pub status: StatusCode,
}

/// Everything the translator can be handed.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    InputValidation(#[from] InputValidationError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Anything else. Never shown to clients.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Failure {
    /// Short name of the failure shape, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Failure::Classified(_) => "ClassifiedError",
            Failure::Persistence(PersistenceError::InvalidId { .. }) => "CastError",
            Failure::Persistence(PersistenceError::DuplicateKey { .. }) => "DuplicateKeyError",
            Failure::Persistence(PersistenceError::Schema { .. }) => "SchemaValidationError",
            Failure::InputValidation(_) => "InputValidationError",
            Failure::Credential(CredentialError::Malformed) => "MalformedCredentialError",
            Failure::Credential(CredentialError::Expired) => "ExpiredCredentialError",
            Failure::Rejected(_) => "Rejection",
            Failure::Unexpected(_) => "Error",
        }
    }

    /// Operator-facing trace of where the failure came from.
    pub fn stack(&self) -> String {
        match self {
            Failure::Classified(err) => err.location(),
            Failure::Unexpected(err) => format!("{err:?}"),
            other => format!("{}: {}", other.name(), other),
        }
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Failure::InputValidation(err.into())
    }
}

impl From<JsonRejection> for Failure {
    fn from(rejection: JsonRejection) -> Self {
        Failure::InputValidation(InputValidationError::single("body", rejection.body_text()))
    }
}

/// A failure waiting in the response extensions for the translation layer.
#[derive(Clone, Debug)]
pub struct PendingFailure(pub Arc<Failure>);

impl IntoResponse for Failure {
    /// Produces a bare 500 that carries the failure. The translation
    /// middleware replaces it with the classified body; without that layer
    /// the client only ever sees an empty 500.
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(PendingFailure(Arc::new(self)));
        response
    }
}

impl IntoResponse for ClassifiedError {
    fn into_response(self) -> Response {
        Failure::Classified(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_expiry_maps_to_expired() {
        let err = jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature);
        assert_eq!(CredentialError::from(err), CredentialError::Expired);

        let err = jsonwebtoken::errors::Error::from(ErrorKind::InvalidSignature);
        assert_eq!(CredentialError::from(err), CredentialError::Malformed);
    }

    #[test]
    fn test_into_response_defers_to_translator() {
        let response = Failure::from(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let pending = response.extensions().get::<PendingFailure>().unwrap();
        assert_eq!(pending.0.name(), "Error");
    }

    #[test]
    fn test_json_error_becomes_input_validation() {
        let err = serde_json::from_str::<Value>("{not json").unwrap_err();
        let failure = Failure::from(err);
        match failure {
            Failure::InputValidation(e) => assert_eq!(e.issues[0].path, "body"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
