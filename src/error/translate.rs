//! Central failure handler.
//!
//! # Responsibilities
//! - Map every [`Failure`] onto a [`ClassifiedError`]
//! - Log the failure with request context for operators
//! - Serialize the client-facing body, hiding internals in production
//!
//! # Design Decisions
//! - Runs once per request, as a middleware wrapping everything that can fail
//! - Unknown failures become `INTERNAL/SYSTEM` 500 with a generic message
//! - 5xx bodies carry the generic message and never `details`, in every
//!   environment
//! - Bare non-JSON error responses from inner transport layers (body limit,
//!   timeout, router) are classified too, so no client sees an
//!   unclassified error

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::classified::ClassifiedError;
use super::failure::{
    CredentialError, Failure, FieldIssue, PendingFailure, PersistenceError, Rejection,
};
use super::messages::{self, keys};
use super::taxonomy::{ErrorModule, ErrorSource, ErrorType};
use crate::config::Environment;
use crate::http::request::RequestIdExt;
use crate::observability::metrics;

lazy_static! {
    /// `/some/path/file.rs:12:5` style fragments.
    static ref PATH_LOCATION: Regex = Regex::new(r"/[^:\s]+:\d+:\d+").expect("static regex");
}

/// Client-facing error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ErrorModule>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Request facts the translator logs alongside a failure.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub request_id: String,
}

/// Maps failures to classified errors and renders them.
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    environment: Environment,
}

impl Translator {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Map a failure onto the taxonomy. Pure; does not log.
    pub fn classify(failure: &Failure) -> ClassifiedError {
        match failure {
            Failure::Classified(err) => err.clone(),

            Failure::Persistence(PersistenceError::InvalidId { value }) => {
                ClassifiedError::registered(
                    ErrorType::NotFound,
                    ErrorModule::Database,
                    keys::RESOURCE_NOT_FOUND,
                    StatusCode::NOT_FOUND,
                )
                .with_origin(ErrorSource::method(ErrorModule::Database, "find_by_id"))
                .with_detail("id", value.clone())
            }

            Failure::Persistence(PersistenceError::DuplicateKey { key_value }) => {
                let field = key_value.keys().next().cloned();
                let key = match field.as_deref() {
                    Some("email") => keys::DUPLICATE_EMAIL,
                    _ => keys::DUPLICATE_KEY,
                };
                let err = ClassifiedError::registered(
                    ErrorType::Conflict,
                    ErrorModule::Database,
                    key,
                    StatusCode::CONFLICT,
                )
                .with_origin(ErrorSource::method(ErrorModule::Database, "create"));
                match field {
                    Some(field) => err.with_detail("field", field),
                    None => err,
                }
            }

            Failure::Persistence(PersistenceError::Schema { errors }) => {
                ClassifiedError::registered(
                    ErrorType::Validation,
                    ErrorModule::Database,
                    keys::INVALID_DATA,
                    StatusCode::BAD_REQUEST,
                )
                .with_origin(ErrorSource::method(ErrorModule::Database, "validate"))
                .with_detail("details", issue_messages(errors))
            }

            Failure::InputValidation(err) => ClassifiedError::registered(
                ErrorType::Validation,
                ErrorModule::System,
                keys::INVALID_INPUT,
                StatusCode::BAD_REQUEST,
            )
            .with_origin(ErrorSource::method(ErrorModule::System, "validate"))
            .with_detail("details", issue_messages(&err.issues)),

            Failure::Credential(kind) => {
                let key = match kind {
                    CredentialError::Malformed => keys::INVALID_TOKEN,
                    CredentialError::Expired => keys::TOKEN_EXPIRED,
                };
                ClassifiedError::registered(
                    ErrorType::Authentication,
                    ErrorModule::Auth,
                    key,
                    StatusCode::UNAUTHORIZED,
                )
                .with_origin(ErrorSource::method(ErrorModule::Auth, "verify"))
            }

            Failure::Rejected(Rejection { status }) => {
                let status = *status;
                if status == StatusCode::PAYLOAD_TOO_LARGE {
                    payload_too_large()
                } else if status == StatusCode::REQUEST_TIMEOUT {
                    ClassifiedError::registered(
                        ErrorType::Internal,
                        ErrorModule::System,
                        keys::REQUEST_TIMEOUT,
                        status,
                    )
                    .with_origin(ErrorSource::new(ErrorModule::System))
                } else if status.is_server_error() {
                    internal_error()
                } else {
                    ClassifiedError::registered(
                        ErrorType::Validation,
                        ErrorModule::System,
                        keys::REQUEST_REJECTED,
                        status,
                    )
                    .with_origin(ErrorSource::new(ErrorModule::System))
                }
            }

            Failure::Unexpected(_) => internal_error(),
        }
    }

    /// Render the wire body for an already classified error.
    pub fn render(&self, err: &ClassifiedError, stack: Option<String>) -> ErrorBody {
        let production = self.environment.is_production();
        let server_error = err.status_code.is_server_error();

        let message = if server_error {
            messages::resolve(ErrorModule::System, ErrorType::Internal, keys::SERVER_ERROR)
                .to_string()
        } else if production {
            PATH_LOCATION.replace_all(&err.message, "").into_owned()
        } else {
            err.message.clone()
        };

        ErrorBody {
            status: err.status().to_string(),
            error_type: err.error_type,
            module: (!production).then_some(err.module),
            message,
            source: if production { None } else { err.origin.clone() },
            details: if server_error { None } else { err.details.clone() },
            stack: if production { None } else { stack },
        }
    }

    /// Classify, log and render a failure into a response.
    pub fn translate(&self, failure: &Failure, ctx: &RequestContext) -> Response {
        let err = Self::classify(failure);
        let stack = failure.stack();

        if err.status_code.is_server_error() {
            tracing::error!(
                error_type = %err.error_type,
                module = %err.module,
                name = failure.name(),
                message = %failure,
                stack = %stack,
                path = %ctx.path,
                method = %ctx.method,
                request_id = %ctx.request_id,
                "Request failed"
            );
        } else {
            tracing::warn!(
                error_type = %err.error_type,
                module = %err.module,
                name = failure.name(),
                message = %failure,
                path = %ctx.path,
                method = %ctx.method,
                request_id = %ctx.request_id,
                "Request rejected"
            );
        }
        metrics::record_error(err.error_type, err.status_code.as_u16());

        let body = self.render(&err, Some(stack));
        (err.status_code, Json(body)).into_response()
    }
}

/// The generic 500 every unrecognized failure collapses into.
#[track_caller]
pub fn internal_error() -> ClassifiedError {
    ClassifiedError::registered(
        ErrorType::Internal,
        ErrorModule::System,
        keys::SERVER_ERROR,
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .with_origin(ErrorSource::new(ErrorModule::System))
    .non_operational()
}

/// A body over the configured byte limit.
#[track_caller]
pub fn payload_too_large() -> ClassifiedError {
    ClassifiedError::registered(
        ErrorType::Validation,
        ErrorModule::Security,
        keys::PAYLOAD_TOO_LARGE,
        StatusCode::PAYLOAD_TOO_LARGE,
    )
    .with_origin(ErrorSource::method(ErrorModule::Security, "body_limit"))
}

fn issue_messages(issues: &[FieldIssue]) -> Value {
    Value::Array(
        issues
            .iter()
            .map(|issue| Value::String(issue.message.clone()))
            .collect(),
    )
}

/// Middleware that turns pending failures into classified responses.
///
/// Headers set by inner layers (cookies, CSRF token) survive the rewrite.
pub async fn translate_failures(
    State(translator): State<Arc<Translator>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        request_id: request.request_id().unwrap_or("unknown").to_string(),
    };

    let mut response = next.run(request).await;
    let failure = match response.extensions_mut().remove::<PendingFailure>() {
        Some(PendingFailure(failure)) => failure,
        None => match bare_rejection(&response) {
            Some(rejection) => Arc::new(Failure::from(rejection)),
            None => return response,
        },
    };

    let mut translated = translator.translate(&failure, &ctx);
    carry_headers(response.headers(), translated.headers_mut());
    translated
}

/// An error status that did not come through [`Failure`] and has no JSON body.
fn bare_rejection(response: &Response) -> Option<Rejection> {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return None;
    }
    let json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    (!json).then_some(Rejection { status })
}

fn carry_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}
