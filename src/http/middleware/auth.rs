//! Authentication middleware.
//! Verifies bearer credentials and guards routes by role.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{AuthenticatedUser, TokenVerifier};
use crate::error::messages::keys;
use crate::error::{ClassifiedError, ErrorModule, ErrorSource, ErrorType, Failure};

fn invalid_token(method: &'static str) -> ClassifiedError {
    ClassifiedError::registered(
        ErrorType::Authentication,
        ErrorModule::Auth,
        keys::INVALID_TOKEN,
        StatusCode::UNAUTHORIZED,
    )
    .with_origin(ErrorSource::method(ErrorModule::Auth, method))
}

/// Require a valid `Authorization: Bearer` credential.
///
/// On success the caller is attached as an [`AuthenticatedUser`] extension.
pub async fn require_auth(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Failure> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid_token("require_auth"))?;

    let user = verifier.verify(token)?;
    tracing::debug!(user_id = %user.id, role = %user.role, "Request authenticated");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Roles admitted by [`restrict_to`].
#[derive(Debug, Clone)]
pub struct AllowedRoles(Arc<[String]>);

impl AllowedRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r == role)
    }
}

/// Admit only authenticated callers holding one of the allowed roles.
///
/// Must run inside [`require_auth`].
pub async fn restrict_to(
    State(roles): State<AllowedRoles>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ClassifiedError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| invalid_token("restrict_to"))?;

    if !roles.contains(&user.role) {
        tracing::warn!(user_id = %user.id, role = %user.role, "Role not permitted");
        return Err(ClassifiedError::registered(
            ErrorType::Authorization,
            ErrorModule::Auth,
            keys::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
        )
        .with_origin(ErrorSource::method(ErrorModule::Auth, "restrict_to")));
    }

    Ok(next.run(request).await)
}
