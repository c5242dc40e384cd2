//! Screening middleware.
//!
//! # Data Flow
//! ```text
//! Request
//!     → buffer body (bounded), decode JSON / form into a tree
//!     → decode query string, collect matched path params and session
//!     → SecurityPipeline::screen
//!         Err → classified failure (translated by the outer layer)
//!         Ok  → rewrite query / body with the sanitized trees
//!     → handler (sanitized view available as `Screened`)
//!     → safe method with a session: issue a fresh CSRF token header
//! ```
//!
//! # Design Decisions
//! - Installed as a route layer so matched path params are visible
//! - The URI and body are only rebuilt when sanitization changed them
//! - Opaque bodies are forwarded byte for byte

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, RawPathParams, State},
    http::{header, request::Parts, HeaderValue, Method, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::sync::Arc;

use crate::error::{payload_too_large, Failure, InputValidationError};
use crate::http::session::Session;
use crate::payload::query;
use crate::payload::view::{BodyKind, RequestView};
use crate::security::csrf::is_safe_method;
use crate::security::SecurityPipeline;

/// The sanitized view of the current request.
#[derive(Debug, Clone)]
pub struct Screened(pub Arc<RequestView>);

/// State shared by every screened route.
#[derive(Clone)]
pub struct Screening {
    pipeline: Arc<SecurityPipeline>,
    max_body_bytes: usize,
}

impl Screening {
    pub fn new(pipeline: Arc<SecurityPipeline>, max_body_bytes: usize) -> Self {
        Self {
            pipeline,
            max_body_bytes,
        }
    }

    pub fn pipeline(&self) -> &Arc<SecurityPipeline> {
        &self.pipeline
    }
}

/// Run the security pipeline over the request.
pub async fn screen_request(
    State(screening): State<Screening>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, screening.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) if exceeds_limit(&e) => return payload_too_large().into_response(),
        Err(e) => {
            return Failure::from(InputValidationError::single("body", e.to_string()))
                .into_response()
        }
    };

    let kind = BodyKind::from_headers(&parts.headers);
    let view = match build_view(&mut parts, kind, &bytes).await {
        Ok(view) => view,
        Err(e) => return Failure::from(e).into_response(),
    };

    let screened = match screening.pipeline.screen(&view).await {
        Ok(screened) => screened,
        Err(err) => return err.into_response(),
    };

    if screened.query != view.query {
        if let Some(uri) = replace_query(&parts.uri, &screened.query) {
            parts.uri = uri;
        }
    }

    let body = match (screened.body != view.body)
        .then(|| kind.encode(&screened.body))
        .flatten()
    {
        Some(encoded) => {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(encoded.len()));
            Body::from(encoded)
        }
        None => Body::from(bytes),
    };

    let method = parts.method.clone();
    let session = screened.session.clone();
    parts.extensions.insert(Screened(Arc::new(screened)));

    let mut response = next.run(Request::from_parts(parts, body)).await;
    issue_csrf_token(&screening, &method, session, &mut response).await;
    response
}

/// Bodies without a `Content-Length` only hit the limit while streaming.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

async fn build_view(
    parts: &mut Parts,
    kind: BodyKind,
    bytes: &Bytes,
) -> Result<RequestView, InputValidationError> {
    let body = kind.decode(bytes)?;
    let query = query::parse(parts.uri.query().unwrap_or_default());
    let path_params = match RawPathParams::from_request_parts(parts, &()).await {
        Ok(raw) => RequestView::params_tree(&raw),
        Err(_) => Value::Object(Map::new()),
    };

    let mut view = RequestView::new(parts.method.clone())
        .with_query(query)
        .with_body(body)
        .with_path_params(path_params)
        .with_headers(parts.headers.clone());
    if let Some(session) = parts.extensions.get::<Session>() {
        view = view.with_session(session.clone());
    }
    Ok(view)
}

fn replace_query(uri: &Uri, query: &Value) -> Option<Uri> {
    let encoded = query::encode(query);
    let path_and_query = if encoded.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), encoded)
    };
    let mut uri_parts = uri.clone().into_parts();
    uri_parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(uri_parts).ok()
}

async fn issue_csrf_token(
    screening: &Screening,
    method: &Method,
    session: Option<Session>,
    response: &mut Response,
) {
    let (Some(csrf), Some(session)) = (screening.pipeline.csrf(), session) else {
        return;
    };
    if !is_safe_method(method) {
        return;
    }

    match csrf.generate_token(&session.id).await {
        Ok(token) => match HeaderValue::from_str(&token) {
            Ok(value) => {
                response
                    .headers_mut()
                    .insert(csrf.header_name().clone(), value);
            }
            Err(e) => tracing::error!(error = %e, "CSRF token not encodable"),
        },
        Err(e) => tracing::error!(error = %e, session_id = %session.id, "CSRF token issue failed"),
    }
}
