//! Minimal cookie session.
//!
//! Only the session id matters to the guard: it keys the CSRF token store.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "sid";

/// The session attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    fn mint() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

/// Session id from the `Cookie` headers, if one is present and well formed.
pub fn session_id_from_cookies(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| {
            !value.is_empty()
                && value.len() <= 128
                && value
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}

/// Attach a [`Session`], minting one and setting the cookie when absent.
pub async fn session_layer(mut request: Request<Body>, next: Next) -> Response {
    let (session, minted) = match session_id_from_cookies(request.headers()) {
        Some(id) => (Session::new(id), false),
        None => (Session::mint(), true),
    };
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if minted {
        let cookie = format!(
            "{SESSION_COOKIE}={}; HttpOnly; SameSite=Strict; Path=/",
            session.id
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Session cookie not encodable"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    async fn whoami(Extension(session): Extension<Session>) -> String {
        session.id
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(whoami))
            .layer(middleware::from_fn(session_layer))
    }

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sid=abc-123; other=1"),
        );
        assert_eq!(session_id_from_cookies(&headers), Some("abc-123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("sid=a b"));
        assert_eq!(session_id_from_cookies(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("sid="));
        assert_eq!(session_id_from_cookies(&headers), None);
    }

    #[tokio::test]
    async fn test_mints_session_and_sets_cookie() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("sid="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
    }

    #[tokio::test]
    async fn test_reuses_existing_session() {
        let response = app()
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, "sid=existing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"existing");
    }
}
