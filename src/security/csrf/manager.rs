//! CSRF token generation and verification.

use axum::http::{HeaderName, Method, StatusCode};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::sync::Arc;

use super::store::{StoreError, TokenRecord, TokenStore};
use crate::config::CsrfConfig;
use crate::error::{
    internal_error, messages::keys, ClassifiedError, ErrorModule, ErrorSource, ErrorType,
};
use crate::payload::RequestView;

/// Bytes of entropy per token.
const TOKEN_BYTES: usize = 32;

/// A fresh random token, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Methods that never carry state changes and skip verification.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn csrf_error(key: &str, status: StatusCode) -> ClassifiedError {
    ClassifiedError::registered(ErrorType::Csrf, ErrorModule::Security, key, status)
        .with_origin(ErrorSource::method(ErrorModule::Security, "verify_token"))
}

fn store_failure(e: StoreError) -> ClassifiedError {
    tracing::error!(error = %e, "CSRF token store failed");
    internal_error()
}

/// Saturates instead of overflowing for unvalidated configs.
fn ttl_from_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Issues and checks per-session tokens.
pub struct CsrfManager {
    store: Arc<dyn TokenStore>,
    ttl: Duration,
    header_name: HeaderName,
    body_field: String,
}

impl CsrfManager {
    pub fn new(store: Arc<dyn TokenStore>, config: &CsrfConfig) -> Self {
        let header_name = HeaderName::try_from(config.header_name.as_str())
            .unwrap_or_else(|_| HeaderName::from_static("x-csrf-token"));
        Self {
            store,
            ttl: ttl_from_secs(config.token_ttl_secs),
            header_name,
            body_field: config.body_field.clone(),
        }
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Store a new token for the session, replacing any previous one.
    pub async fn generate_token(&self, session_id: &str) -> Result<String, ClassifiedError> {
        self.generate_token_at(session_id, Utc::now()).await
    }

    pub async fn generate_token_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ClassifiedError> {
        let token = generate_token();
        self.store
            .set(TokenRecord {
                session_id: session_id.to_string(),
                token: token.clone(),
                expires_at: now
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            })
            .await
            .map_err(store_failure)?;

        tracing::debug!(session_id = %session_id, "CSRF token issued");
        Ok(token)
    }

    /// Verify the token supplied with a state-changing request.
    ///
    /// Tokens stay valid until they expire; a successful check does not
    /// consume them.
    pub async fn verify_token(&self, view: &RequestView) -> Result<(), ClassifiedError> {
        self.verify_token_at(view, Utc::now()).await
    }

    pub async fn verify_token_at(
        &self,
        view: &RequestView,
        now: DateTime<Utc>,
    ) -> Result<(), ClassifiedError> {
        if is_safe_method(&view.method) {
            return Ok(());
        }

        let session_id = match &view.session {
            Some(session) => session.id.as_str(),
            None => return Err(csrf_error(keys::NO_SESSION, StatusCode::UNAUTHORIZED)),
        };

        let record = match self.store.get(session_id).await.map_err(store_failure)? {
            Some(record) => record,
            None => return Err(csrf_error(keys::TOKEN_MISSING, StatusCode::FORBIDDEN)),
        };

        if record.is_expired(now) {
            self.store.delete(session_id).await.map_err(store_failure)?;
            return Err(csrf_error(keys::TOKEN_EXPIRED, StatusCode::FORBIDDEN));
        }

        match self.supplied_token(view) {
            Some(supplied)
                if constant_time_compare(supplied.as_bytes(), record.token.as_bytes()) =>
            {
                Ok(())
            }
            _ => Err(csrf_error(keys::TOKEN_INVALID, StatusCode::FORBIDDEN)),
        }
    }

    /// Header first, then the body field.
    fn supplied_token<'a>(&self, view: &'a RequestView) -> Option<&'a str> {
        view.headers
            .get(&self.header_name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .or_else(|| view.body.get(&self.body_field).and_then(|v| v.as_str()))
    }

    /// Remove expired tokens now.
    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        self.store.sweep(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::Session;
    use crate::security::csrf::store::InMemoryTokenStore;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn manager() -> (CsrfManager, Arc<InMemoryTokenStore>) {
        let store = Arc::new(InMemoryTokenStore::new());
        (CsrfManager::new(store.clone(), &CsrfConfig::default()), store)
    }

    fn post(session: Option<&str>) -> RequestView {
        let view = RequestView::new(Method::POST);
        match session {
            Some(id) => view.with_session(Session::new(id)),
            None => view,
        }
    }

    fn with_header(mut view: RequestView, token: &str) -> RequestView {
        view.headers
            .insert("x-csrf-token", HeaderValue::from_str(token).unwrap());
        view
    }

    #[test]
    fn test_tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_safe_methods_skip() {
        let (csrf, _) = manager();
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert!(csrf.verify_token(&RequestView::new(method)).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_failure_sequence() {
        let (csrf, _) = manager();

        let err = csrf.verify_token(&post(None)).await.unwrap_err();
        assert_eq!(err.status_code, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "No session found");
        assert_eq!(err.error_type, ErrorType::Csrf);

        let err = csrf.verify_token(&post(Some("s1"))).await.unwrap_err();
        assert_eq!(err.status_code, StatusCode::FORBIDDEN);
        assert_eq!(err.message, "No CSRF token found");

        csrf.generate_token("s1").await.unwrap();
        let err = csrf
            .verify_token(&with_header(post(Some("s1")), "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code, StatusCode::FORBIDDEN);
        assert_eq!(err.message, "Invalid CSRF token");

        let err = csrf.verify_token(&post(Some("s1"))).await.unwrap_err();
        assert_eq!(err.message, "Invalid CSRF token");
    }

    #[tokio::test]
    async fn test_header_or_body_field_and_reuse() {
        let (csrf, _) = manager();
        let token = csrf.generate_token("s1").await.unwrap();

        let by_header = with_header(post(Some("s1")), &token);
        assert!(csrf.verify_token(&by_header).await.is_ok());
        assert!(csrf.verify_token(&by_header).await.is_ok());

        let by_body = post(Some("s1")).with_body(json!({ "_csrf": token, "name": "x" }));
        assert!(csrf.verify_token(&by_body).await.is_ok());
    }

    #[tokio::test]
    async fn test_regeneration_replaces_token() {
        let (csrf, _) = manager();
        let first = csrf.generate_token("s1").await.unwrap();
        let second = csrf.generate_token("s1").await.unwrap();

        assert!(csrf.verify_token(&with_header(post(Some("s1")), &first)).await.is_err());
        assert!(csrf.verify_token(&with_header(post(Some("s1")), &second)).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_is_deleted() {
        let (csrf, store) = manager();
        let issued = Utc::now() - Duration::seconds(3600) - Duration::milliseconds(1);
        let token = csrf.generate_token_at("s1", issued).await.unwrap();
        let view = with_header(post(Some("s1")), &token);

        let err = csrf.verify_token(&view).await.unwrap_err();
        assert_eq!(err.message, "CSRF token expired");
        assert_eq!(err.status_code, StatusCode::FORBIDDEN);
        assert!(store.is_empty());

        let err = csrf.verify_token(&view).await.unwrap_err();
        assert_eq!(err.message, "No CSRF token found");
    }

    #[tokio::test]
    async fn test_cleanup_sweeps_expired() {
        let (csrf, store) = manager();
        csrf.generate_token_at("old", Utc::now() - Duration::hours(2))
            .await
            .unwrap();
        csrf.generate_token("fresh").await.unwrap();

        assert_eq!(csrf.cleanup().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unbounded_ttl_saturates() {
        let store = Arc::new(InMemoryTokenStore::new());
        let config = CsrfConfig {
            token_ttl_secs: u64::MAX,
            ..CsrfConfig::default()
        };
        let csrf = CsrfManager::new(store.clone(), &config);
        assert_eq!(csrf.ttl, Duration::MAX);

        let token = csrf.generate_token("s1").await.unwrap();
        let record = store.get("s1").await.unwrap().unwrap();
        assert_eq!(record.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(csrf.verify_token(&with_header(post(Some("s1")), &token)).await.is_ok());
    }
}
