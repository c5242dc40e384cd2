//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router around embedder routes
//! - Wire up middleware (tracing, request ID, limits, error translation,
//!   session, screening)
//! - Start the CSRF token sweeper
//! - Apply pattern table reloads
//! - Serve until shutdown, draining in-flight requests

use axum::{
    http::{Method, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{JwtVerifier, TokenVerifier};
use crate::config::GuardConfig;
use crate::error::messages::keys;
use crate::error::{
    translate_failures, ClassifiedError, ErrorModule, ErrorSource, ErrorType, Translator,
};
use crate::http::middleware::{screen_request, Screening};
use crate::http::request::RequestIdLayer;
use crate::http::session::session_layer;
use crate::security::csrf::TokenSweeper;
use crate::security::{PatternSet, SecurityPipeline};

/// Failures building the server from a configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid detector pattern: {0}")]
    Patterns(#[from] regex::Error),
}

/// HTTP server guarding the embedder's routes.
pub struct HttpServer {
    config: GuardConfig,
    pipeline: Arc<SecurityPipeline>,
    translator: Arc<Translator>,
    verifier: Arc<dyn TokenVerifier>,
    routes: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GuardConfig) -> Result<Self, ServerError> {
        let pipeline = Arc::new(SecurityPipeline::from_config(&config)?);
        let translator = Arc::new(Translator::new(config.environment));
        let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtVerifier::new(&config.auth.jwt_secret));

        tracing::info!(
            environment = config.environment.as_str(),
            csrf = pipeline.csrf().is_some(),
            ssrf = config.ssrf.enabled,
            "Security pipeline ready"
        );

        Ok(Self {
            config,
            pipeline,
            translator,
            verifier,
            routes: Router::new(),
        })
    }

    /// Attach business routes. They run behind the full screening stack.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Verifier for use with [`require_auth`](crate::http::middleware::require_auth).
    pub fn verifier(&self) -> Arc<dyn TokenVerifier> {
        self.verifier.clone()
    }

    pub fn pipeline(&self) -> &Arc<SecurityPipeline> {
        &self.pipeline
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: trace → request id → error translation → timeout →
    /// body limit → session → screening → routes. The timeout and body limit
    /// sit inside translation so their bare responses get classified.
    pub fn router(&self) -> Router {
        let screening = Screening::new(self.pipeline.clone(), self.config.pipeline.max_body_bytes);

        Router::new()
            .route("/health", get(health))
            .merge(self.routes.clone())
            .route_layer(middleware::from_fn_with_state(screening, screen_request))
            .fallback(route_not_found)
            .layer(middleware::from_fn(session_layer))
            .layer(RequestBodyLimitLayer::new(self.config.pipeline.max_body_bytes))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(self.config.pipeline.request_timeout_secs),
            ))
            .layer(middleware::from_fn_with_state(
                self.translator.clone(),
                translate_failures,
            ))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(csrf) = self.pipeline.csrf() {
            let sweeper = TokenSweeper::new(
                csrf.clone(),
                Duration::from_secs(self.config.csrf.cleanup_interval_secs),
            );
            tokio::spawn(sweeper.run(shutdown.resubscribe()));
        }

        tokio::spawn(apply_reloads(
            self.pipeline.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Swap pattern tables as new configurations arrive.
///
/// Only the `[patterns]` section is live; other changes need a restart.
async fn apply_reloads(
    pipeline: Arc<SecurityPipeline>,
    mut config_updates: mpsc::UnboundedReceiver<GuardConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = config_updates.recv() => {
                let Some(config) = update else { break };
                match PatternSet::from_config(&config.patterns) {
                    Ok(set) => {
                        pipeline.patterns().swap(set);
                        tracing::info!("Detector pattern tables reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected pattern reload, keeping current tables");
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn route_not_found(method: Method, uri: Uri) -> ClassifiedError {
    ClassifiedError::registered(
        ErrorType::NotFound,
        ErrorModule::System,
        keys::ROUTE_NOT_FOUND,
        StatusCode::NOT_FOUND,
    )
    .with_origin(ErrorSource::method(ErrorModule::System, method.as_str()))
    .with_detail("path", uri.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_and_fallback() {
        let mut config = GuardConfig::default();
        config.environment = crate::config::Environment::Test;
        let app = HttpServer::new(config).unwrap().router();

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let response = app
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_body_is_classified() {
        let mut config = GuardConfig::default();
        config.environment = crate::config::Environment::Test;
        config.pipeline.max_body_bytes = 16;
        let server = HttpServer::new(config).unwrap();
        let app = server.with_routes(Router::new().route(
            "/echo",
            axum::routing::post(|body: axum::body::Bytes| async move { body }),
        ));

        let response = app
            .router()
            .oneshot(
                Request::post("/echo")
                    .header("content-type", "application/json")
                    .header("content-length", "39")
                    .body(Body::from(r#"{"name":"aaaaaaaaaaaaaaaaaaaaaaaaaaaa"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()["content-type"], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: crate::error::ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.message, "Request payload is too large");
        assert_eq!(body.module, Some(ErrorModule::Security));
    }

    #[test]
    fn test_invalid_pattern_override_is_rejected() {
        let mut config = GuardConfig::default();
        config.patterns.sql = Some(vec!["(unclosed".into()]);
        assert!(matches!(
            HttpServer::new(config),
            Err(ServerError::Patterns(_))
        ));
    }
}
