//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    extract::Path,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ingress_guard::auth::AuthenticatedUser;
use ingress_guard::config::{Environment, GuardConfig};
use ingress_guard::error::{Failure, FieldIssue, InputValidationError, PersistenceError};
use ingress_guard::http::{require_auth, restrict_to, AllowedRoles, Screened};
use ingress_guard::{HttpServer, Shutdown};

pub const JWT_SECRET: &str = "integration-secret";

/// Config for a test server: no DNS, no CSRF, known secret.
pub fn test_config(environment: Environment) -> GuardConfig {
    let mut config = GuardConfig::default();
    config.environment = environment;
    config.csrf.enabled = Some(false);
    config.ssrf.resolve_dns = false;
    config.auth.jwt_secret = JWT_SECRET.to_string();
    config
}

async fn echo(Extension(screened): Extension<Screened>) -> Json<Value> {
    Json(screened.0.body.clone())
}

async fn find_user(Path(id): Path<String>) -> Result<Json<Value>, Failure> {
    if id == "1" {
        Ok(Json(serde_json::json!({ "id": id })))
    } else {
        Err(PersistenceError::InvalidId { value: id }.into())
    }
}

async fn create_user() -> Result<Json<Value>, Failure> {
    let mut key_value = Map::new();
    key_value.insert("email".into(), Value::String("taken@example.com".into()));
    Err(PersistenceError::DuplicateKey { key_value }.into())
}

async fn validate_user() -> Result<Json<Value>, Failure> {
    Err(InputValidationError {
        issues: vec![
            FieldIssue::new("email", "Invalid email"),
            FieldIssue::new("age", "Age must be positive"),
        ],
    }
    .into())
}

async fn boom() -> Result<Json<Value>, Failure> {
    Err(anyhow::anyhow!("connection reset by db at /srv/app/db.rs:88:13").into())
}

async fn me(Extension(user): Extension<AuthenticatedUser>) -> Json<AuthenticatedUser> {
    Json(user)
}

/// Business routes standing in for an embedding application.
pub fn demo_routes(server: &HttpServer) -> Router {
    let admin = Router::new()
        .route("/admin", get(|| async { "welcome" }))
        .route_layer(middleware::from_fn_with_state(
            AllowedRoles::new(["admin"]),
            restrict_to,
        ))
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(server.verifier(), require_auth));

    Router::new()
        .route("/echo", post(echo))
        .route("/users/{id}", get(find_user))
        .route("/users", post(create_user))
        .route("/users/validate", post(validate_user))
        .route("/boom", get(boom))
        .merge(admin)
}

/// A guard server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server with the demo routes.
pub async fn spawn_server(config: GuardConfig) -> TestServer {
    spawn_server_with_updates(config).await.0
}

/// Start a server and keep the sender feeding it configuration reloads.
pub async fn spawn_server_with_updates(
    config: GuardConfig,
) -> (TestServer, mpsc::UnboundedSender<GuardConfig>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let routes = demo_routes(&server);
    let server = server.with_routes(routes);

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (updates_tx, config_updates) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    (TestServer { addr, shutdown }, updates_tx)
}

/// Non-pooled client that ignores system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Like [`client`], keeping cookies between requests.
pub fn client_with_cookies() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .cookie_store(true)
        .build()
        .unwrap()
}
