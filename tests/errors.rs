//! Error translation over HTTP.

use ingress_guard::config::Environment;
use ingress_guard::error::{ErrorBody, ErrorModule, ErrorType};
use serde_json::json;

mod common;

#[tokio::test]
async fn test_unknown_route_is_classified() {
    let server = common::spawn_server(common::test_config(Environment::Development)).await;

    let res = common::client()
        .delete(server.url("/nowhere"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert!(res.headers().contains_key("x-request-id"));

    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.error_type, ErrorType::NotFound);
    assert_eq!(body.module, Some(ErrorModule::System));
    assert_eq!(body.message, "Route not found");
    assert_eq!(body.details.unwrap()["path"], "/nowhere");
    let source = body.source.unwrap();
    assert_eq!(source.module, ErrorModule::System);
    assert_eq!(source.method.as_deref(), Some("DELETE"));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_persistence_failures_are_mapped() {
    let server = common::spawn_server(common::test_config(Environment::Development)).await;
    let client = common::client();

    let res = client.get(server.url("/users/abc")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.module, Some(ErrorModule::Database));
    assert_eq!(body.message, "Resource not found");

    let res = client.post(server.url("/users")).send().await.unwrap();
    assert_eq!(res.status(), 409);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.error_type, ErrorType::Conflict);
    assert_eq!(body.details.unwrap()["field"], "email");

    let res = client
        .post(server.url("/users/validate"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(
        body.details.unwrap()["details"],
        json!(["Invalid email", "Age must be positive"])
    );

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_unexpected_failure_is_opaque() {
    let server = common::spawn_server(common::test_config(Environment::Development)).await;

    let res = common::client()
        .get(server.url("/boom"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.status, "error");
    assert_eq!(body.error_type, ErrorType::Internal);
    assert_eq!(body.message, "Internal server error");
    assert!(body.details.is_none());
    assert!(!body.message.contains("db.rs"));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_production_hides_internals() {
    let server = common::spawn_server(common::test_config(Environment::Production)).await;
    let client = common::client();

    let res = client
        .post(server.url("/users/validate"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: ErrorBody = res.json().await.unwrap();
    assert!(body.module.is_none());
    assert!(body.source.is_none());
    assert!(body.stack.is_none());
    assert!(body.details.is_some());

    let res = client.get(server.url("/boom")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    let raw = res.text().await.unwrap();
    assert!(!raw.contains("stack"));
    assert!(!raw.contains("/srv/app"));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_transport_rejections_are_classified() {
    let mut config = common::test_config(Environment::Development);
    config.pipeline.max_body_bytes = 16;
    let server = common::spawn_server(config).await;
    let client = common::client();

    let res = client
        .post(server.url("/echo"))
        .json(&json!({ "name": "far more than sixteen bytes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.status, "fail");
    assert_eq!(body.error_type, ErrorType::Validation);
    assert_eq!(body.module, Some(ErrorModule::Security));
    assert_eq!(body.message, "Request payload is too large");

    let res = client.get(server.url("/echo")).send().await.unwrap();
    assert_eq!(res.status(), 405);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.message, "Request rejected");

    server.shutdown.trigger();
}
