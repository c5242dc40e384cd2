//! Bearer authentication and role guards over HTTP.

use chrono::Utc;
use ingress_guard::auth::Claims;
use ingress_guard::config::Environment;
use ingress_guard::error::{ErrorBody, ErrorModule, ErrorType};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;

mod common;

fn bearer(role: &str, exp_offset: i64) -> String {
    let claims = Claims {
        id: "42".into(),
        email: "someone@example.com".into(),
        role: role.into(),
        exp: (Utc::now().timestamp() + exp_offset) as u64,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(common::JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

#[tokio::test]
async fn test_authenticated_user_reaches_handler() {
    let server = common::spawn_server(common::test_config(Environment::Test)).await;

    let res = common::client()
        .get(server.url("/me"))
        .header("Authorization", bearer("user", 3600))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let user: Value = res.json().await.unwrap();
    assert_eq!(user["id"], "42");
    assert_eq!(user["role"], "user");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_credential_failures() {
    let server = common::spawn_server(common::test_config(Environment::Test)).await;
    let client = common::client();

    let res = client.get(server.url("/me")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.error_type, ErrorType::Authentication);
    assert_eq!(body.module, Some(ErrorModule::Auth));
    assert_eq!(body.message, "Invalid authentication token");

    let res = client
        .get(server.url("/me"))
        .header("Authorization", bearer("user", -120))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.message, "Authentication token has expired");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_role_restriction() {
    let server = common::spawn_server(common::test_config(Environment::Test)).await;
    let client = common::client();

    let res = client
        .get(server.url("/admin"))
        .header("Authorization", bearer("user", 3600))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.error_type, ErrorType::Authorization);

    let res = client
        .get(server.url("/admin"))
        .header("Authorization", bearer("admin", 3600))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "welcome");

    server.shutdown.trigger();
}
