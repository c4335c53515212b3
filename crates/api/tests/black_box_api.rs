use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use claimgate_api::app::catalog;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let engine = catalog::default_config()
            .with_hs256_secret(JWT_SECRET)
            .build()
            .expect("default catalog must build");
        let app = claimgate_api::app::build_app(Arc::new(engine)).expect("router must build");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, role: &str, extra: Value, lifetime: ChronoDuration) -> String {
    let now = Utc::now();
    let mut claims = json!({
        "sub": "user-123",
        "iat": (now - ChronoDuration::minutes(20)).timestamp(),
        "exp": (now + lifetime).timestamp(),
        "role": role,
    });
    if let Value::Object(extra) = extra {
        claims.as_object_mut().unwrap().extend(extra);
    }

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn token(role: &str, extra: Value) -> String {
    mint_jwt(JWT_SECRET, role, extra, ChronoDuration::minutes(10))
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()["www-authenticate"], "Bearer");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn forged_token_is_unauthorized() {
    let srv = TestServer::spawn().await;
    let forged = mint_jwt("wrong-secret", "Admin", json!({}), ChronoDuration::minutes(10));

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_reported_distinctly() {
    let srv = TestServer::spawn().await;
    let expired = mint_jwt(JWT_SECRET, "Admin", json!({}), ChronoDuration::minutes(-5));

    let res = reqwest::Client::new()
        .get(srv.url("/users"))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(
        res.headers()["www-authenticate"]
            .to_str()
            .unwrap()
            .contains("invalid_token")
    );
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "token_expired");
}

#[tokio::test]
async fn whoami_reflects_token_claims() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token("Employee", json!({"country": "PT"})))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["subject"], "user-123");
    assert_eq!(body["roles"], json!(["Employee"]));
    assert_eq!(body["attributes"], json!(["country"]));
}

#[tokio::test]
async fn anonymous_registration_ignores_bad_tokens() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/users/register"))
        .json(&json!({"email": "new@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let res = client
        .post(srv.url("/users/register"))
        .bearer_auth("not-a-token")
        .json(&json!({"email": "new@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn role_requirement_is_any_of() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for (role, expected) in [
        ("Admin", StatusCode::CREATED),
        ("Manager", StatusCode::CREATED),
        ("Employee", StatusCode::FORBIDDEN),
        ("admin", StatusCode::FORBIDDEN),
    ] {
        let res = client
            .post(srv.url("/products"))
            .bearer_auth(token(role, json!({})))
            .json(&json!({"name": "Widget"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected, "role {role}");
    }

    // GET on the same path is open to any authenticated principal.
    let res = client
        .get(srv.url("/products"))
        .bearer_auth(token("Employee", json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn role_and_policy_must_both_pass() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/employees"))
        .bearer_auth(token("Manager", json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    // Denial details stay server-side.
    assert_eq!(body["message"], "access denied");

    let res = client
        .get(srv.url("/employees"))
        .bearer_auth(token("Manager", json!({"country": "IE"})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["country"], "IE");
}

#[tokio::test]
async fn library_requires_adult() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/library/items"))
        .bearer_auth(token("Member", json!({"date_of_birth": "1985-02-14"})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/library/items"))
        .bearer_auth(token("Member", json!({"date_of_birth": "2019-02-14"})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn explain_endpoint_is_admin_only() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/authz/explain/employees.list"))
        .bearer_auth(token("Employee", json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url("/authz/explain/employees.list"))
        .bearer_auth(token("Admin", json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["decision"]["outcome"], "deny");
    assert_eq!(body["decision"]["reason"], "policy_mismatch");

    let res = client
        .get(srv.url("/authz/explain/nope"))
        .bearer_auth(token("Admin", json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn router_refuses_unknown_guarded_operation() {
    let mut config = catalog::default_config().with_hs256_secret(JWT_SECRET);
    config.operations.retain(|op| op.name != catalog::LIBRARY_LIST);
    let engine = config.build().unwrap();

    let err = claimgate_api::app::build_app(Arc::new(engine)).unwrap_err();
    assert_eq!(
        err,
        claimgate_api::app::AppError::UnregisteredOperation(catalog::LIBRARY_LIST.to_string())
    );
}

#[tokio::test]
async fn bearer_scheme_is_case_insensitive() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .header("authorization", format!("bearer {}", token("Employee", json!({}))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
