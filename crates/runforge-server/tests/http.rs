// crates/runforge-server/tests/http.rs
// ============================================================================
// Module: Runforge HTTP Boundary Integration Tests
// Description: Exercises the assembled router in-process via `oneshot`.
// Purpose: Validate the create/list/get/tenant-enforcement paths spec.md
//          §4.7 describes without binding a real socket.
// Dependencies: axum, tower::ServiceExt, http-body-util, tempfile
// ============================================================================

//! ## Overview
//! Grounded on `decision-gate-mcp/src/server/tests.rs`'s in-process
//! request-handling style, adapted to axum's `Router: Service` + `oneshot`
//! idiom rather than decision-gate's raw JSON-RPC framing.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use runforge_registry::NoopAuditSink;
use runforge_registry::RunRegistry;
use runforge_secrets::SecretsManager;
use runforge_secrets::SecretsManagerConfig;
use runforge_server::routes;
use runforge_server::state::AppState;
use runforge_server::CorsConfig;
use runforge_workflow::CrawlConfig;
use runforge_workflow::ExecutorPool;
use runforge_workflow::ExplorationConfig;
use runforge_workflow::NoopTelemetry;
use runforge_workflow::RetryPolicy;
use runforge_workflow::WorkflowEngine;
use tempfile::TempDir;
use tower::ServiceExt;

fn test_state(dir: &TempDir, registry_json: &str) -> AppState {
    let audit: Arc<dyn runforge_registry::AuditSink> = Arc::new(NoopAuditSink);
    let registry = Arc::new(RunRegistry::open(dir.path().to_path_buf(), audit).expect("open registry"));
    let engine = Arc::new(WorkflowEngine::new(
        Arc::clone(&registry),
        Arc::new(NoopTelemetry),
        RetryPolicy::default(),
        ExplorationConfig::default(),
        CrawlConfig::default(),
    ));
    let pool = Arc::new(ExecutorPool::start(1, engine));
    let secrets = Arc::new(SecretsManager::new(SecretsManagerConfig {
        registry_json: Some(registry_json.to_string()),
        signing_key: Some("integration-test-key".to_string()),
        ..Default::default()
    }));
    runforge_server::build_state(registry, pool, secrets, Some("alert-token".to_string()), 3600)
}

const ACME_TOKEN_REGISTRY: &str = r#"{
    "acme-token": {"organization": "Acme", "organization_slug": "acme", "actor_role": "qa_runner"},
    "other-token": {"organization": "Other", "organization_slug": "other", "actor_role": "qa_runner"},
    "admin-token": {"organization": "Acme", "organization_slug": "acme", "actor_role": "admin"}
}"#;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("collect body").to_bytes();
    serde_json::from_slice(&bytes).expect("valid JSON body")
}

#[tokio::test]
async fn create_run_requires_a_token_when_registry_is_nonempty() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, ACME_TOKEN_REGISTRY);
    let app = routes::build(state, &CorsConfig::default());

    let request = Request::post("/runs")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"target_url": "https://example.com"}"#))
        .expect("build request");

    let response = app.oneshot(request).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_run_overwrites_slug_with_the_principals_when_unspecified() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, ACME_TOKEN_REGISTRY);
    let app = routes::build(state, &CorsConfig::default());

    let request = Request::post("/runs")
        .header("content-type", "application/json")
        .header("authorization", "Bearer acme-token")
        .body(Body::from(r#"{"target_url": "https://example.com"}"#))
        .expect("build request");

    let response = app.oneshot(request).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::CREATED);
    let run = body_json(response).await;
    assert_eq!(run["organization_slug"], "acme");
}

#[tokio::test]
async fn create_run_rejects_an_explicit_mismatched_slug() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, ACME_TOKEN_REGISTRY);
    let app = routes::build(state, &CorsConfig::default());

    let request = Request::post("/runs")
        .header("content-type", "application/json")
        .header("authorization", "Bearer acme-token")
        .body(Body::from(r#"{"target_url": "https://example.com", "organization_slug": "someone-else"}"#))
        .expect("build request");

    let response = app.oneshot(request).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn get_run_across_tenants_is_forbidden_without_read_all() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, ACME_TOKEN_REGISTRY);
    let app = routes::build(state, &CorsConfig::default());

    let create = Request::post("/runs")
        .header("content-type", "application/json")
        .header("authorization", "Bearer acme-token")
        .body(Body::from(r#"{"target_url": "https://example.com"}"#))
        .expect("build request");
    let created = app.clone().oneshot(create).await.expect("oneshot");
    let run = body_json(created).await;
    let run_id = run["id"].as_str().expect("run id").to_string();

    let get_other_tenant = Request::get(format!("/runs/{run_id}"))
        .header("authorization", "Bearer other-token")
        .body(Body::empty())
        .expect("build request");
    let response = app.clone().oneshot(get_other_tenant).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let get_admin = Request::get(format!("/runs/{run_id}"))
        .header("authorization", "Bearer admin-token")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(get_admin).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn list_runs_is_paginated_and_scoped_to_the_callers_tenant() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, ACME_TOKEN_REGISTRY);
    let app = routes::build(state, &CorsConfig::default());

    for _ in 0..3 {
        let create = Request::post("/runs")
            .header("content-type", "application/json")
            .header("authorization", "Bearer acme-token")
            .body(Body::from(r#"{"target_url": "https://example.com"}"#))
            .expect("build request");
        let response = app.clone().oneshot(create).await.expect("oneshot");
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let create_other = Request::post("/runs")
        .header("content-type", "application/json")
        .header("authorization", "Bearer other-token")
        .body(Body::from(r#"{"target_url": "https://example.com"}"#))
        .expect("build request");
    app.clone().oneshot(create_other).await.expect("oneshot");

    let list = Request::get("/runs?limit=2")
        .header("authorization", "Bearer acme-token")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(list).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["items"].as_array().expect("items array").len(), 2);
    assert_eq!(page["total"], 3);
    assert_eq!(page["next_offset"], 2);
}

#[tokio::test]
async fn download_without_a_valid_signature_is_unauthorized() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, ACME_TOKEN_REGISTRY);
    let app = routes::build(state, &CorsConfig::default());

    let request = Request::get("/runs/public/download?run_id=RUN-nonexistent&org=acme&path=report.json&expires=9999999999&signature=deadbeef")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn alert_ingestion_requires_the_configured_webhook_token() {
    let dir = TempDir::new().expect("tempdir");
    let state = test_state(&dir, ACME_TOKEN_REGISTRY);
    let app = routes::build(state, &CorsConfig::default());

    let wrong = Request::post("/observability/alerts")
        .header("content-type", "application/json")
        .header("authorization", "Bearer wrong-token")
        .body(Body::from(r#"{"kind": "budget_exceeded"}"#))
        .expect("build request");
    let response = app.clone().oneshot(wrong).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let right = Request::post("/observability/alerts")
        .header("content-type", "application/json")
        .header("authorization", "Bearer alert-token")
        .body(Body::from(r#"{"kind": "budget_exceeded"}"#))
        .expect("build request");
    let response = app.oneshot(right).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}
