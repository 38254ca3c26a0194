//! HTTP API tests against the real router over in-memory stores.

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;
use integration_tests::{fixtures, setup::TestContext};
use job_queue::JobQueue;
use serde_json::{json, Value};

fn server(ctx: &TestContext) -> TestServer {
    TestServer::new(ctx.router.clone()).expect("Failed to create test server")
}

#[tokio::test]
async fn test_create_client_queues_then_applies() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server
        .post("/v1/clients")
        .json(&fixtures::client_payload("Claire.Durand@Example.com"))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "claire.durand@example.com");
    assert_eq!(body["data"]["action"], "upsert");

    // Accepted is not applied: the target is untouched until a worker runs.
    assert!(ctx.target.rows().is_empty());
    assert_eq!(ctx.queue.depth().await.unwrap(), 1);

    ctx.drain().await;
    let row = ctx.target.row("claire.durand@example.com").unwrap();
    assert_eq!(row.nom, "DURAND");
    assert_eq!(row.prenom, "Claire");
    assert_eq!(row.telephone.as_deref(), Some("04 87 65 43 21"));
    assert_eq!(row.ville.as_deref(), Some("Marseille"));
}

#[tokio::test]
async fn test_create_client_rejects_invalid_payload() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let mut payload = fixtures::client_payload("not-an-email");
    payload["statut"] = "archived".into();

    let response = server.post("/v1/clients").json(&payload).await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALID_001");
    assert!(body["errors"].as_array().is_some_and(|e| e.len() >= 2));
    assert_eq!(ctx.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_client_when_queue_is_down() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    ctx.queue.set_down(true);

    let response = server
        .post("/v1/clients")
        .json(&fixtures::client_payload("down@x.com"))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["code"], "QUEUE_001");
}

#[tokio::test]
async fn test_delete_client_tombstones_row() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let record = fixtures::canonical("gone@x.com", "GONE", Some(fixtures::at(0)));
    let id = ctx.target.seed(&record, Utc::now());

    let response = server.delete("/v1/clients/Gone@X.com").await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["data"]["email"], "gone@x.com");
    assert_eq!(body["data"]["action"], "delete");

    ctx.drain().await;
    assert!(ctx.target.row("gone@x.com").unwrap().is_tombstoned());

    server
        .get(&format!("/v1/clients/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_client_rejects_invalid_email() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    server
        .delete("/v1/clients/nobody")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(ctx.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_client_merges_and_queues() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let record = fixtures::canonical("move@x.com", "MOREAU", Some(fixtures::at(0)));
    let id = ctx.target.seed(&record, Utc::now());

    let response = server
        .put(&format!("/v1/clients/{id}"))
        .json(&json!({ "ville": "lyon", "telephone": "0611223344" }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["data"]["email"], "move@x.com");
    assert_eq!(body["data"]["action"], "upsert");

    ctx.drain().await;
    let row = ctx.target.row("move@x.com").unwrap();
    assert_eq!(row.id, id);
    assert_eq!(row.nom, "MOREAU");
    assert_eq!(row.prenom, "Test");
    assert_eq!(row.ville.as_deref(), Some("Lyon"));
    assert_eq!(row.telephone.as_deref(), Some("06 11 22 33 44"));
}

#[tokio::test]
async fn test_update_client_email_change_moves_the_row() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let record = fixtures::canonical("old@x.com", "MOREAU", Some(fixtures::at(0)));
    let id = ctx.target.seed(&record, Utc::now());

    server
        .put(&format!("/v1/clients/{id}"))
        .json(&json!({ "email": "New@X.com" }))
        .await
        .assert_status(StatusCode::ACCEPTED);
    assert_eq!(ctx.queue.depth().await.unwrap(), 2);

    ctx.drain().await;
    assert!(ctx.target.row("old@x.com").unwrap().is_tombstoned());
    assert_eq!(ctx.target.row("new@x.com").unwrap().nom, "MOREAU");
}

#[tokio::test]
async fn test_update_client_rejections() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let taken = fixtures::canonical("taken@x.com", "TAKEN", None);
    ctx.target.seed(&taken, Utc::now());
    let id = ctx
        .target
        .seed(&fixtures::canonical("mine@x.com", "MINE", None), Utc::now());

    server
        .put("/v1/clients/9999")
        .json(&json!({ "ville": "lyon" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = server
        .put(&format!("/v1/clients/{id}"))
        .json(&json!({ "statut": "archived" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_001");

    server
        .put(&format!("/v1/clients/{id}"))
        .json(&json!({ "email": "Taken@x.com" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(ctx.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_numeric_id_uses_error_envelope() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server.get("/v1/clients/abc").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALID_001");

    server
        .put("/v1/clients/abc")
        .json(&json!({ "ville": "lyon" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_show_and_search() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let now = Utc::now();

    let mut inactive = fixtures::canonical("b@x.com", "BERNARD", None);
    inactive.statut = "inactive".into();
    let first = ctx
        .target
        .seed(&fixtures::canonical("a@x.com", "ARNAUD", None), now);
    ctx.target.seed(&inactive, now);

    let response = server.get("/v1/clients").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["per_page"], 15);
    // Newest first; equal timestamps fall back to id.
    assert_eq!(body["data"]["data"][0]["email"], "b@x.com");

    let response = server
        .get("/v1/clients")
        .add_query_param("statut", "inactive")
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["data"][0]["nom"], "BERNARD");

    server
        .get("/v1/clients")
        .add_query_param("statut", "archived")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server.get(&format!("/v1/clients/{first}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["email"], "a@x.com");

    let response = server
        .get("/v1/clients/search")
        .add_query_param("q", "arn")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let results = body["data"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["email"], "a@x.com");

    server
        .get("/v1/clients/search")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/v1/clients/9999")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_etl_run() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    ctx.source.set_rows(fixtures::recent_raws(4));

    let response = server.post("/v1/etl/run").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["enqueued"], 4);
    assert_eq!(ctx.queue.depth().await.unwrap(), 4);
}

#[tokio::test]
async fn test_stats() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    ctx.source.set_rows(fixtures::recent_raws(3));
    ctx.orchestrator.run_once().await;
    ctx.drain().await;

    let response = server.get("/v1/stats").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let data = &body["data"];
    assert_eq!(data["clients"]["total"], 3);
    assert_eq!(data["clients"]["active"], 3);
    assert_eq!(data["queue"]["backend"], "flaky-memory");
    assert_eq!(data["queue"]["jobs_pending"], 0);
    assert_eq!(data["database"]["source_clients"], 3);
    assert_eq!(data["database"]["target_clients"], 3);

    // A source outage blanks the source count but not the endpoint.
    ctx.source.set_down(true);
    let body: Value = server.get("/v1/stats").await.json();
    assert!(body["data"]["database"]["source_clients"].is_null());
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server.get("/v1/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["source_connected"], true);
    assert_eq!(body["target_connected"], true);
    assert_eq!(body["queue_connected"], true);

    server.get("/v1/health/live").await.assert_status_ok();

    // A source outage fails the full check but not readiness.
    ctx.source.set_down(true);
    server
        .get("/v1/health")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    server.get("/v1/health/ready").await.assert_status_ok();

    ctx.target.set_down(true);
    server
        .get("/v1/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
