//! Statistics integration tests.
//!
//! Run with: `cargo test -p bizdesk-api --test statistics_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use axum::http::StatusCode;
use helpers::auth::TEST_MASTER_API_KEY;
use helpers::{setup_test_app, TestApp};
use serde_json::{json, Value};

fn bearer() -> String {
    format!("Bearer {}", TEST_MASTER_API_KEY)
}

async fn stat(app: &TestApp, table: &str) -> Option<Value> {
    let stats: Vec<Value> = app
        .client()
        .get("/api/v1/statistics")
        .add_header("Authorization", bearer())
        .await
        .json();
    stats.into_iter().find(|s| s["table"] == table)
}

async fn create(app: &TestApp, table: &str, data: Value) -> String {
    let entity: Value = app
        .client()
        .post(&format!("/api/v1/entities/{}", table))
        .add_header("Authorization", bearer())
        .json(&data)
        .await
        .json();
    entity["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_counts_and_sums_follow_mutations() {
    let app = setup_test_app().await;

    let first = create(&app, "invoices", json!({ "total": 100 })).await;
    create(&app, "invoices", json!({ "total": "50.5" })).await;
    create(&app, "contacts", json!({ "name": "Ada" })).await;
    // Untracked table
    create(&app, "notes", json!({ "text": "hello" })).await;

    let invoices = stat(&app, "invoices").await.expect("invoice statistics");
    assert_eq!(invoices["field"], "total");
    assert_eq!(invoices["count"], 2);
    assert_eq!(invoices["sum"].as_f64(), Some(150.5));

    let contacts = stat(&app, "contacts").await.expect("contact statistics");
    assert!(contacts["field"].is_null());
    assert_eq!(contacts["count"], 1);

    assert!(stat(&app, "notes").await.is_none());

    app.client()
        .patch(&format!("/api/v1/entities/invoices/{}", first))
        .add_header("Authorization", bearer())
        .json(&json!({ "total": 120 }))
        .await
        .assert_status_ok();
    let invoices = stat(&app, "invoices").await.unwrap();
    assert_eq!(invoices["count"], 2);
    assert_eq!(invoices["sum"].as_f64(), Some(170.5));

    app.client()
        .delete(&format!("/api/v1/entities/invoices/{}", first))
        .add_header("Authorization", bearer())
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let invoices = stat(&app, "invoices").await.unwrap();
    assert_eq!(invoices["count"], 1);
    assert_eq!(invoices["sum"].as_f64(), Some(50.5));
}

#[tokio::test]
async fn test_recompute_rebuilds_from_documents() {
    let app = setup_test_app().await;
    create(&app, "invoices", json!({ "total": 10 })).await;
    create(&app, "invoices", json!({ "total": 32 })).await;

    sqlx::query("UPDATE entity_statistics SET count = 99, sum = 0")
        .execute(app.pool())
        .await
        .unwrap();

    let response = app
        .client()
        .post("/api/v1/statistics/recompute")
        .add_header("Authorization", bearer())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let invoices = stat(&app, "invoices").await.unwrap();
    assert_eq!(invoices["count"], 2);
    assert_eq!(invoices["sum"].as_f64(), Some(42.0));
}
