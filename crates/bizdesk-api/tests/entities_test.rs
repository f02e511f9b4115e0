//! Entity API integration tests, including file reference tracking.
//!
//! Run with: `cargo test -p bizdesk-api --test entities_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use axum::http::StatusCode;
use bizdesk_api::auth::UserRole;
use helpers::auth::{token_for, TEST_MASTER_API_KEY};
use helpers::{setup_test_app, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

fn bearer() -> String {
    format!("Bearer {}", TEST_MASTER_API_KEY)
}

async fn upload_text(app: &TestApp, name: &str) -> Value {
    let response = app
        .upload(TEST_MASTER_API_KEY, name, "text/plain", name.as_bytes().to_vec())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

async fn get_file(app: &TestApp, id: &str) -> (StatusCode, Value) {
    let response = app
        .client()
        .get(&format!("/api/v1/files/{}", id))
        .add_header("Authorization", bearer())
        .await;
    let status = response.status_code();
    let body = if status == StatusCode::OK {
        response.json()
    } else {
        Value::Null
    };
    (status, body)
}

#[tokio::test]
async fn test_entity_lifecycle() {
    let app = setup_test_app().await;
    let client = app.client();

    let created = client
        .post("/api/v1/entities/contacts")
        .add_header("Authorization", bearer())
        .json(&json!({ "name": "Ada", "city": "Lyon" }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let contact: Value = created.json();
    let id = contact["id"].as_str().unwrap().to_string();
    assert_eq!(contact["table"], "contacts");
    assert_eq!(contact["data"]["name"], "Ada");

    let merged: Value = client
        .patch(&format!("/api/v1/entities/contacts/{}", id))
        .add_header("Authorization", bearer())
        .json(&json!({ "city": "Paris", "phone": "0102030405" }))
        .await
        .json();
    assert_eq!(merged["data"]["name"], "Ada");
    assert_eq!(merged["data"]["city"], "Paris");
    assert_eq!(merged["data"]["phone"], "0102030405");

    let replaced: Value = client
        .put(&format!("/api/v1/entities/contacts/{}", id))
        .add_header("Authorization", bearer())
        .json(&json!({ "name": "Grace" }))
        .await
        .json();
    assert_eq!(replaced["data"], json!({ "name": "Grace" }));

    let listed: Vec<Value> = client
        .get("/api/v1/entities/contacts")
        .add_header("Authorization", bearer())
        .await
        .json();
    assert_eq!(listed.len(), 1);

    let deleted = client
        .delete(&format!("/api/v1/entities/contacts/{}", id))
        .add_header("Authorization", bearer())
        .await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);

    let missing = client
        .get(&format!("/api/v1/entities/contacts/{}", id))
        .add_header("Authorization", bearer())
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_documents_are_rejected() {
    let app = setup_test_app().await;
    let client = app.client();

    let bad_table = client
        .post("/api/v1/entities/Bad-Table")
        .add_header("Authorization", bearer())
        .json(&json!({ "a": 1 }))
        .await;
    assert_eq!(bad_table.status_code(), StatusCode::BAD_REQUEST);

    let not_object = client
        .post("/api/v1/entities/invoices")
        .add_header("Authorization", bearer())
        .json(&json!([1, 2, 3]))
        .await;
    assert_eq!(not_object.status_code(), StatusCode::BAD_REQUEST);

    let unknown = client
        .put(&format!("/api/v1/entities/invoices/{}", Uuid::new_v4()))
        .add_header("Authorization", bearer())
        .json(&json!({ "a": 1 }))
        .await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tokens_attach_and_release_files() {
    let app = setup_test_app().await;
    let client = app.client();

    let scan = upload_text(&app, "scan.txt").await;
    let receipt = upload_text(&app, "receipt.txt").await;
    let scan_id = scan["id"].as_str().unwrap();
    let receipt_id = receipt["id"].as_str().unwrap();

    let invoice: Value = client
        .post("/api/v1/entities/invoices")
        .add_header("Authorization", bearer())
        .json(&json!({
            "number": "F-2026-001",
            "attachments": [scan["token"], { "note": format!("see {}", receipt["token"].as_str().unwrap()) }]
        }))
        .await
        .json();
    let invoice_ref = format!("invoices/{}", invoice["id"].as_str().unwrap());

    let (_, scan_file) = get_file(&app, scan_id).await;
    assert_eq!(scan_file["status"], "referenced");
    assert_eq!(scan_file["entity_refs"], json!([invoice_ref]));
    assert!(scan_file["referenced_at"].is_string());

    // Dropping the scan releases it; the receipt stays attached.
    client
        .put(&format!("/api/v1/entities/invoices/{}", invoice["id"].as_str().unwrap()))
        .add_header("Authorization", bearer())
        .json(&json!({ "number": "F-2026-001", "attachments": [receipt["token"]] }))
        .await
        .assert_status_ok();

    let (status, _) = get_file(&app, scan_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, receipt_file) = get_file(&app, receipt_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt_file["entity_refs"], json!([invoice_ref]));

    // Deleting the document releases what is left.
    client
        .delete(&format!("/api/v1/entities/invoices/{}", invoice["id"].as_str().unwrap()))
        .add_header("Authorization", bearer())
        .await;
    let (status, _) = get_file(&app, receipt_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shared_file_survives_until_last_reference() {
    let app = setup_test_app().await;
    let client = app.client();

    let logo = upload_text(&app, "logo.txt").await;
    let logo_id = logo["id"].as_str().unwrap();

    let mut ids = Vec::new();
    for table in ["quotes", "invoices"] {
        let entity: Value = client
            .post(&format!("/api/v1/entities/{}", table))
            .add_header("Authorization", bearer())
            .json(&json!({ "logo": logo["token"] }))
            .await
            .json();
        ids.push((table, entity["id"].as_str().unwrap().to_string()));
    }

    let (_, file) = get_file(&app, logo_id).await;
    assert_eq!(file["entity_refs"].as_array().unwrap().len(), 2);

    let (table, id) = &ids[0];
    client
        .delete(&format!("/api/v1/entities/{}/{}", table, id))
        .add_header("Authorization", bearer())
        .await;
    let (status, file) = get_file(&app, logo_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(file["entity_refs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reconcile_restores_reference_sets() {
    let app = setup_test_app().await;
    let client = app.client();

    let file = upload_text(&app, "contract.txt").await;
    let file_id = Uuid::parse_str(file["id"].as_str().unwrap()).unwrap();
    client
        .post("/api/v1/entities/contracts")
        .add_header("Authorization", bearer())
        .json(&json!({ "pdf": file["token"] }))
        .await
        .assert_status(StatusCode::CREATED);

    sqlx::query("UPDATE files SET entity_refs = '{}' WHERE id = $1")
        .bind(file_id)
        .execute(app.pool())
        .await
        .unwrap();

    let member = token_for(bizdesk_core::constants::DEFAULT_TENANT_ID, UserRole::Member);
    let forbidden = client
        .post("/api/v1/files/reconcile")
        .add_header("Authorization", format!("Bearer {}", member))
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let report: Value = client
        .post("/api/v1/files/reconcile")
        .add_header("Authorization", bearer())
        .await
        .json();
    assert_eq!(report["entities_scanned"], 1);
    assert_eq!(report["files_updated"], 1);

    let (_, restored) = get_file(&app, &file_id.to_string()).await;
    assert_eq!(restored["status"], "referenced");
}
