//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub use keyledger::activation::{ActivationRequest, ActivationService};
pub use keyledger::audit::ActivationLog;
pub use keyledger::config::Config;
pub use keyledger::db::{self, AppState, DbPool, queries};
pub use keyledger::error::{AppError, DenialReason, ErrorKind};
pub use keyledger::ledger::CreditLedger;
pub use keyledger::models::*;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const KEY_PREFIX: &str = "TEST";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_path: ":memory:".to_string(),
        audit_database_path: ":memory:".to_string(),
        admin_api_key: Some(ADMIN_KEY.to_string()),
        license_key_prefix: KEY_PREFIX.to_string(),
        activation_timeout: Duration::from_secs(5),
        activation_log_enabled: true,
        db_pool_size: 8,
    }
}

/// In-memory pools. Each SQLite memory connection is its own database, so
/// these are capped at one connection; use [`file_state`] for concurrency.
pub fn memory_pools() -> (DbPool, DbPool) {
    let pool = Pool::builder()
        .max_size(1)
        .build(SqliteConnectionManager::memory())
        .unwrap();
    db::init_db(&pool.get().unwrap()).unwrap();

    let audit = Pool::builder()
        .max_size(1)
        .build(SqliteConnectionManager::memory())
        .unwrap();
    db::init_audit_db(&audit.get().unwrap()).unwrap();

    (pool, audit)
}

pub fn create_test_app_state() -> AppState {
    let (pool, audit) = memory_pools();
    AppState::new(pool, audit, &test_config())
}

/// File-backed state shared by many connections, for tests that race writers.
/// Keep the returned `TempDir` alive for the duration of the test.
pub fn file_state(pool_size: u32) -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("main.db");
    let audit_path = dir.path().join("audit.db");

    let pool = db::create_pool(db_path.to_str().unwrap(), pool_size).unwrap();
    db::init_db(&pool.get().unwrap()).unwrap();
    let audit = db::create_pool(audit_path.to_str().unwrap(), pool_size).unwrap();
    db::init_audit_db(&audit.get().unwrap()).unwrap();

    (AppState::new(pool, audit, &test_config()), dir)
}

pub fn create_test_license(
    state: &AppState,
    owner_id: &str,
    license_type: LicenseType,
    usage_limit: Option<i64>,
) -> License {
    state
        .activations
        .create_license(&CreateLicense {
            owner_id: owner_id.to_string(),
            license_type,
            usage_limit,
            expires_at: None,
        })
        .unwrap()
}

/// Insert a license with arbitrary state, bypassing the service's checks.
pub fn insert_license_with_usage(
    state: &AppState,
    owner_id: &str,
    usage_count: i64,
    usage_limit: i64,
    expires_at: Option<i64>,
) -> License {
    let license = create_test_license(state, owner_id, LicenseType::Standard, Some(usage_limit));
    let conn = state.db.get().unwrap();
    conn.execute(
        "UPDATE licenses SET usage_count = ?1, expires_at = ?2 WHERE id = ?3",
        rusqlite::params![usage_count, expires_at, &license.id],
    )
    .unwrap();
    queries::get_license_by_id(&conn, &license.id).unwrap().unwrap()
}

pub fn fund(state: &AppState, owner_id: &str, amount: i64) -> CreditTransaction {
    state
        .ledger
        .credit(owner_id, amount, TransactionType::Purchase, "test purchase", None)
        .unwrap()
}

pub fn reload(state: &AppState, license: &License) -> License {
    let conn = state.db.get().unwrap();
    queries::get_license_by_id(&conn, &license.id).unwrap().unwrap()
}

pub fn activation_logs(state: &AppState, license_id: Option<&str>) -> Vec<ActivationLogEntry> {
    let query = ActivationLogQuery {
        license_id: license_id.map(String::from),
        ..Default::default()
    };
    state.activation_log.query(&query).unwrap().0
}

// ============ HTTP helpers ============

pub fn app(state: AppState) -> Router {
    keyledger::handlers::router(state)
}

/// Send one request and decode the JSON body (Null for empty bodies).
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .body(Body::empty())
        .unwrap()
}

pub fn admin_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
