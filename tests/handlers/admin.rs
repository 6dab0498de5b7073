use axum::{body::Body, http::Request, http::StatusCode};
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let state = create_test_app_state();

    let (status, body) = send(app(state.clone()), get("/admin/owners/owner-1/balance")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .method("GET")
        .uri("/admin/owners/owner-1/balance")
        .header("authorization", "Bearer wrong-key")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(state.clone()), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(app(state), admin_get("/admin/owners/owner-1/balance")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_disabled_without_configured_key() {
    let (pool, audit) = memory_pools();
    let config = Config {
        admin_api_key: None,
        ..test_config()
    };
    let state = AppState::new(pool, audit, &config);

    let (status, _) = send(app(state), admin_get("/admin/owners/owner-1/balance")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_fetch_license() {
    let state = create_test_app_state();

    let (status, created) = send(
        app(state.clone()),
        admin_post(
            "/admin/licenses",
            json!({ "owner_id": "owner-1", "license_type": "trial" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", created);
    assert_eq!(created["license_type"], "TRIAL");
    assert_eq!(created["usage_limit"], 10);
    assert_eq!(created["active"], true);
    let key = created["key"].as_str().unwrap().to_string();

    let (status, fetched) = send(
        app(state.clone()),
        admin_get(&format!("/admin/licenses/{}", key)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, listed) = send(
        app(state),
        admin_get("/admin/owners/owner-1/licenses"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["key"], key.as_str());
}

#[tokio::test]
async fn test_create_license_rejects_unknown_type() {
    let state = create_test_app_state();

    let (status, body) = send(
        app(state),
        admin_post(
            "/admin/licenses",
            json!({ "owner_id": "owner-1", "license_type": "ENTERPRISE" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TYPE");
}

#[tokio::test]
async fn test_get_unknown_license() {
    let state = create_test_app_state();
    let (status, body) = send(
        app(state),
        admin_get("/admin/licenses/TEST-AAAA-BBBB-CCCC-DDDD"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "LICENSE_NOT_FOUND");
}

#[tokio::test]
async fn test_deactivate_license() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "owner-1", LicenseType::Pro, None);
    let uri = format!("/admin/licenses/{}/deactivate", license.key);

    let (status, body) = send(app(state.clone()), admin_post(&uri, json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["deactivated"], true);
    assert_eq!(body["license"]["active"], false);

    let (status, _) = send(app(state.clone()), admin_post(&uri, json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app(state),
        post_json(
            "/licenses/activate",
            json!({ "key": license.key, "hwid": "A" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "LICENSE_INACTIVE");
}

#[tokio::test]
async fn test_add_credits_and_read_ledger() {
    let state = create_test_app_state();

    let (status, txn) = send(
        app(state.clone()),
        admin_post(
            "/admin/owners/owner-1/credits",
            json!({
                "amount": 40,
                "transaction_type": "PURCHASE",
                "metadata": { "kind": "purchase", "order_id": "ord_123" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", txn);
    assert_eq!(txn["amount"], 40);
    assert_eq!(txn["balance_after"], 40);
    assert_eq!(txn["description"], "PURCHASE credit");
    assert_eq!(txn["metadata"]["order_id"], "ord_123");

    state.ledger.debit("owner-1", 15, "usage", None).unwrap();

    let (status, balance) = send(
        app(state.clone()),
        admin_get("/admin/owners/owner-1/balance"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["owner_id"], "owner-1");
    assert_eq!(balance["balance"], 25);

    let (status, page) = send(
        app(state.clone()),
        admin_get("/admin/owners/owner-1/transactions?limit=1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["items"][0]["amount"], -15);
    assert_eq!(page["items"][0]["transaction_type"], "USAGE");

    let (status, report) = send(
        app(state),
        admin_get("/admin/owners/owner-1/reconcile"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["consistent"], true);
    assert_eq!(report["ledger_sum"], 25);
}

#[tokio::test]
async fn test_add_credits_rejects_bad_amounts_and_usage() {
    let state = create_test_app_state();

    let (status, body) = send(
        app(state.clone()),
        admin_post(
            "/admin/owners/owner-1/credits",
            json!({ "amount": 0, "transaction_type": "BONUS" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_AMOUNT");

    let (status, _) = send(
        app(state.clone()),
        admin_post(
            "/admin/owners/owner-1/credits",
            json!({ "amount": 10, "transaction_type": "USAGE" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(state.ledger.get_balance("owner-1").unwrap(), 0);
}

#[tokio::test]
async fn test_query_activation_logs() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "owner-1", LicenseType::Trial, None);
    state
        .activations
        .activate(&ActivationRequest::new(&license.key, DeviceFingerprint::new("A")))
        .unwrap();
    let _ = state
        .activations
        .activate(&ActivationRequest::new(&license.key, DeviceFingerprint::new("B")));

    let (status, page) = send(
        app(state.clone()),
        admin_get(&format!(
            "/admin/activation-logs?license_id={}&result=FAILURE",
            license.id
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", page);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["reason"], "DEVICE_MISMATCH");
    assert_eq!(page["items"][0]["hwid"], "B");

    let (status, page) = send(app(state), admin_get("/admin/activation-logs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
}
