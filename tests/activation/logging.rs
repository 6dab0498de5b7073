use crate::common::*;

#[test]
fn test_successful_activation_is_logged() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "owner-1", LicenseType::Trial, None);
    fund(&state, "owner-1", 10);

    state
        .activations
        .activate(
            &ActivationRequest::new(&license.key, DeviceFingerprint::new("A").with_ip("10.0.0.1"))
                .credit_cost(4),
        )
        .unwrap();

    let logs = activation_logs(&state, Some(&license.id));
    assert_eq!(logs.len(), 1);
    let entry = &logs[0];
    assert_eq!(entry.action, ActivationAction::Activate);
    assert_eq!(entry.result, ActivationOutcome::Success);
    assert_eq!(entry.reason, None);
    assert_eq!(entry.credit_used, 4);
    assert_eq!(entry.hwid, "A");
    assert_eq!(entry.ip.as_deref(), Some("10.0.0.1"));
    assert_eq!(entry.owner_id.as_deref(), Some("owner-1"));
    assert_eq!(entry.license_key, license.key);
}

#[test]
fn test_denied_activation_is_logged_with_reason() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "owner-1", LicenseType::Trial, None);
    state
        .activations
        .activate(&ActivationRequest::new(&license.key, DeviceFingerprint::new("A")))
        .unwrap();
    let _ = state
        .activations
        .activate(&ActivationRequest::new(&license.key, DeviceFingerprint::new("B")));

    let logs = activation_logs(&state, Some(&license.id));
    assert_eq!(logs.len(), 2);
    let failed = &logs[0];
    assert_eq!(failed.result, ActivationOutcome::Failure);
    assert_eq!(failed.reason.as_deref(), Some("DEVICE_MISMATCH"));
    assert_eq!(failed.hwid, "B");
    assert_eq!(failed.credit_used, 0);
}

#[test]
fn test_unknown_key_logged_without_license() {
    let state = create_test_app_state();
    let _ = state.activations.activate(&ActivationRequest::new(
        "TEST-AAAA-BBBB-CCCC-DDDD",
        DeviceFingerprint::new("A"),
    ));

    let logs = activation_logs(&state, None);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].license_id, None);
    assert_eq!(logs[0].owner_id, None);
    assert_eq!(logs[0].license_key, "TEST-AAAA-BBBB-CCCC-DDDD");
    assert_eq!(logs[0].reason.as_deref(), Some("LICENSE_NOT_FOUND"));
}

#[test]
fn test_verify_is_logged() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "owner-1", LicenseType::Trial, None);

    state
        .activations
        .verify(&license.key, &DeviceFingerprint::new("A"))
        .unwrap();

    let logs = activation_logs(&state, Some(&license.id));
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, ActivationAction::Verify);
    assert_eq!(logs[0].result, ActivationOutcome::Success);
}

#[test]
fn test_log_query_filters() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "owner-1", LicenseType::Trial, None);
    let request = ActivationRequest::new(&license.key, DeviceFingerprint::new("A"));
    state.activations.activate(&request).unwrap();
    state.activations.activate(&request).unwrap();
    let _ = state
        .activations
        .activate(&ActivationRequest::new(&license.key, DeviceFingerprint::new("B")));
    let _ = state
        .activations
        .verify(&license.key, &DeviceFingerprint::new("A"));

    let query = ActivationLogQuery {
        owner_id: Some("owner-1".to_string()),
        action: Some(ActivationAction::Activate),
        result: Some(ActivationOutcome::Success),
        ..Default::default()
    };
    let (logs, total) = state.activation_log.query(&query).unwrap();
    assert_eq!(total, 2);
    assert_eq!(logs.len(), 2);

    let query = ActivationLogQuery {
        license_id: Some(license.id.clone()),
        limit: Some(1),
        ..Default::default()
    };
    let (logs, total) = state.activation_log.query(&query).unwrap();
    assert_eq!(total, 4);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, ActivationAction::Verify);
}

#[test]
fn test_activation_log_is_append_only() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "owner-1", LicenseType::Trial, None);
    let _ = state
        .activations
        .verify(&license.key, &DeviceFingerprint::new("A"));

    let conn = state.audit.get().unwrap();
    assert!(
        conn.execute("UPDATE activation_logs SET result = 'FAILURE'", [])
            .is_err()
    );
}

#[test]
fn test_disabled_log_writes_nothing() {
    let (pool, audit) = memory_pools();
    let config = Config {
        activation_log_enabled: false,
        ..test_config()
    };
    let state = AppState::new(pool, audit, &config);
    assert!(!state.activation_log.is_enabled());

    let license = create_test_license(&state, "owner-1", LicenseType::Trial, None);
    state
        .activations
        .activate(&ActivationRequest::new(&license.key, DeviceFingerprint::new("A")))
        .unwrap();

    assert!(activation_logs(&state, None).is_empty());
}

#[test]
fn test_broken_audit_store_does_not_fail_activation() {
    let state = create_test_app_state();
    state
        .audit
        .get()
        .unwrap()
        .execute("DROP TABLE activation_logs", [])
        .unwrap();

    let license = create_test_license(&state, "owner-1", LicenseType::Trial, None);
    let result = state
        .activations
        .activate(&ActivationRequest::new(&license.key, DeviceFingerprint::new("A")))
        .unwrap();
    assert_eq!(result.license.usage_count, 1);
    assert_eq!(reload(&state, &license).usage_count, 1);
}
