// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenario tests driving a real router in-process through
//! `axum_test::TestServer`.

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use meshctl_specs::{backdate_heartbeat, harness, register_and_issue_token, NETWORK_ID, USER_TOKEN};

fn agent_token_header() -> HeaderName {
    HeaderName::from_static("x-agent-token")
}

fn agent_token_value(token: &str) -> HeaderValue {
    HeaderValue::from_str(token).expect("agent token is a valid header value")
}

fn bearer_value(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("bearer token is a valid header value")
}

#[tokio::test]
async fn discovery_roundtrip_completes_with_partial_failures() {
    let (server, state) = harness().await;
    let (agent_id, token) = register_and_issue_token(&state, "agent-11").await;
    backdate_heartbeat(&state, agent_id, 10).await;

    let dispatch_resp = server
        .post("/discovery")
        .add_header(header::AUTHORIZATION, bearer_value(USER_TOKEN))
        .json(&serde_json::json!({"network_id": NETWORK_ID, "ip_range": "10.0.0.1-10.0.0.4"}))
        .await;
    dispatch_resp.assert_status(StatusCode::OK);
    let dispatch: serde_json::Value = dispatch_resp.json();
    assert_eq!(dispatch["agent_id"], agent_id);
    assert_eq!(dispatch["total_ips"], 4);
    let session_id = dispatch["session_id"].as_str().unwrap().to_string();

    let poll_resp =
        server.get("/agent/work").add_header(agent_token_header(), agent_token_value(&token)).await;
    poll_resp.assert_status(StatusCode::OK);
    let work: serde_json::Value = poll_resp.json();
    assert_eq!(work["type"], "item");
    assert_eq!(work["session_id"], session_id);

    let devices = serde_json::json!([
        {
            "ip": "10.0.0.1", "name": "sw1", "device_type": null, "platform": null,
            "os_version": null, "serial": null, "ping_status": true, "snmp_status": true,
            "ssh_status": false, "discovery_method": "auto", "snmp": null, "topology": null
        },
        {
            "ip": "10.0.0.2", "name": "sw2", "device_type": null, "platform": null,
            "os_version": null, "serial": null, "ping_status": true, "snmp_status": false,
            "ssh_status": false, "discovery_method": "auto", "snmp": null, "topology": null
        },
    ]);
    let progress_resp = server
        .post(&format!("/discovery/{session_id}/progress"))
        .add_header(agent_token_header(), agent_token_value(&token))
        .json(&serde_json::json!({
            "processed_ips": 4,
            "total_ips": 4,
            "devices": devices,
            "errors": ["10.0.0.3: host unreachable", "10.0.0.4: host unreachable"],
            "agent_status": "completed",
        }))
        .await;
    progress_resp.assert_status(StatusCode::OK);
    let progress: serde_json::Value = progress_resp.json();
    assert_eq!(progress["session"]["progress"], 100);
    assert_eq!(progress["session"]["state"], "completed");
    assert_eq!(progress["session"]["errors"].as_array().unwrap().len(), 2);
    assert_eq!(progress["reconciled"].as_array().unwrap().len(), 2);
    assert_eq!(progress["session"]["discovered_devices"].as_array().unwrap().len(), 2);

    let after_ack =
        server.get("/agent/work").add_header(agent_token_header(), agent_token_value(&token)).await;
    let after: serde_json::Value = after_ack.json();
    assert_eq!(after["type"], "none");
}

#[tokio::test]
async fn revoked_token_blocks_poll_but_session_stays_pending() {
    let (server, state) = harness().await;
    let (agent_id, token) = register_and_issue_token(&state, "agent-11").await;
    backdate_heartbeat(&state, agent_id, 10).await;

    let dispatch_resp = server
        .post("/discovery")
        .add_header(header::AUTHORIZATION, bearer_value(USER_TOKEN))
        .json(&serde_json::json!({"network_id": NETWORK_ID, "ip_range": "10.0.0.1-10.0.0.1"}))
        .await;
    dispatch_resp.assert_status(StatusCode::OK);
    let session_id: String = dispatch_resp.json::<serde_json::Value>()["session_id"].as_str().unwrap().into();

    state.core.tokens.revoke(agent_id, None, "compromised").await.unwrap();

    let poll_resp =
        server.get("/agent/work").add_header(agent_token_header(), agent_token_value(&token)).await;
    poll_resp.assert_status(StatusCode::UNAUTHORIZED);

    let audit = state.core.store.list_audit(agent_id, None, 10).await.unwrap();
    assert!(audit.iter().any(|e| e.event_type == meshctl_core::model::AuditEventType::AuthenticationFailure));

    let session = state.core.sessions.get(session_id.parse().unwrap()).await.unwrap();
    assert_eq!(session.state, meshctl_core::session::SessionState::Pending);
}

#[tokio::test]
async fn dispatch_with_no_online_agent_returns_503() {
    let (server, state) = harness().await;
    let (agent_id, _token) = register_and_issue_token(&state, "agent-11").await;
    backdate_heartbeat(&state, agent_id, 360).await;

    let resp = server
        .post("/discovery")
        .add_header(header::AUTHORIZATION, bearer_value(USER_TOKEN))
        .json(&serde_json::json!({"network_id": NETWORK_ID, "ip_range": "10.0.0.1-10.0.0.1"}))
        .await;
    resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["detail"], "No online agent available for this network");

    assert!(state.core.sessions.list_active(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_resets_failed_session_and_resumes_progress() {
    let (server, state) = harness().await;
    let (agent_id, token) = register_and_issue_token(&state, "agent-11").await;
    backdate_heartbeat(&state, agent_id, 10).await;

    let dispatch_resp = server
        .post("/discovery")
        .add_header(header::AUTHORIZATION, bearer_value(USER_TOKEN))
        .json(&serde_json::json!({"network_id": NETWORK_ID, "ip_range": "10.0.0.1-10.0.0.1"}))
        .await;
    let session_id: String = dispatch_resp.json::<serde_json::Value>()["session_id"].as_str().unwrap().into();

    server
        .post(&format!("/discovery/{session_id}/progress"))
        .add_header(agent_token_header(), agent_token_value(&token))
        .json(&serde_json::json!({
            "processed_ips": 1, "total_ips": 1, "devices": [], "errors": ["snmp timeout"],
            "agent_status": "failed",
        }))
        .await
        .assert_status(StatusCode::OK);

    let failed = state.core.sessions.get(session_id.parse().unwrap()).await.unwrap();
    assert_eq!(failed.state, meshctl_core::session::SessionState::Failed);
    assert_eq!(failed.retry_count, 0);

    let cancel_resp = server
        .post(&format!("/discovery/{session_id}/cancel"))
        .add_header(header::AUTHORIZATION, bearer_value(USER_TOKEN))
        .await;
    // cancel is rejected on a terminal session; retry is the real path under test.
    cancel_resp.assert_status(StatusCode::CONFLICT);

    let retry_resp = server
        .post(&format!("/discovery/{session_id}/retry"))
        .add_header(header::AUTHORIZATION, bearer_value(USER_TOKEN))
        .await;
    retry_resp.assert_status(StatusCode::OK);
    let retried: serde_json::Value = retry_resp.json();
    assert_eq!(retried["state"], "pending");
    assert_eq!(retried["retry_count"], 1);
    assert_eq!(retried["progress"], 0);
    assert!(retried["errors"].as_array().unwrap().is_empty());

    let resumed = server
        .post(&format!("/discovery/{session_id}/progress"))
        .add_header(agent_token_header(), agent_token_value(&token))
        .json(&serde_json::json!({
            "processed_ips": 1, "total_ips": 1, "devices": [], "errors": [],
            "agent_status": "completed",
        }))
        .await;
    resumed.assert_status(StatusCode::OK);
    let resumed: serde_json::Value = resumed.json();
    assert_eq!(resumed["session"]["state"], "completed");
    assert_eq!(resumed["session"]["progress"], 100);
}

#[tokio::test]
async fn duplicate_device_report_is_idempotent() {
    let (server, state) = harness().await;
    let (agent_id, token) = register_and_issue_token(&state, "agent-11").await;
    backdate_heartbeat(&state, agent_id, 10).await;

    let report = serde_json::json!([{
        "ip": "10.0.0.1", "name": "sw1", "device_type": null, "platform": null,
        "os_version": null, "serial": null, "ping_status": true, "snmp_status": true,
        "ssh_status": false, "discovery_method": "auto",
        "snmp": null,
        "topology": {
            "raw_description": "Cisco IOS Software, C2960X",
            "hostname": "sw1",
            "uptime_raw": "1d 2h 3m 4s",
            "health_data": {}
        }
    }]);

    let first = server
        .post("/status/report")
        .add_header(agent_token_header(), agent_token_value(&token))
        .json(&serde_json::json!({"devices": report}))
        .await;
    first.assert_status(StatusCode::OK);
    let first_outcomes: serde_json::Value = first.json();
    // No prior device row exists yet, so the first report can only fail to
    // resolve an owning network — this exercises the not-previously-seen path.
    assert_eq!(first_outcomes[0]["device_id"], serde_json::Value::Null);

    // Seed the device directly (status_report can only update devices a prior
    // discovery already placed on a network) then report twice and compare.
    let device = meshctl_core::model::Device {
        id: 0,
        ip: "10.0.0.1".into(),
        network_id: NETWORK_ID,
        company_id: meshctl_specs::COMPANY_ID,
        owner_id: 1,
        name: "sw1".into(),
        device_type: None,
        platform: None,
        os_version: None,
        serial: None,
        credentials: Default::default(),
        ping_status: true,
        snmp_status: true,
        ssh_status: false,
        discovery_method: meshctl_core::model::DiscoveryMethod::Auto,
        last_status_check: None,
        created_at: meshctl_core::time::now(),
        updated_at: meshctl_core::time::now(),
    };
    state.core.store.upsert_device(device).await.unwrap();

    let second = server
        .post("/status/report")
        .add_header(agent_token_header(), agent_token_value(&token))
        .json(&serde_json::json!({"devices": report}))
        .await;
    second.assert_status(StatusCode::OK);
    let second_outcomes: serde_json::Value = second.json();
    let device_id = second_outcomes[0]["device_id"].as_i64().unwrap();

    let third = server
        .post("/status/report")
        .add_header(agent_token_header(), agent_token_value(&token))
        .json(&serde_json::json!({"devices": report}))
        .await;
    third.assert_status(StatusCode::OK);
    let third_outcomes: serde_json::Value = third.json();
    assert_eq!(third_outcomes[0]["device_id"].as_i64().unwrap(), device_id);

    assert_eq!(state.core.store.list_devices_for_network(NETWORK_ID).await.unwrap().len(), 1);
    let topology = state.core.store.get_topology(device_id).await.unwrap().unwrap();
    assert_eq!(topology.hostname.as_deref(), Some("sw1"));
}

#[tokio::test]
async fn background_sweep_item_is_overwritten_by_explicit_refresh() {
    let (server, state) = harness().await;
    let (agent_id, token) = register_and_issue_token(&state, "agent-11").await;
    backdate_heartbeat(&state, agent_id, 10).await;

    let device = meshctl_core::model::Device {
        id: 42,
        ip: "10.0.0.9".into(),
        network_id: NETWORK_ID,
        company_id: meshctl_specs::COMPANY_ID,
        owner_id: 1,
        name: "core-switch".into(),
        device_type: None,
        platform: None,
        os_version: None,
        serial: None,
        credentials: Default::default(),
        ping_status: true,
        snmp_status: true,
        ssh_status: false,
        discovery_method: meshctl_core::model::DiscoveryMethod::Auto,
        last_status_check: None,
        created_at: meshctl_core::time::now(),
        updated_at: meshctl_core::time::now(),
    };
    state.core.store.upsert_device(device).await.unwrap();

    meshctl_server::sweeper::sweep_once(&state).await;
    assert!(state.core.dispatch.has_pending(agent_id).await);

    let refresh_resp = server
        .post("/devices/42/refresh")
        .add_header(header::AUTHORIZATION, bearer_value(USER_TOKEN))
        .await;
    refresh_resp.assert_status(StatusCode::OK);

    let poll_resp =
        server.get("/agent/work").add_header(agent_token_header(), agent_token_value(&token)).await;
    poll_resp.assert_status(StatusCode::OK);
    let work: serde_json::Value = poll_resp.json();
    assert_eq!(work["kind"], "topology_refresh");
    assert_eq!(work["payload"]["device_id"], 42);
}
