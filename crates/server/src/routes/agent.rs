// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-authenticated endpoints: everything an agent calls with
//! `X-Agent-Token`. Every handler resolves the caller's [`AgentPrincipal`]
//! first; a bad token never reaches the business logic beneath it.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use meshctl_core::dispatch::SessionId;
use meshctl_core::error::CoreError;
use meshctl_core::model::NetworkId;
use meshctl_core::permission::PermissionOracle;
use meshctl_core::reconciler::DeviceReport;
use meshctl_core::store::Store;
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate_agent, client_ip, UserAuthResolver};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NetworkSummary {
    pub id: NetworkId,
    pub name: String,
}

/// `GET /agent/organizations`
pub async fn organizations<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<meshctl_core::model::Organization>>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    let org = state.core.store.get_organization(principal.organization_id).await?;
    Ok(Json(org.into_iter().collect()))
}

/// `GET /agent/networks`
pub async fn networks<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<NetworkSummary>>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    let bindings = state.core.store.list_bindings_for_agent(principal.agent_id).await?;
    let mut out = Vec::with_capacity(bindings.len());
    for binding in bindings {
        if let Some(network) = state.core.store.get_network(binding.network_id).await? {
            out.push(NetworkSummary { id: network.id, name: network.name });
        }
    }
    Ok(Json(out))
}

#[derive(Debug, Deserialize, Default)]
pub struct HeartbeatRequest {
    pub status: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub discovered_count: Option<u32>,
    #[serde(default)]
    pub system_info: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

/// `POST /heartbeat`
pub async fn heartbeat<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Json(body): Json<HeartbeatRequest>,
) -> ApiResult<Json<Ack>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    state.core.heartbeats.record(principal.agent_id, client_ip(&headers)).await?;
    if body.status.is_some() || body.name.is_some() {
        state
            .core
            .registry
            .record_self_status(principal.agent_id, body.status, body.name)
            .await?;
    }
    Ok(Json(Ack { ok: true }))
}

/// `POST /pong`
pub async fn pong<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
) -> ApiResult<Json<Ack>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    state.core.heartbeats.pong(principal.agent_id, client_ip(&headers)).await?;
    Ok(Json(Ack { ok: true }))
}

/// `POST /agent/ping` — agent-initiated reachability probe, modeled
/// symmetrically with `/pong`.
pub async fn ping<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
) -> ApiResult<Json<Ack>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    state.core.heartbeats.record(principal.agent_id, client_ip(&headers)).await?;
    Ok(Json(Ack { ok: true }))
}

#[derive(Debug, Deserialize)]
pub struct SelfStatusRequest {
    pub status: Option<String>,
    pub version: Option<String>,
}

/// `PUT /status` — agent-reported self status (does not affect derived status).
pub async fn put_status<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Json(body): Json<SelfStatusRequest>,
) -> ApiResult<Json<Ack>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    state.core.registry.record_self_status(principal.agent_id, body.status, body.version).await?;
    Ok(Json(Ack { ok: true }))
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkResponse {
    None,
    Item {
        kind: meshctl_core::dispatch::WorkKind,
        session_id: Option<SessionId>,
        network_id: NetworkId,
        payload: serde_json::Value,
    },
}

/// `GET /agent/work` — the dispatch table's long-poll-style hand-off.
/// Never actually blocks; returns `None` immediately when the mailbox is
/// empty.
pub async fn poll_work<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
) -> ApiResult<Json<WorkResponse>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    let item = state.core.dispatch.poll(principal.agent_id).await;
    Ok(Json(match item {
        None => WorkResponse::None,
        Some(item) => WorkResponse::Item {
            kind: item.kind,
            session_id: item.session_id,
            network_id: item.network_id,
            payload: item.payload,
        },
    }))
}

/// `POST /agent/work/ack` — explicit acknowledgment for sticky (`discovery`,
/// `topology_refresh`) work items.
pub async fn ack_work<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
) -> ApiResult<Json<Ack>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    state.core.dispatch.acknowledge(principal.agent_id).await;
    Ok(Json(Ack { ok: true }))
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub processed_ips: u32,
    pub total_ips: Option<u32>,
    #[serde(default)]
    pub devices: Vec<DeviceReport>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub agent_status: AgentReportStatus,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentReportStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub session: meshctl_core::session::Session,
    pub reconciled: Vec<meshctl_core::reconciler::ReconcileOutcome>,
}

/// `POST /discovery/{session_id}/progress` — advances session progress and
/// triggers the reconciliation of any reported devices.
pub async fn discovery_progress<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    Path(session_id): Path<SessionId>,
    headers: HeaderMap,
    Json(body): Json<ProgressRequest>,
) -> ApiResult<Json<ProgressResponse>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    let session = state.core.sessions.get(session_id).await?;
    if session.agent_id != principal.agent_id {
        return Err(ApiError(CoreError::PermissionDenied));
    }

    let reconciled = state
        .core
        .reconciler
        .reconcile_batch(session.network_id, principal.company_id, principal.agent_id, body.devices)
        .await;

    for outcome in &reconciled {
        if let Some(err) = &outcome.error {
            state.core.sessions.append_error(session_id, format!("{}: {err}", outcome.ip)).await?;
        }
    }
    for err in &body.errors {
        state.core.sessions.append_error(session_id, err.clone()).await?;
    }
    let device_ids: Vec<_> = reconciled.iter().filter_map(|o| o.device_id).collect();
    if !device_ids.is_empty() {
        state.core.sessions.record_devices(session_id, device_ids).await?;
    }

    let total = body.total_ips.unwrap_or(1).max(1);
    let progress = ((body.processed_ips as u64 * 100) / total as u64).min(100) as u8;

    let new_state = match body.agent_status {
        AgentReportStatus::Running => None,
        AgentReportStatus::Completed => Some(meshctl_core::session::SessionState::Completed),
        AgentReportStatus::Failed => Some(meshctl_core::session::SessionState::Failed),
    };
    let session = state.core.sessions.update_progress(session_id, progress, new_state).await?;

    if matches!(body.agent_status, AgentReportStatus::Completed | AgentReportStatus::Failed) {
        state.core.dispatch.acknowledge(principal.agent_id).await;
    }

    Ok(Json(ProgressResponse { session, reconciled }))
}

#[derive(Debug, Deserialize)]
pub struct StatusReportRequest {
    pub devices: Vec<DeviceReport>,
}

/// `POST /status/report` — result-submit endpoint for fire-and-forget
/// `status_test` work items: no session is involved, only a reconcile.
pub async fn status_report<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Json(body): Json<StatusReportRequest>,
) -> ApiResult<Json<Vec<meshctl_core::reconciler::ReconcileOutcome>>> {
    let principal = authenticate_agent(&state, &headers, client_ip(&headers)).await?;
    let mut by_network: std::collections::HashMap<NetworkId, Vec<DeviceReport>> =
        std::collections::HashMap::new();

    // status_test reports carry no network_id of their own; look each
    // reported IP up against its already-known device row so a single batch
    // can span multiple networks.
    let mut outcomes = Vec::new();
    for report in body.devices {
        let Some(existing) = find_device_by_ip_any_network(&state, &report.ip).await? else {
            outcomes.push(meshctl_core::reconciler::ReconcileOutcome {
                ip: report.ip.clone(),
                device_id: None,
                error: Some("device not previously discovered".into()),
            });
            continue;
        };
        by_network.entry(existing.network_id).or_default().push(report);
    }
    for (network_id, reports) in by_network {
        let mut batch = state
            .core
            .reconciler
            .reconcile_batch(network_id, principal.company_id, principal.agent_id, reports)
            .await;
        outcomes.append(&mut batch);
    }
    Ok(Json(outcomes))
}

async fn find_device_by_ip_any_network<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    state: &AppState<S, P, U>,
    ip: &str,
) -> ApiResult<Option<meshctl_core::model::Device>> {
    let bindings = state.core.store.list_networks_with_devices().await?;
    for network_id in bindings {
        if let Some(device) = state.core.store.get_device_by_ip(network_id, ip).await? {
            return Ok(Some(device));
        }
    }
    Ok(None)
}
