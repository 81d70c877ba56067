// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-authenticated endpoints: everything a human operator (or an
//! upstream service acting on their behalf) calls with a session bearer
//! token. Every handler resolves a [`UserPrincipal`] first and then defers
//! the actual authorization decision to [`PermissionOracle`] — this layer
//! only shapes HTTP in and out.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use meshctl_core::dispatch::{self, SessionId};
use meshctl_core::error::CoreError;
use meshctl_core::model::{
    Agent, AgentId, AgentTokenAuditEntry, AuditEventType, NetworkId, OrganizationId,
};
use meshctl_core::permission::{PermissionOracle, UserPrincipal};
use meshctl_core::session::Session;
use meshctl_core::store::Store;

use crate::auth::{authenticate_user, UserAuthResolver};
use crate::error::{ApiError, ApiResult};
use crate::ip_range::parse_ip_range;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub network_ids: Vec<NetworkId>,
}

#[derive(Debug, serde::Serialize)]
pub struct RegisterAgentResponse {
    pub agent: Agent,
    /// The raw bearer token. Returned exactly once, at registration time.
    pub token: String,
}

/// `POST /agents/register`
pub async fn register_agent<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Json(body): Json<RegisterAgentRequest>,
) -> ApiResult<Json<RegisterAgentResponse>> {
    let caller = authenticate_user(&state, &headers).await?;
    let agent = state
        .core
        .registry
        .register(&caller, body.name, body.organization_id, &body.network_ids)
        .await?;
    let token = state.core.tokens.issue(agent.id, Some(caller.user_id)).await?;
    let agent = state.core.registry.get(agent.id).await?.agent;
    Ok(Json(RegisterAgentResponse { agent, token }))
}

/// `GET /agents/{id}`
pub async fn get_agent<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(id): Path<AgentId>,
) -> ApiResult<Json<meshctl_core::model::AgentView>> {
    authenticate_user(&state, &headers).await?;
    Ok(Json(state.core.registry.get(id).await?))
}

#[derive(Debug, serde::Deserialize)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Vec<meshctl_core::capability::Capability>>,
}

/// `PUT /agents/{id}`
pub async fn update_agent<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(id): Path<AgentId>,
    Json(body): Json<UpdateAgentRequest>,
) -> ApiResult<Json<Agent>> {
    let caller = authenticate_user(&state, &headers).await?;
    if !state.core.permission_may_manage(&caller, id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    let mut agent = state.core.store.get_agent(id).await?.ok_or(CoreError::NotFound("agent"))?;
    if let Some(name) = body.name {
        agent.name = name;
    }
    if let Some(version) = body.version {
        agent.version = Some(version);
    }
    if let Some(capabilities) = body.capabilities {
        agent.capabilities = capabilities.into_iter().collect();
    }
    state.core.store.update_agent(agent.clone()).await?;
    Ok(Json(agent))
}

/// `DELETE /agents/{id}`
pub async fn delete_agent<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(id): Path<AgentId>,
) -> ApiResult<Json<crate::routes::agent::Ack>> {
    let caller = authenticate_user(&state, &headers).await?;
    state.core.registry.delete(&caller, id).await?;
    Ok(Json(crate::routes::agent::Ack { ok: true }))
}

#[derive(Debug, serde::Deserialize)]
pub struct ListAgentsQuery {
    pub company_id: Option<meshctl_core::model::CompanyId>,
}

/// `GET /agents/all`
pub async fn list_agents<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Query(query): Query<ListAgentsQuery>,
) -> ApiResult<Json<Vec<meshctl_core::model::AgentView>>> {
    let caller = authenticate_user(&state, &headers).await?;
    // Non-superadmins are implicitly scoped to their own company regardless
    // of what the query string asks for.
    let scope = if caller.role == meshctl_core::permission::Role::Superadmin {
        query.company_id
    } else {
        caller.company_id
    };
    Ok(Json(state.core.registry.list(scope).await?))
}

macro_rules! token_action_handler {
    ($name:ident, $method:ident) => {
        pub async fn $name<S: Store, P: PermissionOracle, U: UserAuthResolver>(
            State(state): State<Arc<AppState<S, P, U>>>,
            headers: HeaderMap,
            Path(id): Path<AgentId>,
        ) -> ApiResult<Json<crate::routes::agent::Ack>> {
            let caller = authenticate_user(&state, &headers).await?;
            if !state.core.permission_may_manage(&caller, id).await {
                return Err(ApiError(CoreError::PermissionDenied));
            }
            state.core.tokens.$method(id, Some(caller.user_id)).await?;
            Ok(Json(crate::routes::agent::Ack { ok: true }))
        }
    };
}

token_action_handler!(rotate_token, rotate);
token_action_handler!(activate_token, activate);

/// `POST /agents/{id}/revoke_token`
pub async fn revoke_token<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(id): Path<AgentId>,
    Json(body): Json<RevokeRequest>,
) -> ApiResult<Json<crate::routes::agent::Ack>> {
    let caller = authenticate_user(&state, &headers).await?;
    if !state.core.permission_may_manage(&caller, id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    state
        .core
        .tokens
        .revoke(id, Some(caller.user_id), body.reason.as_deref().unwrap_or("unspecified"))
        .await?;
    Ok(Json(crate::routes::agent::Ack { ok: true }))
}

#[derive(Debug, serde::Deserialize, Default)]
pub struct RevokeRequest {
    pub reason: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ExtendRequest {
    pub days: i64,
}

#[derive(Debug, serde::Serialize)]
pub struct ExtendResponse {
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// `POST /agents/{id}/extend_token`
pub async fn extend_token<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(id): Path<AgentId>,
    Json(body): Json<ExtendRequest>,
) -> ApiResult<Json<ExtendResponse>> {
    let caller = authenticate_user(&state, &headers).await?;
    if !state.core.permission_may_manage(&caller, id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    let expires_at = state.core.tokens.extend(id, body.days, Some(caller.user_id)).await?;
    Ok(Json(ExtendResponse { expires_at }))
}

#[derive(Debug, serde::Serialize)]
pub struct TokenInfo {
    pub status: meshctl_core::model::TokenStatus,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub rotated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `GET /agents/{id}/token_info`
pub async fn token_info<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(id): Path<AgentId>,
) -> ApiResult<Json<TokenInfo>> {
    let caller = authenticate_user(&state, &headers).await?;
    if !state.core.permission_may_manage(&caller, id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    let agent = state.core.store.get_agent(id).await?.ok_or(CoreError::NotFound("agent"))?;
    Ok(Json(TokenInfo {
        status: agent.token_status,
        issued_at: agent.issued_at,
        rotated_at: agent.rotated_at,
        revoked_at: agent.revoked_at,
        expires_at: agent.expires_at,
        last_used_at: agent.last_used_at,
    }))
}

#[derive(Debug, serde::Deserialize)]
pub struct AuditQuery {
    pub event_type: Option<AuditEventType>,
    pub limit: Option<usize>,
}

/// `GET /agents/{id}/audit_logs`
pub async fn audit_logs<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(id): Path<AgentId>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AgentTokenAuditEntry>>> {
    let caller = authenticate_user(&state, &headers).await?;
    if !state.core.permission_may_manage(&caller, id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    let limit = query.limit.unwrap_or(50).min(200);
    Ok(Json(state.core.store.list_audit(id, query.event_type, limit).await?))
}

#[derive(Debug, serde::Deserialize)]
pub struct DispatchDiscoveryRequest {
    pub network_id: NetworkId,
    pub ip_range: String,
    /// Restrict dispatch to one of these agents; any eligible network-bound
    /// agent is used when omitted.
    pub agent_id: Option<AgentId>,
}

#[derive(Debug, serde::Serialize)]
pub struct DispatchDiscoveryResponse {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub total_ips: usize,
}

/// `POST /discovery`
pub async fn dispatch_discovery<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Json(body): Json<DispatchDiscoveryRequest>,
) -> ApiResult<Json<DispatchDiscoveryResponse>> {
    let caller = authenticate_user(&state, &headers).await?;
    if !state.core.permission_may_operate(&caller, body.network_id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }

    let ips = parse_ip_range(&body.ip_range)?;
    let subset = body.agent_id.map(|id| [id]);
    let agent_id = state
        .core
        .registry
        .select_online_agent(body.network_id, subset.as_ref().map(|s| s.as_slice()))
        .await?
        .ok_or(CoreError::NoCapacity)?;

    let session_id = dispatch::new_session_id();
    state.core.sessions.create(session_id, agent_id, body.network_id).await;

    let payload = serde_json::json!({
        "session_id": session_id,
        "label": format!("discovery_{}", short_uuid(session_id)),
        "ips": ips.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "total_ips": ips.len(),
    });
    state
        .core
        .dispatch
        .enqueue(agent_id, dispatch::discovery_item(session_id, body.network_id, payload))
        .await;

    Ok(Json(DispatchDiscoveryResponse { session_id, agent_id, total_ips: ips.len() }))
}

/// `GET /discovery/{session_id}/status`
pub async fn discovery_status<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<Session>> {
    let caller = authenticate_user(&state, &headers).await?;
    let session = state.core.sessions.get(session_id).await?;
    if !state.core.permission_may_operate(&caller, session.network_id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    Ok(Json(session))
}

/// `POST /discovery/{id}/cancel`
pub async fn cancel_discovery<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<Session>> {
    let caller = authenticate_user(&state, &headers).await?;
    let session = state.core.sessions.get(session_id).await?;
    if !state.core.permission_may_operate(&caller, session.network_id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    let session = state.core.sessions.cancel(session_id).await?;
    state.core.dispatch.cancel(session.agent_id).await;
    Ok(Json(session))
}

/// `POST /discovery/{id}/retry`
pub async fn retry_discovery<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<Session>> {
    let caller = authenticate_user(&state, &headers).await?;
    let session = state.core.sessions.get(session_id).await?;
    if !state.core.permission_may_operate(&caller, session.network_id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    let session = state.core.sessions.retry(session_id).await?;

    // The original IP list is not retained on `Session`; the retried work
    // item carries the session/network identity and lets the agent re-pull
    // the device list from its own last-known state.
    let payload = serde_json::json!({
        "session_id": session_id,
        "label": format!("discovery_{}", short_uuid(session_id)),
        "retry_count": session.retry_count,
    });
    state
        .core
        .dispatch
        .enqueue(session.agent_id, dispatch::discovery_item(session_id, session.network_id, payload))
        .await;
    Ok(Json(session))
}

/// `GET /network/{id}/available-agents`
pub async fn available_agents<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(network_id): Path<NetworkId>,
) -> ApiResult<Json<Vec<AgentId>>> {
    let caller = authenticate_user(&state, &headers).await?;
    if !state.core.permission_may_operate(&caller, network_id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }
    Ok(Json(state.core.registry.available_agents(network_id).await?))
}

#[derive(Debug, serde::Serialize)]
pub struct RefreshDeviceResponse {
    pub session_id: SessionId,
    pub agent_id: AgentId,
}

/// `POST /devices/{id}/refresh` — dispatch a topology refresh for one
/// already-known device.
pub async fn refresh_device<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    State(state): State<Arc<AppState<S, P, U>>>,
    headers: HeaderMap,
    Path(device_id): Path<meshctl_core::model::DeviceId>,
) -> ApiResult<Json<RefreshDeviceResponse>> {
    let caller = authenticate_user(&state, &headers).await?;
    let device = state.core.store.get_device(device_id).await?.ok_or(CoreError::NotFound("device"))?;
    if !state.core.permission_may_operate(&caller, device.network_id).await {
        return Err(ApiError(CoreError::PermissionDenied));
    }

    let agent_id = state
        .core
        .registry
        .select_online_agent(device.network_id, None)
        .await?
        .ok_or(CoreError::NoCapacity)?;

    let session_id = dispatch::new_session_id();
    state.core.sessions.create(session_id, agent_id, device.network_id).await;
    let payload = serde_json::json!({
        "session_id": session_id,
        "label": format!("topology_{}", short_uuid(session_id)),
        "device_id": device.id,
        "ip": device.ip,
    });
    state
        .core
        .dispatch
        .enqueue(agent_id, dispatch::topology_refresh_item(session_id, device.network_id, payload))
        .await;

    Ok(Json(RefreshDeviceResponse { session_id, agent_id }))
}

fn short_uuid(id: SessionId) -> String {
    id.simple().to_string()[..8].to_string()
}
