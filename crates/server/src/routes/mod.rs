// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface wiring: one `axum::Router` built over [`AppState`], split
//! into the agent-authenticated routes and the user-authenticated routes.

pub mod agent;
pub mod user;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use meshctl_core::permission::PermissionOracle;
use meshctl_core::store::Store;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::UserAuthResolver;
use crate::state::AppState;

pub fn build<S, P, U>(state: Arc<AppState<S, P, U>>) -> Router
where
    S: Store + 'static,
    P: PermissionOracle + 'static,
    U: UserAuthResolver + 'static,
{
    Router::new()
        // Agent-authenticated surface (`X-Agent-Token`).
        .route("/agent/organizations", get(agent::organizations::<S, P, U>))
        .route("/agent/networks", get(agent::networks::<S, P, U>))
        .route("/heartbeat", post(agent::heartbeat::<S, P, U>))
        .route("/pong", post(agent::pong::<S, P, U>))
        .route("/agent/ping", post(agent::ping::<S, P, U>))
        .route("/status", put(agent::put_status::<S, P, U>))
        .route("/agent/work", get(agent::poll_work::<S, P, U>))
        .route("/agent/work/ack", post(agent::ack_work::<S, P, U>))
        .route("/discovery/{session_id}/progress", post(agent::discovery_progress::<S, P, U>))
        .route("/status/report", post(agent::status_report::<S, P, U>))
        // User-authenticated surface (`Authorization: Bearer`).
        .route("/agents/register", post(user::register_agent::<S, P, U>))
        .route(
            "/agents/{id}",
            get(user::get_agent::<S, P, U>)
                .put(user::update_agent::<S, P, U>)
                .delete(user::delete_agent::<S, P, U>),
        )
        .route("/agents/all", get(user::list_agents::<S, P, U>))
        .route("/agents/{id}/rotate_token", post(user::rotate_token::<S, P, U>))
        .route("/agents/{id}/revoke_token", post(user::revoke_token::<S, P, U>))
        .route("/agents/{id}/activate_token", post(user::activate_token::<S, P, U>))
        .route("/agents/{id}/extend_token", post(user::extend_token::<S, P, U>))
        .route("/agents/{id}/token_info", get(user::token_info::<S, P, U>))
        .route("/agents/{id}/audit_logs", get(user::audit_logs::<S, P, U>))
        .route("/discovery", post(user::dispatch_discovery::<S, P, U>))
        .route("/discovery/{session_id}/status", get(user::discovery_status::<S, P, U>))
        .route("/discovery/{id}/cancel", post(user::cancel_discovery::<S, P, U>))
        .route("/discovery/{id}/retry", post(user::retry_discovery::<S, P, U>))
        .route("/network/{id}/available-agents", get(user::available_agents::<S, P, U>))
        .route("/devices/{id}/refresh", post(user::refresh_device::<S, P, U>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
