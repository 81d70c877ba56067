// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end scenario tests: builds a real
//! [`meshctl_server::routes`] router over an in-memory store seeded with a
//! single tenant, and drives it with [`axum_test::TestServer`] rather than
//! spawning a subprocess — the control plane has no process lifecycle of
//! its own to justify one, and the seed data (organization/company/
//! network) has no HTTP surface of its own to populate it through; tenancy
//! is owned by an external system.

use std::collections::HashMap;
use std::sync::Arc;

use meshctl_core::model::{Company, Network, Organization};
use meshctl_core::permission::{Role, UserPrincipal};
use meshctl_core::registry::{AllowAllOracle, Thresholds};
use meshctl_core::store::memory::MemoryStore;
use meshctl_core::CoordinationCore;
use meshctl_server::auth::StaticUserAuthResolver;
use meshctl_server::config::ServerConfig;
use meshctl_server::state::AppState;
use tokio_util::sync::CancellationToken;

pub const COMPANY_ID: i64 = 7;
pub const ORGANIZATION_ID: i64 = 1;
pub const NETWORK_ID: i64 = 3;
pub const USER_TOKEN: &str = "test-full-control-token";

pub type TestAppState = AppState<MemoryStore, AllowAllOracle, StaticUserAuthResolver>;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        online_threshold_secs: 60,
        dispatch_fresh_secs: 300,
        sweep_period_secs: 3600,
        session_max_age_hours: 24,
        user_tokens_file: None,
        user_fallback_secret: None,
    }
}

/// Build a server over a freshly seeded single-tenant store (company 7,
/// organization 1, network 3) and a fixed `full_control` user bearer.
pub async fn harness() -> (axum_test::TestServer, Arc<TestAppState>) {
    let store = Arc::new(MemoryStore::new());
    store
        .seed_tenancy(
            Company { id: COMPANY_ID, name: "acme".into() },
            Organization {
                id: ORGANIZATION_ID,
                name: "acme-org".into(),
                owner_user_id: 1,
                owner_company_id: COMPANY_ID,
            },
            Network { id: NETWORK_ID, organization_id: ORGANIZATION_ID, name: "hq".into() },
        )
        .await;

    let core = CoordinationCore::with_thresholds(store, Arc::new(AllowAllOracle), Thresholds::default());

    let mut tokens = HashMap::new();
    tokens.insert(
        USER_TOKEN.to_string(),
        UserPrincipal {
            user_id: 1,
            role: Role::FullControl,
            company_id: Some(COMPANY_ID),
            engineer_tier: None,
        },
    );
    let users = StaticUserAuthResolver::new(tokens, None);

    let state = AppState::new(core, users, test_config(), CancellationToken::new());
    let app = meshctl_server::routes::build(Arc::clone(&state));
    let server = axum_test::TestServer::new(app).expect("building TestServer over a valid router");
    (server, state)
}

/// Register an agent bound to [`NETWORK_ID`] through the registry directly
/// (bypassing HTTP, since the harness's fixed user principal already is the
/// caller these endpoints would authenticate) and issue it a token.
pub async fn register_and_issue_token(state: &TestAppState, name: &str) -> (i64, String) {
    let caller = UserPrincipal {
        user_id: 1,
        role: Role::FullControl,
        company_id: Some(COMPANY_ID),
        engineer_tier: None,
    };
    let agent = state
        .core
        .registry
        .register(&caller, name.to_string(), ORGANIZATION_ID, &[NETWORK_ID])
        .await
        .expect("register succeeds against the seeded tenant");
    let token = state.core.tokens.issue(agent.id, Some(caller.user_id)).await.expect("issue succeeds");
    (agent.id, token)
}

/// Stamp `agent_id` as having heartbeat `age_secs` ago, directly through the
/// heartbeat monitor plus a backdating store write (the monitor itself only
/// ever stamps "now").
pub async fn backdate_heartbeat(state: &TestAppState, agent_id: i64, age_secs: i64) {
    state.core.heartbeats.record(agent_id, None).await.expect("heartbeat record succeeds");
    let mut agent = state.core.store.get_agent(agent_id).await.expect("store read succeeds").expect("agent exists");
    agent.last_heartbeat = Some(meshctl_core::time::now() - chrono::Duration::seconds(age_secs));
    state.core.store.update_agent(agent).await.expect("store write succeeds");
}
