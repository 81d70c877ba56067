// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core domain logic for the agent coordination control plane: token
//! lifecycle, agent registry, dispatch table, session tracking, result
//! reconciliation, and heartbeat/liveness — the subsystems a transport
//! layer (HTTP, in this workspace's `server` crate) exposes over the wire.
//!
//! This crate is transport-agnostic: it knows nothing of axum, HTTP status
//! codes, or JSON bodies beyond [`serde_json::Value`] payloads it already
//! stores opaquely. Every public operation returns [`error::CoreResult`].

pub mod capability;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod model;
pub mod permission;
pub mod reconciler;
pub mod registry;
pub mod session;
pub mod store;
pub mod time;
pub mod token;

use std::sync::Arc;

use crate::permission::PermissionOracle;
use crate::store::Store;

/// Every subsystem wired together against a shared `Store` and
/// `PermissionOracle`. The `server` crate builds one of these per process
/// and hands `Arc<CoordinationCore<S, P>>` to its route handlers.
pub struct CoordinationCore<S: Store, P: PermissionOracle> {
    pub store: Arc<S>,
    pub permissions: Arc<P>,
    pub registry: registry::AgentRegistry<S, P>,
    pub tokens: token::TokenStore<S>,
    pub dispatch: dispatch::DispatchTable,
    pub sessions: session::SessionTracker,
    pub reconciler: reconciler::Reconciler<S>,
    pub heartbeats: heartbeat::HeartbeatMonitor<S>,
}

impl<S: Store, P: PermissionOracle> CoordinationCore<S, P> {
    pub fn new(store: Arc<S>, permissions: Arc<P>) -> Self {
        Self::with_thresholds(store, permissions, registry::Thresholds::default())
    }

    pub fn with_thresholds(
        store: Arc<S>,
        permissions: Arc<P>,
        thresholds: registry::Thresholds,
    ) -> Self {
        Self {
            registry: registry::AgentRegistry::with_thresholds(
                Arc::clone(&store),
                Arc::clone(&permissions),
                thresholds,
            ),
            tokens: token::TokenStore::new(Arc::clone(&store)),
            dispatch: dispatch::DispatchTable::new(),
            sessions: session::SessionTracker::new(),
            reconciler: reconciler::Reconciler::new(Arc::clone(&store)),
            heartbeats: heartbeat::HeartbeatMonitor::new(Arc::clone(&store)),
            store,
            permissions,
        }
    }

    /// Convenience wrapper over the permission oracle, used by transport
    /// handlers that need a yes/no answer without going through
    /// [`registry::AgentRegistry`] (e.g. token management, which `registry`
    /// does not own).
    pub async fn permission_may_manage(&self, user: &permission::UserPrincipal, agent: model::AgentId) -> bool {
        self.permissions.may_manage_agent(user, agent).await
    }

    pub async fn permission_may_operate(
        &self,
        user: &permission::UserPrincipal,
        network: model::NetworkId,
    ) -> bool {
        self.permissions.may_operate_network(user, network).await
    }
}
