// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent Registry: CRUD over `Agent` + `AgentNetworkBinding`, and the
//! derived online/offline status every read path applies.
//!
//! Status is never stored directly, only derived at read time from
//! `last_heartbeat` — the same shape as a health-check eviction loop that
//! snapshots `last_seen` and recomputes `healthy` on every read rather than
//! trusting a stale stored flag.

use std::sync::Arc;

use chrono::Duration;

use crate::error::{CoreError, CoreResult};
use crate::model::{
    Agent, AgentId, AgentNetworkBinding, AgentStatus, AgentView, CompanyId, NetworkId,
    OrganizationId, TokenStatus,
};
use crate::permission::{PermissionOracle, Role, UserPrincipal};
use crate::store::Store;
use crate::time::now;

/// Online threshold: `now - last_heartbeat <= T_ONLINE`.
pub const T_ONLINE: Duration = Duration::seconds(60);

/// Dispatch freshness threshold: agents stalled longer than this are
/// excluded from selection even if nominally online.
pub const T_DISPATCH_FRESH: Duration = Duration::minutes(5);

/// Configurable liveness thresholds: `online` and `dispatch_fresh` are
/// runtime knobs, not hardcoded constants. Defaults match [`T_ONLINE`] and
/// [`T_DISPATCH_FRESH`].
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub online: Duration,
    pub dispatch_fresh: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { online: T_ONLINE, dispatch_fresh: T_DISPATCH_FRESH }
    }
}

/// Apply the derivation rule with the default thresholds: online iff
/// heartbeat is within [`T_ONLINE`] of now. The boundary is inclusive: a
/// heartbeat exactly 60 seconds old still reads as online.
pub fn derive_status(agent: &Agent) -> AgentStatus {
    derive_status_with(agent, Thresholds::default().online)
}

/// Apply the derivation rule with an explicit online threshold.
pub fn derive_status_with(agent: &Agent, online_threshold: Duration) -> AgentStatus {
    match agent.last_heartbeat {
        Some(hb) if now() - hb <= online_threshold => AgentStatus::Online,
        _ => AgentStatus::Offline,
    }
}

fn to_view(agent: Agent, thresholds: Thresholds) -> AgentView {
    let status = derive_status_with(&agent, thresholds.online);
    AgentView { agent, status }
}

pub struct AgentRegistry<S: Store, P: PermissionOracle> {
    store: Arc<S>,
    permissions: Arc<P>,
    thresholds: Thresholds,
}

impl<S: Store, P: PermissionOracle> AgentRegistry<S, P> {
    pub fn new(store: Arc<S>, permissions: Arc<P>) -> Self {
        Self { store, permissions, thresholds: Thresholds::default() }
    }

    pub fn with_thresholds(store: Arc<S>, permissions: Arc<P>, thresholds: Thresholds) -> Self {
        Self { store, permissions, thresholds }
    }

    /// Register a new agent. Permission invariant: only
    /// `company_admin`/`full_control`-or-above callers, and the target
    /// organization's owner's company must match the caller's company.
    pub async fn register(
        &self,
        caller: &UserPrincipal,
        name: String,
        organization_id: OrganizationId,
        network_ids: &[NetworkId],
    ) -> CoreResult<Agent> {
        if !caller.role.may_register_agent() {
            return Err(CoreError::PermissionDenied);
        }
        if !self.permissions.may_register_agent(caller, organization_id).await {
            return Err(CoreError::PermissionDenied);
        }

        let organization = self
            .store
            .get_organization(organization_id)
            .await?
            .ok_or(CoreError::NotFound("organization"))?;

        if caller.company_id != Some(organization.owner_company_id) {
            return Err(CoreError::PermissionDenied);
        }

        let mut networks = Vec::with_capacity(network_ids.len());
        for &network_id in network_ids {
            let network =
                self.store.get_network(network_id).await?.ok_or(CoreError::NotFound("network"))?;
            if network.organization_id != organization_id {
                return Err(CoreError::Validation(format!(
                    "network {network_id} does not belong to organization {organization_id}"
                )));
            }
            networks.push(network);
        }

        let agent = Agent {
            id: 0,
            name,
            company_id: organization.owner_company_id,
            organization_id,
            token_fingerprint: String::new(),
            token_status: TokenStatus::Expired,
            capabilities: Default::default(),
            version: None,
            declared_status: None,
            last_heartbeat: None,
            last_used_at: None,
            last_ip: None,
            created_at: now(),
            created_by: Some(caller.user_id),
            issued_at: now(),
            rotated_at: None,
            revoked_at: None,
            expires_at: None,
        };
        let agent = self.store.insert_agent(agent).await?;

        for network in &networks {
            self.store
                .bind_agent_network(AgentNetworkBinding {
                    agent_id: agent.id,
                    network_id: network.id,
                    company_id: agent.company_id,
                    organization_id: agent.organization_id,
                })
                .await?;
        }

        tracing::info!(agent_id = agent.id, organization_id, "agent registered");
        Ok(agent)
    }

    pub async fn get(&self, id: AgentId) -> CoreResult<AgentView> {
        let agent = self.store.get_agent(id).await?.ok_or(CoreError::NotFound("agent"))?;
        Ok(to_view(agent, self.thresholds))
    }

    pub async fn list(&self, company_id: Option<CompanyId>) -> CoreResult<Vec<AgentView>> {
        let agents = self.store.list_agents(company_id).await?;
        Ok(agents.into_iter().map(|a| to_view(a, self.thresholds)).collect())
    }

    pub async fn delete(&self, caller: &UserPrincipal, id: AgentId) -> CoreResult<()> {
        if !self.permissions.may_manage_agent(caller, id).await {
            return Err(CoreError::PermissionDenied);
        }
        self.store.delete_agent(id).await
    }

    /// Record a declared self-status and/or version from an agent
    /// (`PUT /status`). Does not affect the derived status.
    pub async fn record_self_status(
        &self,
        agent_id: AgentId,
        declared_status: Option<String>,
        version: Option<String>,
    ) -> CoreResult<()> {
        let mut agent = self.store.get_agent(agent_id).await?.ok_or(CoreError::NotFound("agent"))?;
        if declared_status.is_some() {
            agent.declared_status = declared_status;
        }
        if version.is_some() {
            agent.version = version;
        }
        self.store.update_agent(agent).await
    }

    /// Selection query: online, active-token agents bound to
    /// `network`, tie-broken by ascending agent id. `subset` restricts
    /// candidates to a caller-requested set of agent ids, if given.
    pub async fn select_online_agent(
        &self,
        network_id: NetworkId,
        subset: Option<&[AgentId]>,
    ) -> CoreResult<Option<AgentId>> {
        let candidates = self.candidates(network_id, subset).await?;
        Ok(candidates.into_iter().next())
    }

    /// Every online, active-token, network-bound agent, ascending by id —
    /// used by `GET /network/{id}/available-agents`.
    pub async fn available_agents(&self, network_id: NetworkId) -> CoreResult<Vec<AgentId>> {
        self.candidates(network_id, None).await
    }

    async fn candidates(
        &self,
        network_id: NetworkId,
        subset: Option<&[AgentId]>,
    ) -> CoreResult<Vec<AgentId>> {
        let bindings = self.store.list_bindings_for_network(network_id).await?;
        let mut ids = Vec::new();
        for binding in bindings {
            if let Some(subset) = subset {
                if !subset.contains(&binding.agent_id) {
                    continue;
                }
            }
            let Some(agent) = self.store.get_agent(binding.agent_id).await? else { continue };
            if agent.token_status != TokenStatus::Active {
                continue;
            }
            if derive_status_with(&agent, self.thresholds.online) != AgentStatus::Online {
                continue;
            }
            let Some(hb) = agent.last_heartbeat else { continue };
            if now() - hb > self.thresholds.dispatch_fresh {
                continue;
            }
            ids.push(agent.id);
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

/// A trivial oracle used in tests and single-tenant demos: every role is
/// permitted, subject only to the static `company_admin+` role check the
/// registry already applies. Production deployments supply a real oracle.
pub struct AllowAllOracle;

#[async_trait::async_trait]
impl PermissionOracle for AllowAllOracle {
    async fn may_register_agent(&self, _user: &UserPrincipal, _organization: OrganizationId) -> bool {
        true
    }

    async fn may_operate_network(&self, _user: &UserPrincipal, _network: NetworkId) -> bool {
        true
    }

    async fn may_manage_agent(&self, _user: &UserPrincipal, _agent: AgentId) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Company, Network, Organization};
    use crate::store::memory::MemoryStore;

    async fn harness() -> (Arc<MemoryStore>, AgentRegistry<MemoryStore, AllowAllOracle>) {
        let store = Arc::new(MemoryStore::new());
        store
            .seed_tenancy(
                Company { id: 7, name: "acme".into() },
                Organization { id: 1, name: "acme-org".into(), owner_user_id: 1, owner_company_id: 7 },
                Network { id: 3, organization_id: 1, name: "hq".into() },
            )
            .await;
        let registry = AgentRegistry::new(Arc::clone(&store), Arc::new(AllowAllOracle));
        (store, registry)
    }

    fn caller() -> UserPrincipal {
        UserPrincipal { user_id: 1, role: Role::FullControl, company_id: Some(7), engineer_tier: None }
    }

    #[tokio::test]
    async fn register_rejects_mismatched_company() {
        let (_, registry) = harness().await;
        let mut bad_caller = caller();
        bad_caller.company_id = Some(99);
        let err = registry.register(&bad_caller, "agent-1".into(), 1, &[3]).await.unwrap_err();
        assert_eq!(err, CoreError::PermissionDenied);
    }

    #[tokio::test]
    async fn register_rejects_network_outside_organization() {
        let (store, registry) = harness().await;
        store
            .seed_tenancy(
                Company { id: 8, name: "other".into() },
                Organization { id: 2, name: "other-org".into(), owner_user_id: 2, owner_company_id: 8 },
                Network { id: 9, organization_id: 2, name: "branch".into() },
            )
            .await;
        let err = registry.register(&caller(), "agent-1".into(), 1, &[9]).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn derive_status_boundary_is_inclusive() {
        let mut agent = sample_agent();
        agent.last_heartbeat = Some(now() - Duration::seconds(60));
        assert_eq!(derive_status(&agent), AgentStatus::Online);

        agent.last_heartbeat = Some(now() - Duration::seconds(61));
        assert_eq!(derive_status(&agent), AgentStatus::Offline);
    }

    #[tokio::test]
    async fn select_online_agent_excludes_stale_and_revoked() {
        let (store, registry) = harness().await;
        let caller = caller();
        let agent = registry.register(&caller, "agent-11".into(), 1, &[3]).await.unwrap();

        assert_eq!(registry.select_online_agent(3, None).await.unwrap(), None);

        let mut fresh = store.get_agent(agent.id).await.unwrap().unwrap();
        fresh.token_status = TokenStatus::Active;
        fresh.last_heartbeat = Some(now() - Duration::seconds(10));
        store.update_agent(fresh).await.unwrap();
        assert_eq!(registry.select_online_agent(3, None).await.unwrap(), Some(agent.id));

        let mut stale = store.get_agent(agent.id).await.unwrap().unwrap();
        stale.last_heartbeat = Some(now() - Duration::minutes(6));
        store.update_agent(stale).await.unwrap();
        assert_eq!(registry.select_online_agent(3, None).await.unwrap(), None);
    }

    fn sample_agent() -> Agent {
        Agent {
            id: 11,
            name: "agent-11".into(),
            company_id: 7,
            organization_id: 1,
            token_fingerprint: "fp".into(),
            token_status: TokenStatus::Active,
            capabilities: Default::default(),
            version: None,
            declared_status: None,
            last_heartbeat: None,
            last_used_at: None,
            last_ip: None,
            created_at: now(),
            created_by: None,
            issued_at: now(),
            rotated_at: None,
            revoked_at: None,
            expires_at: None,
        }
    }
}
