// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence seam: a transactional key/row store over the entity
//! tables this crate defines. This module declares that trait and ships an
//! in-memory implementation for tests and the standalone demo binary; a
//! real deployment backs [`Store`] with its own row store and transaction
//! manager.

pub mod memory;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::model::*;

/// Transactional row store. Every method that mutates related rows (e.g.
/// `upsert_device` plus its SNMP/topology siblings) is expected to commit
/// atomically; the reconciler relies on that.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_agent(&self, agent: Agent) -> CoreResult<Agent>;
    async fn get_agent(&self, id: AgentId) -> CoreResult<Option<Agent>>;
    async fn update_agent(&self, agent: Agent) -> CoreResult<()>;
    async fn delete_agent(&self, id: AgentId) -> CoreResult<()>;
    async fn list_agents(&self, company_id: Option<CompanyId>) -> CoreResult<Vec<Agent>>;
    /// Agent currently holding this token fingerprint, if any (fingerprints
    /// are unique across all agents including historical tokens).
    async fn find_agent_by_token_fingerprint(
        &self,
        fingerprint: &str,
    ) -> CoreResult<Option<Agent>>;

    async fn bind_agent_network(&self, binding: AgentNetworkBinding) -> CoreResult<()>;
    async fn unbind_agent_network(&self, agent_id: AgentId, network_id: NetworkId)
        -> CoreResult<()>;
    async fn list_bindings_for_agent(&self, agent_id: AgentId)
        -> CoreResult<Vec<AgentNetworkBinding>>;
    async fn list_bindings_for_network(
        &self,
        network_id: NetworkId,
    ) -> CoreResult<Vec<AgentNetworkBinding>>;

    async fn append_audit(&self, entry: AgentTokenAuditEntry) -> CoreResult<()>;
    async fn list_audit(
        &self,
        agent_id: AgentId,
        event_type: Option<AuditEventType>,
        limit: usize,
    ) -> CoreResult<Vec<AgentTokenAuditEntry>>;

    async fn get_network(&self, id: NetworkId) -> CoreResult<Option<Network>>;
    async fn list_networks_with_devices(&self) -> CoreResult<Vec<NetworkId>>;
    async fn get_organization(&self, id: OrganizationId) -> CoreResult<Option<Organization>>;
    async fn get_company(&self, id: CompanyId) -> CoreResult<Option<Company>>;

    async fn get_device_by_ip(
        &self,
        network_id: NetworkId,
        ip: &str,
    ) -> CoreResult<Option<Device>>;
    async fn get_device(&self, id: DeviceId) -> CoreResult<Option<Device>>;
    async fn list_devices_for_network(&self, network_id: NetworkId) -> CoreResult<Vec<Device>>;
    /// Upsert a device keyed by `(network_id, ip)`. Returns the resulting row.
    async fn upsert_device(&self, device: Device) -> CoreResult<Device>;

    async fn get_snmp_config(&self, device_id: DeviceId) -> CoreResult<Option<DeviceSnmpConfig>>;
    async fn upsert_snmp_config(&self, config: DeviceSnmpConfig) -> CoreResult<()>;

    async fn get_topology(&self, device_id: DeviceId) -> CoreResult<Option<DeviceTopology>>;
    async fn upsert_topology(&self, topology: DeviceTopology) -> CoreResult<()>;
}
