// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`Store`] implementation: a single `RwLock<HashMap<..>>` per
//! concern. Intended for tests and the standalone demo binary, not for
//! production persistence — a real deployment owns its own row store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::model::*;
use crate::store::Store;

#[derive(Default)]
pub struct MemoryStore {
    agents: RwLock<HashMap<AgentId, Agent>>,
    next_agent_id: AtomicI64,
    bindings: RwLock<Vec<AgentNetworkBinding>>,
    audit: RwLock<Vec<AgentTokenAuditEntry>>,
    networks: RwLock<HashMap<NetworkId, Network>>,
    organizations: RwLock<HashMap<OrganizationId, Organization>>,
    companies: RwLock<HashMap<CompanyId, Company>>,
    devices: RwLock<HashMap<DeviceId, Device>>,
    next_device_id: AtomicI64,
    snmp_configs: RwLock<HashMap<DeviceId, DeviceSnmpConfig>>,
    topologies: RwLock<HashMap<DeviceId, DeviceTopology>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a network/organization/company triple (test and demo helper —
    /// the real store's Network/Organization/Company rows are owned
    /// upstream of this crate).
    pub async fn seed_tenancy(&self, company: Company, organization: Organization, network: Network) {
        self.companies.write().await.insert(company.id, company);
        self.organizations.write().await.insert(organization.id, organization);
        self.networks.write().await.insert(network.id, network);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_agent(&self, mut agent: Agent) -> CoreResult<Agent> {
        let mut agents = self.agents.write().await;
        if agent.id == 0 {
            agent.id = self.next_agent_id.fetch_add(1, Ordering::Relaxed) + 1;
        }
        agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: AgentId) -> CoreResult<Option<Agent>> {
        Ok(self.agents.read().await.get(&id).cloned())
    }

    async fn update_agent(&self, agent: Agent) -> CoreResult<()> {
        let mut agents = self.agents.write().await;
        if !agents.contains_key(&agent.id) {
            return Err(CoreError::NotFound("agent"));
        }
        agents.insert(agent.id, agent);
        Ok(())
    }

    async fn delete_agent(&self, id: AgentId) -> CoreResult<()> {
        self.agents.write().await.remove(&id);
        self.bindings.write().await.retain(|b| b.agent_id != id);
        self.audit.write().await.retain(|a| a.agent_id != id);
        Ok(())
    }

    async fn list_agents(&self, company_id: Option<CompanyId>) -> CoreResult<Vec<Agent>> {
        let agents = self.agents.read().await;
        let mut list: Vec<Agent> = agents
            .values()
            .filter(|a| company_id.map_or(true, |c| a.company_id == c))
            .cloned()
            .collect();
        list.sort_by_key(|a| a.id);
        Ok(list)
    }

    async fn find_agent_by_token_fingerprint(
        &self,
        fingerprint: &str,
    ) -> CoreResult<Option<Agent>> {
        Ok(self.agents.read().await.values().find(|a| a.token_fingerprint == fingerprint).cloned())
    }

    async fn bind_agent_network(&self, binding: AgentNetworkBinding) -> CoreResult<()> {
        let mut bindings = self.bindings.write().await;
        if !bindings
            .iter()
            .any(|b| b.agent_id == binding.agent_id && b.network_id == binding.network_id)
        {
            bindings.push(binding);
        }
        Ok(())
    }

    async fn unbind_agent_network(
        &self,
        agent_id: AgentId,
        network_id: NetworkId,
    ) -> CoreResult<()> {
        self.bindings
            .write()
            .await
            .retain(|b| !(b.agent_id == agent_id && b.network_id == network_id));
        Ok(())
    }

    async fn list_bindings_for_agent(
        &self,
        agent_id: AgentId,
    ) -> CoreResult<Vec<AgentNetworkBinding>> {
        Ok(self.bindings.read().await.iter().filter(|b| b.agent_id == agent_id).cloned().collect())
    }

    async fn list_bindings_for_network(
        &self,
        network_id: NetworkId,
    ) -> CoreResult<Vec<AgentNetworkBinding>> {
        Ok(self
            .bindings
            .read()
            .await
            .iter()
            .filter(|b| b.network_id == network_id)
            .cloned()
            .collect())
    }

    async fn append_audit(&self, entry: AgentTokenAuditEntry) -> CoreResult<()> {
        self.audit.write().await.push(entry);
        Ok(())
    }

    async fn list_audit(
        &self,
        agent_id: AgentId,
        event_type: Option<AuditEventType>,
        limit: usize,
    ) -> CoreResult<Vec<AgentTokenAuditEntry>> {
        let audit = self.audit.read().await;
        let mut matching: Vec<AgentTokenAuditEntry> = audit
            .iter()
            .filter(|e| e.agent_id == agent_id)
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .cloned()
            .collect();
        matching.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn get_network(&self, id: NetworkId) -> CoreResult<Option<Network>> {
        Ok(self.networks.read().await.get(&id).cloned())
    }

    async fn list_networks_with_devices(&self) -> CoreResult<Vec<NetworkId>> {
        let devices = self.devices.read().await;
        let mut ids: Vec<NetworkId> = devices.values().map(|d| d.network_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn get_organization(&self, id: OrganizationId) -> CoreResult<Option<Organization>> {
        Ok(self.organizations.read().await.get(&id).cloned())
    }

    async fn get_company(&self, id: CompanyId) -> CoreResult<Option<Company>> {
        Ok(self.companies.read().await.get(&id).cloned())
    }

    async fn get_device_by_ip(
        &self,
        network_id: NetworkId,
        ip: &str,
    ) -> CoreResult<Option<Device>> {
        Ok(self
            .devices
            .read()
            .await
            .values()
            .find(|d| d.network_id == network_id && d.ip == ip)
            .cloned())
    }

    async fn get_device(&self, id: DeviceId) -> CoreResult<Option<Device>> {
        Ok(self.devices.read().await.get(&id).cloned())
    }

    async fn list_devices_for_network(&self, network_id: NetworkId) -> CoreResult<Vec<Device>> {
        Ok(self.devices.read().await.values().filter(|d| d.network_id == network_id).cloned().collect())
    }

    async fn upsert_device(&self, mut device: Device) -> CoreResult<Device> {
        let mut devices = self.devices.write().await;
        let existing =
            devices.values().find(|d| d.network_id == device.network_id && d.ip == device.ip).cloned();
        if let Some(existing) = existing {
            device.id = existing.id;
            device.created_at = existing.created_at;
        } else if device.id == 0 {
            device.id = self.next_device_id.fetch_add(1, Ordering::Relaxed) + 1;
        }
        devices.insert(device.id, device.clone());
        Ok(device)
    }

    async fn get_snmp_config(&self, device_id: DeviceId) -> CoreResult<Option<DeviceSnmpConfig>> {
        Ok(self.snmp_configs.read().await.get(&device_id).cloned())
    }

    async fn upsert_snmp_config(&self, config: DeviceSnmpConfig) -> CoreResult<()> {
        self.snmp_configs.write().await.insert(config.device_id, config);
        Ok(())
    }

    async fn get_topology(&self, device_id: DeviceId) -> CoreResult<Option<DeviceTopology>> {
        Ok(self.topologies.read().await.get(&device_id).cloned())
    }

    async fn upsert_topology(&self, topology: DeviceTopology) -> CoreResult<()> {
        self.topologies.write().await.insert(topology.device_id, topology);
        Ok(())
    }
}
