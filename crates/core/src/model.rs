// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent entity types shared across the coordination subsystem.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::Capability;

pub type AgentId = i64;
pub type NetworkId = i64;
pub type CompanyId = i64;
pub type OrganizationId = i64;
pub type DeviceId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Active,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub company_id: CompanyId,
    pub organization_id: OrganizationId,
    /// SHA-256 fingerprint of the current token, base64-encoded. The raw
    /// token itself is never stored (see [`crate::token::TokenStore`]).
    pub token_fingerprint: String,
    pub token_status: TokenStatus,
    pub capabilities: HashSet<Capability>,
    pub version: Option<String>,
    /// Stored status field as last declared by the agent. The derived,
    /// read-time status (`AgentRegistry::derive_status`) takes precedence.
    pub declared_status: Option<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub issued_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Read-only view of an agent plus its derived online/offline status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentView {
    #[serde(flatten)]
    pub agent: Agent,
    pub status: AgentStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentNetworkBinding {
    pub agent_id: AgentId,
    pub network_id: NetworkId,
    pub company_id: CompanyId,
    pub organization_id: OrganizationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Issued,
    Rotated,
    Revoked,
    Activated,
    Extended,
    Heartbeat,
    AuthenticationSuccess,
    AuthenticationFailure,
    Ping,
    Pong,
    OrganizationsAccessed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTokenAuditEntry {
    pub agent_id: AgentId,
    pub event_type: AuditEventType,
    pub timestamp: DateTime<Utc>,
    pub actor_user_id: Option<UserId>,
    pub ip: Option<String>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    Manual,
    Auto,
    Refresh,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub enable_password: Option<String>,
    pub ssh_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub ip: String,
    pub network_id: NetworkId,
    pub company_id: CompanyId,
    pub owner_id: UserId,
    pub name: String,
    pub device_type: Option<String>,
    pub platform: Option<String>,
    pub os_version: Option<String>,
    pub serial: Option<String>,
    pub credentials: DeviceCredentials,
    pub ping_status: bool,
    pub snmp_status: bool,
    pub ssh_status: bool,
    pub discovery_method: DiscoveryMethod,
    pub last_status_check: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnmpConfig {
    pub device_id: DeviceId,
    pub version: SnmpVersion,
    pub community: Option<String>,
    pub v3_username: Option<String>,
    pub v3_auth_password: Option<String>,
    pub v3_priv_password: Option<String>,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceTopology {
    pub device_id: DeviceId,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub hostname: Option<String>,
    pub uptime_seconds: Option<u64>,
    pub last_polled: Option<DateTime<Utc>>,
    pub health_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    pub organization_id: OrganizationId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub owner_user_id: UserId,
    pub owner_company_id: CompanyId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
}
