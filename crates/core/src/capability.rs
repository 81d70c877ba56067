// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent capability vocabulary.
//!
//! Upstream systems represent capabilities both as a list of strings and
//! as a structured record with fixed keys. This crate normalizes on a
//! closed `HashSet<Capability>` and never round-trips through the
//! ambiguous form.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SnmpDiscovery,
    SshConfig,
    HealthMonitoring,
    TopologyMapping,
    ComplianceScanning,
    BackupManagement,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnmpDiscovery => "snmp_discovery",
            Self::SshConfig => "ssh_config",
            Self::HealthMonitoring => "health_monitoring",
            Self::TopologyMapping => "topology_mapping",
            Self::ComplianceScanning => "compliance_scanning",
            Self::BackupManagement => "backup_management",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "snmp_discovery" => Some(Self::SnmpDiscovery),
            "ssh_config" => Some(Self::SshConfig),
            "health_monitoring" => Some(Self::HealthMonitoring),
            "topology_mapping" => Some(Self::TopologyMapping),
            "compliance_scanning" => Some(Self::ComplianceScanning),
            "backup_management" => Some(Self::BackupManagement),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a list of raw capability strings into a closed set, dropping
/// anything outside the vocabulary rather than failing the whole read.
pub fn normalize(raw: impl IntoIterator<Item = impl AsRef<str>>) -> HashSet<Capability> {
    raw.into_iter().filter_map(|s| Capability::parse(s.as_ref())).collect()
}
