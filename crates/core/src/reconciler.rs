// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result Reconciler: folds an agent's discovery/topology report back into
//! the `Device`/`DeviceSnmpConfig`/`DeviceTopology` rows, idempotently
//! keyed by `(network_id, ip)`.
//!
//! Folds a batch of untrusted reports into owned state one item at a time,
//! with per-item error capture rather than aborting the whole batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::model::{
    CompanyId, Device, DeviceCredentials, DeviceSnmpConfig, DeviceTopology, DiscoveryMethod,
    NetworkId, SnmpVersion, UserId,
};
use crate::store::Store;
use crate::time::now;

/// One device's worth of a report, as submitted by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceReport {
    pub ip: String,
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub platform: Option<String>,
    pub os_version: Option<String>,
    pub serial: Option<String>,
    pub ping_status: bool,
    pub snmp_status: bool,
    pub ssh_status: bool,
    pub discovery_method: DiscoveryMethod,
    pub snmp: Option<SnmpReport>,
    pub topology: Option<TopologyReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpReport {
    pub version: SnmpVersion,
    pub community: Option<String>,
    pub v3_username: Option<String>,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyReport {
    /// Raw vendor/model/description string as returned by SNMP sysDescr or
    /// SSH banner — parsed heuristically, never trusted verbatim.
    pub raw_description: Option<String>,
    pub hostname: Option<String>,
    /// Raw uptime string, e.g. `"12d 3h 4m 5s"`.
    pub uptime_raw: Option<String>,
    pub health_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub ip: String,
    pub device_id: Option<i64>,
    pub error: Option<String>,
}

pub struct Reconciler<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fold a batch of device reports into the store. Each item is its own
    /// transactional boundary: one bad report does not abort the rest of
    /// the batch, and failures surface per-item rather than failing the
    /// whole session.
    pub async fn reconcile_batch(
        &self,
        network_id: NetworkId,
        company_id: CompanyId,
        owner_id: UserId,
        reports: Vec<DeviceReport>,
    ) -> Vec<ReconcileOutcome> {
        let mut outcomes = Vec::with_capacity(reports.len());
        for report in reports {
            let ip = report.ip.clone();
            match self.reconcile_one(network_id, company_id, owner_id, report).await {
                Ok(device) => {
                    outcomes.push(ReconcileOutcome { ip, device_id: Some(device.id), error: None })
                }
                Err(e) => outcomes.push(ReconcileOutcome { ip, device_id: None, error: Some(e.detail()) }),
            }
        }
        outcomes
    }

    async fn reconcile_one(
        &self,
        network_id: NetworkId,
        company_id: CompanyId,
        owner_id: UserId,
        report: DeviceReport,
    ) -> CoreResult<Device> {
        let existing = self.store.get_device_by_ip(network_id, &report.ip).await?;

        let discovery_method = match &existing {
            Some(existing) => sticky_discovery_method(existing.discovery_method, report.discovery_method),
            None => report.discovery_method,
        };

        let device = Device {
            id: existing.as_ref().map(|d| d.id).unwrap_or(0),
            ip: report.ip.clone(),
            network_id,
            company_id,
            owner_id,
            name: report.name.unwrap_or_else(|| report.ip.clone()),
            device_type: report.device_type,
            platform: report.platform,
            os_version: report.os_version,
            serial: report.serial,
            credentials: existing.as_ref().map(|d| d.credentials.clone()).unwrap_or(DeviceCredentials::default()),
            ping_status: report.ping_status,
            snmp_status: report.snmp_status,
            ssh_status: report.ssh_status,
            discovery_method,
            last_status_check: Some(now()),
            created_at: existing.as_ref().map(|d| d.created_at).unwrap_or_else(now),
            updated_at: now(),
        };
        let device = self.store.upsert_device(device).await?;

        if let Some(snmp) = report.snmp {
            self.store
                .upsert_snmp_config(DeviceSnmpConfig {
                    device_id: device.id,
                    version: snmp.version,
                    community: snmp.community,
                    v3_username: snmp.v3_username,
                    v3_auth_password: None,
                    v3_priv_password: None,
                    port: snmp.port,
                })
                .await?;
        }

        if let Some(topo) = report.topology {
            let (vendor, model) = topo
                .raw_description
                .as_deref()
                .map(classify_vendor_model)
                .unwrap_or((None, None));
            self.store
                .upsert_topology(DeviceTopology {
                    device_id: device.id,
                    vendor,
                    model,
                    hostname: topo.hostname,
                    uptime_seconds: topo.uptime_raw.as_deref().and_then(parse_uptime),
                    last_polled: Some(now()),
                    health_data: topo.health_data,
                })
                .await?;
        }

        Ok(device)
    }
}

/// Discovery method never regresses from automated back to manual: a
/// device a human entered by hand that later gets auto-discovered
/// is upgraded to `Auto`/`Refresh`; one discovered automatically never gets
/// demoted back to `Manual` just because a later report happens to carry it.
fn sticky_discovery_method(existing: DiscoveryMethod, incoming: DiscoveryMethod) -> DiscoveryMethod {
    use DiscoveryMethod::*;
    match (existing, incoming) {
        (Manual, other) => other,
        (_, Manual) => existing,
        (_, incoming) => incoming,
    }
}

/// Vendor/model heuristics: case-insensitive substring matching against a
/// known vocabulary. Unmatched input yields `(None, None)` rather than a
/// guess.
fn classify_vendor_model(raw: &str) -> (Option<String>, Option<String>) {
    let lower = raw.to_lowercase();
    let vendor = if ["cisco", "ios", "nx-os", "catalyst"].iter().any(|s| lower.contains(s)) {
        Some("Cisco")
    } else if ["juniper", "junos"].iter().any(|s| lower.contains(s)) {
        Some("Juniper")
    } else if ["hp", "procurve"].iter().any(|s| lower.contains(s)) {
        Some("HP")
    } else if lower.contains("dell") {
        Some("Dell")
    } else {
        None
    };

    let model = vendor.and_then(|_| {
        raw.split_whitespace()
            .find(|tok| tok.chars().any(|c| c.is_ascii_digit()) && tok.len() > 2)
            .map(|s| s.to_string())
    });

    (vendor.map(str::to_string), model)
}

/// Parse an uptime string of the form `"<n>d <n>h <n>m <n>s"`, where any
/// leading components may be omitted (e.g. `"4m 5s"` or just `"5s"`).
/// Malformed input yields `None` rather than a partial result.
fn parse_uptime(raw: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let mut saw_any = false;
    for token in raw.split_whitespace() {
        let (digits, unit) = token.split_at(token.len().checked_sub(1)?);
        let value: u64 = digits.parse().ok()?;
        let seconds = match unit {
            "d" => value.checked_mul(86_400)?,
            "h" => value.checked_mul(3_600)?,
            "m" => value.checked_mul(60)?,
            "s" => value,
            _ => return None,
        };
        total = total.checked_add(seconds)?;
        saw_any = true;
    }
    saw_any.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn report(ip: &str, method: DiscoveryMethod) -> DeviceReport {
        DeviceReport {
            ip: ip.to_string(),
            name: None,
            device_type: None,
            platform: None,
            os_version: None,
            serial: None,
            ping_status: true,
            snmp_status: true,
            ssh_status: false,
            discovery_method: method,
            snmp: None,
            topology: Some(TopologyReport {
                raw_description: Some("Cisco IOS Software, C2960X".into()),
                hostname: Some("sw1".into()),
                uptime_raw: Some("12d 3h 4m 5s".into()),
                health_data: serde_json::json!({}),
            }),
        }
    }

    #[tokio::test]
    async fn reconcile_upserts_idempotently_by_network_and_ip() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(Arc::clone(&store));

        let outcomes = reconciler
            .reconcile_batch(3, 7, 1, vec![report("10.0.0.1", DiscoveryMethod::Auto)])
            .await;
        let first_id = outcomes[0].device_id.unwrap();

        let outcomes = reconciler
            .reconcile_batch(3, 7, 1, vec![report("10.0.0.1", DiscoveryMethod::Auto)])
            .await;
        assert_eq!(outcomes[0].device_id, Some(first_id));
        assert_eq!(store.list_devices_for_network(3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn discovery_method_never_regresses_from_auto_to_manual() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(Arc::clone(&store));

        reconciler.reconcile_batch(3, 7, 1, vec![report("10.0.0.2", DiscoveryMethod::Auto)]).await;
        reconciler.reconcile_batch(3, 7, 1, vec![report("10.0.0.2", DiscoveryMethod::Manual)]).await;

        let device = store.get_device_by_ip(3, "10.0.0.2").await.unwrap().unwrap();
        assert_eq!(device.discovery_method, DiscoveryMethod::Auto);
    }

    #[tokio::test]
    async fn manual_device_is_upgraded_by_later_auto_discovery() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(Arc::clone(&store));

        reconciler.reconcile_batch(3, 7, 1, vec![report("10.0.0.3", DiscoveryMethod::Manual)]).await;
        reconciler.reconcile_batch(3, 7, 1, vec![report("10.0.0.3", DiscoveryMethod::Refresh)]).await;

        let device = store.get_device_by_ip(3, "10.0.0.3").await.unwrap().unwrap();
        assert_eq!(device.discovery_method, DiscoveryMethod::Refresh);
    }

    #[test]
    fn classify_vendor_model_matches_known_vendors() {
        let (vendor, model) = classify_vendor_model("Cisco IOS Software, C2960X Software");
        assert_eq!(vendor.as_deref(), Some("Cisco"));
        assert_eq!(model.as_deref(), Some("C2960X"));

        assert_eq!(classify_vendor_model("Unknown widget").0, None);
    }

    #[test]
    fn parse_uptime_handles_full_and_partial_strings() {
        assert_eq!(parse_uptime("1d 2h 3m 4s"), Some(86_400 + 7_200 + 180 + 4));
        assert_eq!(parse_uptime("5s"), Some(5));
        assert_eq!(parse_uptime("garbage"), None);
    }
}
