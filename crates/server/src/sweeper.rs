// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background Sweeper: a single long-lived task, started at process boot,
//! that ticks on a fixed period and enqueues a `status_test` work item for
//! every network that has at least one device.
//!
//! Snapshots the collection under a read lock, then acts on the snapshot
//! outside any lock, isolating per-item failures so one bad network never
//! stops the sweep.

use std::sync::Arc;

use meshctl_core::dispatch::status_test_item;
use meshctl_core::permission::PermissionOracle;
use meshctl_core::store::Store;

use crate::auth::UserAuthResolver;
use crate::state::AppState;

/// Spawn the sweeper. Runs until `state.shutdown` is cancelled.
pub fn spawn<S: Store + 'static, P: PermissionOracle + 'static, U: UserAuthResolver + 'static>(
    state: Arc<AppState<S, P, U>>,
) {
    let period = state.config.sweep_period();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            sweep_once(&state).await;

            let pruned = state.core.sessions.prune(state.config.session_max_age()).await;
            if pruned > 0 {
                tracing::info!(pruned, "pruned stale terminal sessions");
            }
        }
    });
}

/// Run one sweep tick directly. Exposed (not just called from [`spawn`]'s
/// timer loop) so integration tests can drive the sweeper deterministically
/// instead of waiting on a real wall-clock interval.
pub async fn sweep_once<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    state: &AppState<S, P, U>,
) {
    let networks = match state.core.store.list_networks_with_devices().await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(err = %e, "sweeper: failed to enumerate networks, skipping this tick");
            return;
        }
    };

    for network_id in networks {
        if let Err(e) = sweep_network(state, network_id).await {
            // Per-network failures are logged and isolated: they never stop
            // the sweep from reaching the remaining networks.
            tracing::warn!(network_id, err = %e, "sweeper: skipping network after error");
        }
    }
}

async fn sweep_network<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    state: &AppState<S, P, U>,
    network_id: meshctl_core::model::NetworkId,
) -> anyhow::Result<()> {
    let devices = state.core.store.list_devices_for_network(network_id).await?;
    if devices.is_empty() {
        return Ok(());
    }

    let Some(agent_id) = state.core.registry.select_online_agent(network_id, None).await? else {
        tracing::debug!(network_id, "sweeper: no online agent available, skipping network");
        return Ok(());
    };

    let mut payloads = Vec::with_capacity(devices.len());
    for device in &devices {
        let snmp = state.core.store.get_snmp_config(device.id).await?;
        payloads.push(serde_json::json!({
            "id": device.id,
            "ip": device.ip,
            "name": device.name,
            "network_id": device.network_id,
            "company_id": device.company_id,
            "snmp_config": snmp,
        }));
    }

    let mut item = status_test_item(network_id);
    item.payload = serde_json::json!({
        "session_id": format!("background_status_{}", short_uuid()),
        "source": "background",
        "devices": payloads,
    });

    // Overwriting any prior undelivered background item for this agent is
    // intentional: freshness over completeness.
    state.core.dispatch.enqueue(agent_id, item).await;
    tracing::debug!(network_id, agent_id, device_count = devices.len(), "sweeper: enqueued status_test");
    Ok(())
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
