// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat / Liveness Monitor: the thin write path agents hit on every
//! poll cycle, plus the ping/pong liveness probe. Deliberately lazy —
//! there is no explicit "agent went offline" event; `AgentRegistry`
//! derives that at read time from the timestamps this module stamps.

use std::sync::Arc;

use crate::error::CoreResult;
use crate::model::{AgentId, AuditEventType, AgentTokenAuditEntry};
use crate::store::Store;
use crate::time::now;

pub struct HeartbeatMonitor<S: Store> {
    store: Arc<S>,
}

impl<S: Store> HeartbeatMonitor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stamp `last_heartbeat`/`last_used_at` for `agent_id`. Called on every
    /// authenticated agent request that the routes consider a liveness
    /// signal (heartbeat, poll, ping, status).
    pub async fn record(&self, agent_id: AgentId, ip: Option<String>) -> CoreResult<()> {
        let mut agent = self.store.get_agent(agent_id).await?.ok_or(crate::error::CoreError::NotFound("agent"))?;
        agent.last_heartbeat = Some(now());
        agent.last_used_at = Some(now());
        if ip.is_some() {
            agent.last_ip = ip.clone();
        }
        self.store.update_agent(agent).await?;
        self.store
            .append_audit(AgentTokenAuditEntry {
                agent_id,
                event_type: AuditEventType::Heartbeat,
                timestamp: now(),
                actor_user_id: None,
                ip,
                details: serde_json::json!({}),
            })
            .await?;
        Ok(())
    }

    /// Respond to an agent's ping with a pong, stamping liveness as a side
    /// effect the same way [`record`](Self::record) does.
    pub async fn pong(&self, agent_id: AgentId, ip: Option<String>) -> CoreResult<()> {
        self.record(agent_id, ip.clone()).await?;
        self.store
            .append_audit(AgentTokenAuditEntry {
                agent_id,
                event_type: AuditEventType::Pong,
                timestamp: now(),
                actor_user_id: None,
                ip,
                details: serde_json::json!({}),
            })
            .await?;
        Ok(())
    }
}
