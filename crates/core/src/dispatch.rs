// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch Table: at most one pending work item per agent, with
//! enqueue-overwrites-pending semantics and a split read discipline between
//! one-shot and sticky item kinds.
//!
//! A single-slot-per-agent map (`HashMap<AgentId, WorkItem>`,
//! insert-replaces) with a read-and-remove vs. read-and-retain poll split
//! depending on item kind.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::model::{AgentId, NetworkId};
use crate::time::now;

pub type SessionId = uuid::Uuid;

/// The kind of work an agent may be asked to perform. `StatusTest` is
/// consumed on poll ("fire and forget"); `Discovery` and `TopologyRefresh`
/// remain visible to subsequent polls until the agent explicitly
/// acknowledges them, so a retried poll (e.g. after a dropped response) sees
/// the same item rather than silently losing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    StatusTest,
    Discovery,
    TopologyRefresh,
}

impl WorkKind {
    /// Whether a poll should remove this item from the table immediately.
    fn is_read_and_remove(self) -> bool {
        matches!(self, Self::StatusTest)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub kind: WorkKind,
    pub session_id: Option<SessionId>,
    pub network_id: NetworkId,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct DispatchTable {
    pending: RwLock<HashMap<AgentId, WorkItem>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `item` for `agent_id`. Any existing pending item for that
    /// agent — acknowledged or not — is discarded: enqueue always
    /// overwrites whatever was pending.
    pub async fn enqueue(&self, agent_id: AgentId, item: WorkItem) {
        self.pending.write().await.insert(agent_id, item);
    }

    /// Poll for `agent_id`'s pending work. `StatusTest` items are removed on
    /// read; `Discovery`/`TopologyRefresh` items are left in place until
    /// [`Self::acknowledge`] is called, so a second poll with no
    /// acknowledgment in between returns the identical item.
    pub async fn poll(&self, agent_id: AgentId) -> Option<WorkItem> {
        let mut pending = self.pending.write().await;
        let item = pending.get(&agent_id)?.clone();
        if item.kind.is_read_and_remove() {
            pending.remove(&agent_id);
        }
        Some(item)
    }

    /// Explicitly clear a sticky item once the agent has taken ownership of
    /// it (e.g. after it reports back a session has started). No-op for
    /// read-and-remove kinds, which are already gone after the first poll.
    pub async fn acknowledge(&self, agent_id: AgentId) {
        self.pending.write().await.remove(&agent_id);
    }

    /// Cancel any pending item for `agent_id` without it ever being polled.
    pub async fn cancel(&self, agent_id: AgentId) {
        self.pending.write().await.remove(&agent_id);
    }

    pub async fn peek(&self, agent_id: AgentId) -> Option<WorkItem> {
        self.pending.read().await.get(&agent_id).cloned()
    }

    pub async fn has_pending(&self, agent_id: AgentId) -> bool {
        self.pending.read().await.contains_key(&agent_id)
    }
}

pub fn new_session_id() -> SessionId {
    uuid::Uuid::new_v4()
}

pub fn status_test_item(network_id: NetworkId) -> WorkItem {
    WorkItem {
        kind: WorkKind::StatusTest,
        session_id: None,
        network_id,
        payload: serde_json::json!({}),
        enqueued_at: now(),
    }
}

pub fn discovery_item(
    session_id: SessionId,
    network_id: NetworkId,
    payload: serde_json::Value,
) -> WorkItem {
    WorkItem {
        kind: WorkKind::Discovery,
        session_id: Some(session_id),
        network_id,
        payload,
        enqueued_at: now(),
    }
}

pub fn topology_refresh_item(
    session_id: SessionId,
    network_id: NetworkId,
    payload: serde_json::Value,
) -> WorkItem {
    WorkItem {
        kind: WorkKind::TopologyRefresh,
        session_id: Some(session_id),
        network_id,
        payload,
        enqueued_at: now(),
    }
}

/// Thin validation helper used by the dispatch route: confirm a poll result
/// actually belongs to the session the caller expects before acting on it.
pub fn require_session(item: &WorkItem, expected: SessionId) -> CoreResult<()> {
    match item.session_id {
        Some(sid) if sid == expected => Ok(()),
        _ => Err(CoreError::Conflict("work item does not match expected session".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_test_is_removed_on_first_poll() {
        let table = DispatchTable::new();
        table.enqueue(1, status_test_item(3)).await;

        assert!(table.poll(1).await.is_some());
        assert!(table.poll(1).await.is_none());
    }

    #[tokio::test]
    async fn discovery_item_survives_repeated_polls_until_acknowledged() {
        let table = DispatchTable::new();
        let sid = new_session_id();
        table.enqueue(1, discovery_item(sid, 3, serde_json::json!({}))).await;

        let first = table.poll(1).await.unwrap();
        let second = table.poll(1).await.unwrap();
        assert_eq!(first.session_id, second.session_id);

        table.acknowledge(1).await;
        assert!(table.poll(1).await.is_none());
    }

    #[tokio::test]
    async fn enqueue_overwrites_unacknowledged_pending_item() {
        let table = DispatchTable::new();
        let first_session = new_session_id();
        let second_session = new_session_id();
        table.enqueue(1, discovery_item(first_session, 3, serde_json::json!({}))).await;
        table.enqueue(1, discovery_item(second_session, 3, serde_json::json!({}))).await;

        let polled = table.poll(1).await.unwrap();
        assert_eq!(polled.session_id, Some(second_session));
    }

    #[tokio::test]
    async fn cancel_removes_without_polling() {
        let table = DispatchTable::new();
        table.enqueue(1, status_test_item(3)).await;
        table.cancel(1).await;
        assert!(table.poll(1).await.is_none());
    }

    #[tokio::test]
    async fn each_agent_has_independent_slot() {
        let table = DispatchTable::new();
        table.enqueue(1, status_test_item(3)).await;
        assert!(table.peek(2).await.is_none());
        assert!(table.peek(1).await.is_some());
    }
}
