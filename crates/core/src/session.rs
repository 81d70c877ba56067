// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Tracker: lifecycle and progress bookkeeping for
//! discovery/topology-refresh work in flight on an agent.
//!
//! A `HashMap<SessionId, Session>` behind an `RwLock`, with a monotonic
//! 0-100 `progress` gauge in place of a raw byte counter.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::dispatch::SessionId;
use crate::error::{CoreError, CoreResult};
use crate::model::{AgentId, DeviceId, NetworkId};
use crate::time::now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub agent_id: AgentId,
    pub network_id: NetworkId,
    pub state: SessionState,
    /// 0-100, monotonically non-decreasing except across a [`retry`](SessionTracker::retry).
    pub progress: u8,
    pub errors: Vec<String>,
    /// Ids of devices reconciled into the store over the session's life,
    /// accumulated across every `progress` report.
    pub discovered_devices: Vec<DeviceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retry_count: u32,
}

#[derive(Default)]
pub struct SessionTracker {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, id: SessionId, agent_id: AgentId, network_id: NetworkId) -> Session {
        let session = Session {
            id,
            agent_id,
            network_id,
            state: SessionState::Pending,
            progress: 0,
            errors: Vec::new(),
            discovered_devices: Vec::new(),
            created_at: now(),
            updated_at: now(),
            retry_count: 0,
        };
        self.sessions.write().await.insert(id, session.clone());
        session
    }

    pub async fn get(&self, id: SessionId) -> CoreResult<Session> {
        self.sessions.read().await.get(&id).cloned().ok_or(CoreError::NotFound("session"))
    }

    pub async fn list_active(&self, agent_id: Option<AgentId>) -> CoreResult<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut list: Vec<Session> = sessions
            .values()
            .filter(|s| !s.state.is_terminal())
            .filter(|s| agent_id.map_or(true, |a| s.agent_id == a))
            .cloned()
            .collect();
        list.sort_by_key(|s| s.created_at);
        Ok(list)
    }

    /// Advance a running session's progress. Rejects regressions (progress
    /// never decreases outside of `retry`) and rejects any update once the
    /// session has reached a terminal state.
    pub async fn update_progress(
        &self,
        id: SessionId,
        progress: u8,
        state: Option<SessionState>,
    ) -> CoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::NotFound("session"))?;

        if session.state.is_terminal() {
            return Err(CoreError::Conflict("session already reached a terminal state".into()));
        }
        if progress < session.progress {
            return Err(CoreError::Validation(format!(
                "progress must not decrease ({progress} < {})",
                session.progress
            )));
        }

        session.progress = progress.min(100);
        if let Some(state) = state {
            session.state = state;
        } else if session.state == SessionState::Pending {
            session.state = SessionState::Running;
        }
        session.updated_at = now();
        Ok(session.clone())
    }

    pub async fn append_error(&self, id: SessionId, error: String) -> CoreResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::NotFound("session"))?;
        session.errors.push(error);
        session.updated_at = now();
        Ok(())
    }

    /// Record devices reconciled by a progress report, de-duplicated against
    /// ones already accumulated on the session.
    pub async fn record_devices(&self, id: SessionId, device_ids: impl IntoIterator<Item = DeviceId>) -> CoreResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::NotFound("session"))?;
        for device_id in device_ids {
            if !session.discovered_devices.contains(&device_id) {
                session.discovered_devices.push(device_id);
            }
        }
        session.updated_at = now();
        Ok(())
    }

    pub async fn complete(&self, id: SessionId, succeeded: bool) -> CoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::NotFound("session"))?;
        if session.state.is_terminal() {
            return Err(CoreError::Conflict("session already reached a terminal state".into()));
        }
        session.state = if succeeded { SessionState::Completed } else { SessionState::Failed };
        if succeeded {
            session.progress = 100;
        }
        session.updated_at = now();
        Ok(session.clone())
    }

    pub async fn cancel(&self, id: SessionId) -> CoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::NotFound("session"))?;
        if session.state.is_terminal() {
            return Err(CoreError::Conflict("session already reached a terminal state".into()));
        }
        session.state = SessionState::Cancelled;
        session.updated_at = now();
        Ok(session.clone())
    }

    /// Reset a failed/cancelled session back to `Pending` with `progress`
    /// cleared to zero — the one sanctioned progress regression.
    pub async fn retry(&self, id: SessionId) -> CoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(CoreError::NotFound("session"))?;
        if session.state == SessionState::Completed {
            return Err(CoreError::Conflict("cannot retry a completed session".into()));
        }
        session.state = SessionState::Pending;
        session.progress = 0;
        session.errors.clear();
        session.discovered_devices.clear();
        session.retry_count += 1;
        session.updated_at = now();
        Ok(session.clone())
    }

    /// Drop terminal sessions older than `max_age`, called from the
    /// background sweeper.
    pub async fn prune(&self, max_age: chrono::Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let cutoff = now() - max_age;
        let before = sessions.len();
        sessions.retain(|_, s| !(s.state.is_terminal() && s.updated_at < cutoff));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::new_session_id;

    #[tokio::test]
    async fn progress_must_not_decrease() {
        let tracker = SessionTracker::new();
        let id = new_session_id();
        tracker.create(id, 1, 3).await;
        tracker.update_progress(id, 40, None).await.unwrap();

        let err = tracker.update_progress(id, 10, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn terminal_session_rejects_further_updates() {
        let tracker = SessionTracker::new();
        let id = new_session_id();
        tracker.create(id, 1, 3).await;
        tracker.complete(id, true).await.unwrap();

        let err = tracker.update_progress(id, 50, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn retry_resets_progress_and_clears_errors() {
        let tracker = SessionTracker::new();
        let id = new_session_id();
        tracker.create(id, 1, 3).await;
        tracker.update_progress(id, 75, None).await.unwrap();
        tracker.append_error(id, "snmp timeout".into()).await.unwrap();
        tracker.complete(id, false).await.unwrap();

        let retried = tracker.retry(id).await.unwrap();
        assert_eq!(retried.progress, 0);
        assert!(retried.errors.is_empty());
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.state, SessionState::Pending);
    }

    #[tokio::test]
    async fn completed_session_cannot_be_retried() {
        let tracker = SessionTracker::new();
        let id = new_session_id();
        tracker.create(id, 1, 3).await;
        tracker.complete(id, true).await.unwrap();

        let err = tracker.retry(id).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn prune_drops_only_stale_terminal_sessions() {
        let tracker = SessionTracker::new();
        let stale = new_session_id();
        let fresh = new_session_id();
        tracker.create(stale, 1, 3).await;
        tracker.complete(stale, true).await.unwrap();
        tracker.create(fresh, 2, 3).await;

        let removed = tracker.prune(chrono::Duration::seconds(-1)).await;
        assert_eq!(removed, 1);
        assert!(tracker.get(stale).await.is_err());
        assert!(tracker.get(fresh).await.is_ok());
    }

    proptest::proptest! {
        /// Checked against arbitrary non-decreasing update sequences rather
        /// than a handful of fixed cases: progress never regresses across
        /// any run of `update_progress` calls that never itself supplies a
        /// lower value.
        #[test]
        fn progress_is_non_decreasing_over_arbitrary_ascending_sequences(
            steps in proptest::collection::vec(0u8..=100, 1..20)
        ) {
            let mut ascending = steps;
            ascending.sort_unstable();

            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let observed: Vec<u8> = rt.block_on(async {
                let tracker = SessionTracker::new();
                let id = new_session_id();
                tracker.create(id, 1, 3).await;
                let mut observed = Vec::with_capacity(ascending.len());
                for value in ascending {
                    let session = tracker.update_progress(id, value, None).await.unwrap();
                    observed.push(session.progress);
                }
                observed
            });

            for window in observed.windows(2) {
                proptest::prop_assert!(window[1] >= window[0]);
            }
        }
    }
}
