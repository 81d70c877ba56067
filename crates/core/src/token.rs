// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token Store: issues, authenticates, rotates, revokes, and audits agent
//! bearer tokens. Tracks an account status machine and an append-only
//! event log; rotation logs an 8-char forensic prefix of the old and new
//! tokens, never the tokens themselves.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use sha2::{Digest, Sha256};

use crate::capability::Capability;
use crate::error::{CoreError, CoreResult};
use crate::model::{
    Agent, AgentId, AgentTokenAuditEntry, AuditEventType, CompanyId, OrganizationId, TokenStatus,
    UserId,
};
use crate::store::Store;
use crate::time::now;

/// Minimum length of an issued token ("≥32 chars").
const TOKEN_LENGTH: usize = 40;

/// Successfully authenticated agent principal, carrying everything a
/// dispatch path needs without a second store round-trip.
#[derive(Debug, Clone)]
pub struct AgentPrincipal {
    pub agent_id: AgentId,
    pub company_id: CompanyId,
    pub organization_id: OrganizationId,
    pub capabilities: std::collections::HashSet<Capability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    Invalid,
    Revoked,
    Expired,
}

impl From<AuthError> for CoreError {
    fn from(_: AuthError) -> Self {
        // Never reveals which: invalid, revoked, and expired all surface
        // identically to the caller.
        CoreError::AuthFailure
    }
}

fn fingerprint(raw_token: &str) -> String {
    use base64::Engine;
    let digest = Sha256::digest(raw_token.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// Generate a fresh CSPRNG token from the alphanumeric alphabet.
fn generate_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), TOKEN_LENGTH)
}

/// 8-char forensic prefix logged on rotation — never the secret.
fn prefix8(raw_token: &str) -> String {
    raw_token.chars().take(8).collect()
}

pub struct TokenStore<S: Store> {
    store: Arc<S>,
}

impl<S: Store> TokenStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn audit(
        &self,
        agent_id: AgentId,
        event_type: AuditEventType,
        actor: Option<UserId>,
        ip: Option<String>,
        details: serde_json::Value,
    ) {
        let entry = AgentTokenAuditEntry {
            agent_id,
            event_type,
            timestamp: now(),
            actor_user_id: actor,
            ip,
            details,
        };
        if let Err(e) = self.store.append_audit(entry).await {
            tracing::warn!(agent_id, err = %e, "failed to append token audit entry");
        }
    }

    /// Issue a new token for `agent_id`, replacing any existing fingerprint.
    /// Returns the raw token — it is never recoverable after this call.
    pub async fn issue(&self, agent_id: AgentId, actor: Option<UserId>) -> CoreResult<String> {
        let mut agent = self.require_agent(agent_id).await?;
        let token = generate_token();
        agent.token_fingerprint = fingerprint(&token);
        agent.token_status = TokenStatus::Active;
        agent.issued_at = now();
        agent.rotated_at = None;
        agent.revoked_at = None;
        agent.expires_at = None;
        self.store.update_agent(agent).await?;
        self.audit(agent_id, AuditEventType::Issued, actor, None, serde_json::json!({})).await;
        Ok(token)
    }

    /// Authenticate a presented bearer token, returning the resolved
    /// principal on success. Failure never updates `last_heartbeat`.
    pub async fn authenticate(
        &self,
        presented_token: &str,
        client_ip: Option<String>,
    ) -> Result<AgentPrincipal, AuthError> {
        let fp = fingerprint(presented_token);
        let Ok(Some(mut agent)) = self.store.find_agent_by_token_fingerprint(&fp).await else {
            return Err(AuthError::Invalid);
        };

        if agent.token_status != TokenStatus::Active {
            self.audit(
                agent.id,
                AuditEventType::AuthenticationFailure,
                None,
                client_ip,
                serde_json::json!({"reason": "revoked"}),
            )
            .await;
            return Err(AuthError::Revoked);
        }

        if let Some(expires_at) = agent.expires_at {
            if expires_at <= now() {
                self.audit(
                    agent.id,
                    AuditEventType::AuthenticationFailure,
                    None,
                    client_ip,
                    serde_json::json!({"reason": "expired"}),
                )
                .await;
                return Err(AuthError::Expired);
            }
        }

        agent.last_used_at = Some(now());
        agent.last_ip = client_ip.clone();
        let principal = AgentPrincipal {
            agent_id: agent.id,
            company_id: agent.company_id,
            organization_id: agent.organization_id,
            capabilities: agent.capabilities.clone(),
        };
        if let Err(e) = self.store.update_agent(agent.clone()).await {
            tracing::warn!(agent_id = agent.id, err = %e, "failed to stamp last_used_at");
        }
        self.audit(
            agent.id,
            AuditEventType::AuthenticationSuccess,
            None,
            client_ip,
            serde_json::json!({}),
        )
        .await;
        Ok(principal)
    }

    /// Generate a new token and atomically revoke the previous one. The old
    /// token MUST NOT authenticate after this call returns.
    pub async fn rotate(&self, agent_id: AgentId, actor: Option<UserId>) -> CoreResult<String> {
        let mut agent = self.require_agent(agent_id).await?;
        let old_prefix = format!("fp:{}", &agent.token_fingerprint[..8.min(agent.token_fingerprint.len())]);
        let new_token = generate_token();
        let new_prefix = prefix8(&new_token);

        agent.token_fingerprint = fingerprint(&new_token);
        agent.token_status = TokenStatus::Active;
        agent.rotated_at = Some(now());
        agent.revoked_at = None;
        self.store.update_agent(agent).await?;

        self.audit(
            agent_id,
            AuditEventType::Rotated,
            actor,
            None,
            serde_json::json!({"old_token_prefix": old_prefix, "new_token_prefix": new_prefix}),
        )
        .await;
        Ok(new_token)
    }

    /// Revoke the current token. Idempotent.
    pub async fn revoke(
        &self,
        agent_id: AgentId,
        actor: Option<UserId>,
        reason: &str,
    ) -> CoreResult<()> {
        let mut agent = self.require_agent(agent_id).await?;
        if agent.token_status == TokenStatus::Revoked {
            return Ok(());
        }
        agent.token_status = TokenStatus::Revoked;
        agent.revoked_at = Some(now());
        self.store.update_agent(agent).await?;
        self.audit(agent_id, AuditEventType::Revoked, actor, None, serde_json::json!({"reason": reason}))
            .await;
        Ok(())
    }

    /// Re-activate a revoked token. Conflict if already active.
    pub async fn activate(&self, agent_id: AgentId, actor: Option<UserId>) -> CoreResult<()> {
        let mut agent = self.require_agent(agent_id).await?;
        if agent.token_status == TokenStatus::Active {
            return Err(CoreError::Conflict("token is already active".into()));
        }
        agent.token_status = TokenStatus::Active;
        agent.revoked_at = None;
        self.store.update_agent(agent).await?;
        self.audit(agent_id, AuditEventType::Activated, actor, None, serde_json::json!({})).await;
        Ok(())
    }

    /// Push `expires_at` forward by `days`, anchoring at now if previously unset.
    pub async fn extend(
        &self,
        agent_id: AgentId,
        days: i64,
        actor: Option<UserId>,
    ) -> CoreResult<DateTime<Utc>> {
        let mut agent = self.require_agent(agent_id).await?;
        let delta = chrono::Duration::days(days);
        let base = agent.expires_at.unwrap_or_else(now);
        let new_expiry = base + delta;
        agent.expires_at = Some(new_expiry);
        self.store.update_agent(agent).await?;
        self.audit(
            agent_id,
            AuditEventType::Extended,
            actor,
            None,
            serde_json::json!({"days": days, "expires_at": new_expiry}),
        )
        .await;
        Ok(new_expiry)
    }

    async fn require_agent(&self, agent_id: AgentId) -> CoreResult<Agent> {
        self.store.get_agent(agent_id).await?.ok_or(CoreError::NotFound("agent"))
    }
}
