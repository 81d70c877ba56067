// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer auth for the two header domains this crate distinguishes:
//! `X-Agent-Token` (resolved by [`meshctl_core::token::TokenStore`]) and
//! the user session bearer (resolved by an external auth collaborator,
//! modeled here as [`UserAuthResolver`]).
//!
//! The constant-time comparison guarding the static fallback secret is
//! deliberate — a real deployment replaces [`StaticUserAuthResolver`]
//! entirely.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use meshctl_core::permission::{PermissionOracle, UserPrincipal};
use meshctl_core::store::Store;
use meshctl_core::token::AgentPrincipal;

use crate::error::ApiError;
use crate::state::AppState;

/// Resolver for the opaque user session token into a [`UserPrincipal`].
/// User/role auth is an external collaborator; this trait is the seam a
/// real deployment backs with its own session store.
#[async_trait]
pub trait UserAuthResolver: Send + Sync + 'static {
    async fn resolve(&self, token: &str) -> Option<UserPrincipal>;
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Demo/test resolver: a fixed table of `{token: UserPrincipal}` loaded from
/// JSON, plus an optional single shared-secret fallback that always
/// resolves to a superadmin principal with no company restriction.
#[derive(Default)]
pub struct StaticUserAuthResolver {
    tokens: HashMap<String, UserPrincipal>,
    fallback_secret: Option<String>,
}

impl StaticUserAuthResolver {
    pub fn new(tokens: HashMap<String, UserPrincipal>, fallback_secret: Option<String>) -> Self {
        Self { tokens, fallback_secret }
    }

    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let tokens: HashMap<String, UserPrincipal> = serde_json::from_str(&contents)?;
        Ok(Self { tokens, fallback_secret: None })
    }

    pub fn set_fallback_secret(&mut self, secret: String) {
        self.fallback_secret = Some(secret);
    }
}

#[async_trait]
impl UserAuthResolver for StaticUserAuthResolver {
    async fn resolve(&self, token: &str) -> Option<UserPrincipal> {
        if let Some(principal) = self.tokens.get(token) {
            return Some(principal.clone());
        }
        if let Some(secret) = &self.fallback_secret {
            if constant_time_eq(token, secret) {
                return Some(UserPrincipal {
                    user_id: 0,
                    role: meshctl_core::permission::Role::Superadmin,
                    company_id: None,
                    engineer_tier: None,
                });
            }
        }
        None
    }
}

fn bearer_token(headers: &HeaderMap, header_name: &str) -> Option<&str> {
    headers.get(header_name)?.to_str().ok()
}

fn strip_bearer(raw: &str) -> &str {
    raw.strip_prefix("Bearer ").unwrap_or(raw)
}

/// Resolve an agent principal from `X-Agent-Token`, authenticating against
/// the live token store. Also stamps `last_used_at`/`last_ip` as a side
/// effect of a successful `authenticate` call.
pub async fn authenticate_agent<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    state: &AppState<S, P, U>,
    headers: &HeaderMap,
    client_ip: Option<String>,
) -> Result<AgentPrincipal, ApiError> {
    let token = bearer_token(headers, "x-agent-token").ok_or(ApiError(
        meshctl_core::error::CoreError::AuthFailure,
    ))?;
    Ok(state.core.tokens.authenticate(token, client_ip).await?)
}

/// Resolve a user principal from `Authorization: Bearer <token>`.
pub async fn authenticate_user<S: Store, P: PermissionOracle, U: UserAuthResolver>(
    state: &AppState<S, P, U>,
    headers: &HeaderMap,
) -> Result<UserPrincipal, ApiError> {
    let header = bearer_token(headers, "authorization")
        .ok_or(ApiError(meshctl_core::error::CoreError::AuthFailure))?;
    let token = strip_bearer(header);
    state
        .users
        .resolve(token)
        .await
        .ok_or(ApiError(meshctl_core::error::CoreError::AuthFailure))
}

/// Extract the caller's IP from `X-Forwarded-For` (first hop) — the core
/// never sees the raw socket, only what the transport layer hands it.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
}
