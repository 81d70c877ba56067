// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The permission oracle: the boolean-capability collaborator this crate
//! treats as external. User/role auth and org/company CRUD are out of
//! scope; this module only defines the seam the rest of the crate calls
//! through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{CompanyId, OrganizationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    CompanyAdmin,
    FullControl,
    Engineer,
    Viewer,
}

impl Role {
    /// Roles permitted to register a new agent: only `company_admin` and
    /// `full_control` callers may register. Superadmin is a strict
    /// superset of company_admin.
    pub fn may_register_agent(&self) -> bool {
        matches!(self, Self::Superadmin | Self::CompanyAdmin | Self::FullControl)
    }
}

/// Caller identity resolved by the external auth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPrincipal {
    pub user_id: UserId,
    pub role: Role,
    pub company_id: Option<CompanyId>,
    pub engineer_tier: Option<String>,
}

/// Boolean-capability oracle the core consumes for authorization decisions
/// it does not own. A production deployment backs this with the real
/// permission service; tests back it with a fixed-table fake.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// Whether `user` may register agents under `organization` (must already
    /// be company_admin+, per [`Role::may_register_agent`]; this call checks
    /// the organization/company tenancy match on top of that).
    async fn may_register_agent(&self, user: &UserPrincipal, organization: OrganizationId)
        -> bool;

    /// Whether `user` may operate (dispatch, cancel, retry, view) on
    /// `network`'s discovery sessions.
    async fn may_operate_network(&self, user: &UserPrincipal, network: crate::model::NetworkId)
        -> bool;

    /// Whether `user` may manage (rotate/revoke/activate/extend) `agent`'s token.
    async fn may_manage_agent(&self, user: &UserPrincipal, agent: crate::model::AgentId) -> bool;
}
