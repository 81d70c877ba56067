// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core error taxonomy shared by every component.
//!
//! Kinds, not types: every fallible operation in this crate returns one of
//! these variants, and the transport layer maps them onto the HTTP status
//! codes and `{detail: string}` envelope the control plane promises callers.

use thiserror::Error;

/// Error kinds produced by the agent coordination subsystem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Missing, invalid, revoked, or expired bearer token. Never reveals which.
    #[error("authentication failed")]
    AuthFailure,

    /// Authenticated but the caller's role/scope is insufficient.
    #[error("permission denied")]
    PermissionDenied,

    /// Referenced entity (agent, device, network, session) does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed input: bad IP range, inconsistent org/network pairing, etc.
    #[error("{0}")]
    Validation(String),

    /// No online agent bound to the network at dispatch time.
    #[error("No online agent available for this network")]
    NoCapacity,

    /// Conflicting state transition, e.g. activating an already-active token.
    #[error("{0}")]
    Conflict(String),

    /// Internal failure (store write, encode failure) not attributable to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP status code this error maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthFailure => 401,
            Self::PermissionDenied => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::NoCapacity => 503,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// Non-secret, human-readable message safe to return to a caller.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        auth_failure = { CoreError::AuthFailure, 401 },
        permission_denied = { CoreError::PermissionDenied, 403 },
        not_found = { CoreError::NotFound("agent"), 404 },
        validation = { CoreError::Validation("bad ip range".into()), 400 },
        no_capacity = { CoreError::NoCapacity, 503 },
        conflict = { CoreError::Conflict("already active".into()), 409 },
        internal = { CoreError::Internal("store write failed".into()), 500 },
    )]
    fn http_status_matches_expected(error: CoreError, expected: u16) {
        assert_eq!(error.http_status(), expected);
    }

    #[test]
    fn no_capacity_detail_matches_expected_text() {
        assert_eq!(CoreError::NoCapacity.detail(), "No online agent available for this network");
    }
}
