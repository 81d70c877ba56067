// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp helpers.
//!
//! The source this control plane is grounded on stores naive-UTC timestamps
//! and mitigates the resulting sign-bug hazard ad-hoc at every comparison
//! site. This crate stores `DateTime<Utc>` everywhere and funnels any
//! naive-timestamp coercion through [`assume_utc`] instead.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Treat a naive timestamp as UTC. Read-path boundary only — nothing in
/// this crate should construct naive timestamps itself.
pub fn assume_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    naive.and_utc()
}

/// Current time. Thin wrapper so call sites read as intent, not `Utc::now()`
/// sprinkled everywhere, and so tests can see every live clock read at a glance.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
