// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses the `ip_range` field `POST /discovery` accepts (e.g.
//! `"10.0.0.1-10.0.0.4"`) into the concrete IPv4 addresses a dispatched
//! discovery `WorkItem` enumerates for the agent.

use std::net::Ipv4Addr;

use meshctl_core::error::CoreError;

/// Safety cap on how many addresses a single discovery request may expand
/// to, so a typo'd range can't build an unbounded work item payload.
const MAX_RANGE_SIZE: u32 = 65_536;

/// Parse `"<start>-<end>"` or a bare `"<ip>"` into the inclusive list of
/// addresses it denotes.
pub fn parse_ip_range(raw: &str) -> Result<Vec<Ipv4Addr>, CoreError> {
    let raw = raw.trim();
    let (start_str, end_str) = match raw.split_once('-') {
        Some((s, e)) => (s.trim(), e.trim()),
        None => (raw, raw),
    };

    let start: Ipv4Addr =
        start_str.parse().map_err(|_| CoreError::Validation(format!("invalid IP range: {raw}")))?;
    let end: Ipv4Addr =
        end_str.parse().map_err(|_| CoreError::Validation(format!("invalid IP range: {raw}")))?;

    let start_u32 = u32::from(start);
    let end_u32 = u32::from(end);
    if end_u32 < start_u32 {
        return Err(CoreError::Validation(format!("IP range end precedes start: {raw}")));
    }
    let count = end_u32 - start_u32 + 1;
    if count > MAX_RANGE_SIZE {
        return Err(CoreError::Validation(format!(
            "IP range too large ({count} addresses, max {MAX_RANGE_SIZE})"
        )));
    }

    Ok((start_u32..=end_u32).map(Ipv4Addr::from).collect())
}
