// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration: liveness thresholds, sweep timing, and session
//! GC age as `clap` `Args` with `env` fallbacks, rather than hardcoded
//! constants.

use std::time::Duration;

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "meshctld", about = "Agent coordination control plane")]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "MESHCTL_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "MESHCTL_PORT")]
    pub port: u16,

    /// Seconds since `last_heartbeat` within which an agent reads as online
    /// (default 60s).
    #[arg(long, default_value_t = 60, env = "MESHCTL_ONLINE_THRESHOLD_SECS")]
    pub online_threshold_secs: i64,

    /// Seconds since `last_heartbeat` beyond which an otherwise-online agent
    /// is excluded from dispatch selection (default 5min).
    #[arg(long, default_value_t = 300, env = "MESHCTL_DISPATCH_FRESH_SECS")]
    pub dispatch_fresh_secs: i64,

    /// Background sweeper tick period (default 180s).
    #[arg(long, default_value_t = 180, env = "MESHCTL_SWEEP_PERIOD_SECS")]
    pub sweep_period_secs: u64,

    /// Session GC threshold: terminal sessions idle longer than this are
    /// pruned (default 24h).
    #[arg(long, default_value_t = 24, env = "MESHCTL_SESSION_MAX_AGE_HOURS")]
    pub session_max_age_hours: i64,

    /// Path to a JSON file of `{token: UserPrincipal}` entries used by the
    /// bundled static user-auth resolver. Production deployments replace
    /// the resolver entirely rather than populate this file — user auth is
    /// an external collaborator.
    #[arg(long, env = "MESHCTL_USER_TOKENS_FILE")]
    pub user_tokens_file: Option<std::path::PathBuf>,

    /// A single shared-secret bearer that always resolves to a superadmin
    /// principal, for demos and integration tests that don't want to
    /// maintain a tokens file. Never set this in a real deployment.
    #[arg(long, env = "MESHCTL_USER_FALLBACK_SECRET")]
    pub user_fallback_secret: Option<String>,
}

impl ServerConfig {
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_period_secs)
    }

    pub fn online_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.online_threshold_secs)
    }

    pub fn dispatch_fresh(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dispatch_fresh_secs)
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_max_age_hours)
    }
}
