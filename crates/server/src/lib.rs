// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `meshctld` binary's library half: wiring a
//! [`meshctl_core::CoordinationCore`] to an axum HTTP surface. `run` is
//! the single entry point `main.rs` and integration tests both call.

pub mod auth;
pub mod config;
pub mod error;
pub mod ip_range;
pub mod routes;
pub mod state;
pub mod sweeper;

use std::net::SocketAddr;
use std::sync::Arc;

use meshctl_core::registry::Thresholds;
use meshctl_core::store::memory::MemoryStore;
use meshctl_core::CoordinationCore;
use tokio_util::sync::CancellationToken;

use crate::auth::StaticUserAuthResolver;
use crate::config::ServerConfig;
use crate::state::AppState;

/// Demo/test permission oracle backing: every authenticated user may do
/// everything. Swapped for a real oracle in a production deployment — the
/// permission service is out of scope here.
pub use meshctl_core::registry::AllowAllOracle;

/// Build and run the server until `shutdown` is cancelled or a ctrl-c is
/// received, whichever comes first.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let store = Arc::new(MemoryStore::new());
    let permissions = Arc::new(AllowAllOracle);
    let thresholds =
        Thresholds { online: config.online_threshold(), dispatch_fresh: config.dispatch_fresh() };
    let core = CoordinationCore::with_thresholds(store, permissions, thresholds);

    let mut users = match &config.user_tokens_file {
        Some(path) => StaticUserAuthResolver::from_file(path)?,
        None => {
            tracing::warn!(
                "no MESHCTL_USER_TOKENS_FILE configured; only the fallback secret (if any) will authenticate"
            );
            StaticUserAuthResolver::default()
        }
    };
    if let Some(secret) = config.user_fallback_secret.clone() {
        users.set_fallback_secret(secret);
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(core, users, config, shutdown.clone());

    sweeper::spawn(Arc::clone(&state));

    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "meshctld listening");

    let shutdown_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = shutdown_signal.cancelled() => {}
            }
        })
        .await?;

    shutdown.cancel();
    Ok(())
}
