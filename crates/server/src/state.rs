// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state: one `Arc`-wrapped struct handed into every
//! handler and the sweeper task via `axum::extract::State`.

use std::sync::Arc;

use meshctl_core::permission::PermissionOracle;
use meshctl_core::store::Store;
use meshctl_core::CoordinationCore;
use tokio_util::sync::CancellationToken;

use crate::auth::UserAuthResolver;
use crate::config::ServerConfig;

pub struct AppState<S: Store, P: PermissionOracle, U: UserAuthResolver> {
    pub core: CoordinationCore<S, P>,
    pub users: U,
    pub config: ServerConfig,
    pub shutdown: CancellationToken,
}

impl<S: Store, P: PermissionOracle, U: UserAuthResolver> AppState<S, P, U> {
    pub fn new(
        core: CoordinationCore<S, P>,
        users: U,
        config: ServerConfig,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self { core, users, config, shutdown })
    }
}
