// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    auth::TokenVerifier,
    config::GatewayConfig,
    proxy::{Forwarder, TransportError},
};

/// Shared, read-only request context.
///
/// Built once in `main`; handlers only ever read it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub verifier: Arc<TokenVerifier>,
    pub forwarder: Forwarder,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self, TransportError> {
        let verifier = TokenVerifier::new(config.jwt_secret(), config.clock_skew_leeway_secs);
        let forwarder = Forwarder::new(config.upstream_timeout, config.max_in_flight)?;

        Ok(Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            forwarder,
            started_at: Utc::now(),
        })
    }
}
