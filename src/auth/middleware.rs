// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pre-forwarding stages for proxied routes.
//!
//! Each stage either enriches the request and calls `next`, or returns an
//! error response immediately:
//!
//! 1. [`route_stage`] resolves the backend (404 on unknown service, 400 on
//!    dot segments) and stores a [`RouteDecision`] in the request extensions.
//! 2. [`auth_stage`] skips whitelisted paths, otherwise verifies the bearer
//!    token (401) and stores the [`IdentityClaims`].
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/{service}/{*path}", any_proxied(forward))
//!     .route_layer(from_fn_with_state(state.clone(), auth_stage))
//!     .route_layer(from_fn_with_state(state.clone(), route_stage))
//! ```

use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::IdentityClaims;
use crate::{
    error::ApiError,
    routing::{ProxyMethod, RouteDecision},
    state::AppState,
};

/// Path parameter holding the service prefix.
pub const SERVICE_PARAM: &str = "service";

/// Everything after `/{service}/` in the request path, still percent-encoded.
fn raw_sub_path(path: &str) -> &str {
    path.strip_prefix('/')
        .and_then(|rest| rest.split_once('/'))
        .map_or("", |(_, sub_path)| sub_path)
}

/// Resolve the backend for `/{service}/{*path}`.
pub async fn route_stage(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(method) = ProxyMethod::from_http(request.method()) else {
        return ApiError::method_not_allowed().into_response();
    };

    let Some(service) = params.get(SERVICE_PARAM) else {
        return ApiError::internal("route is missing the service parameter").into_response();
    };
    let sub_path = raw_sub_path(request.uri().path());

    let decision = match state.config.matcher().resolve(method, service, sub_path) {
        Ok(decision) => decision,
        Err(e) => {
            tracing::debug!(service = %service, error = %e, "Rejecting unroutable request");
            return ApiError::from(e).into_response();
        }
    };

    request.extensions_mut().insert(decision);
    next.run(request).await
}

/// Enforce bearer authentication unless the route is whitelisted.
pub async fn auth_stage(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let (requires_auth, full_path) = match request.extensions().get::<RouteDecision>() {
        Some(decision) => (decision.requires_auth, decision.full_path()),
        None => return ApiError::internal("auth stage ran before route stage").into_response(),
    };

    if !requires_auth {
        return next.run(request).await;
    }

    let claims: IdentityClaims = match state
        .verifier
        .verify_header(request.headers().get(AUTHORIZATION))
    {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(path = %full_path, reason = e.error_code(), "Rejecting unauthenticated request");
            return e.into_response();
        }
    };

    tracing::debug!(path = %full_path, user_id = %claims.user_id, "Authenticated request");
    request.extensions_mut().insert(claims);
    next.run(request).await
}
