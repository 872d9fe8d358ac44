// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, MethodRouter},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::{auth_stage, route_stage},
    error::{ApiError, ErrorBody},
    state::AppState,
};

pub mod health;
pub mod proxy;

/// Methods the gateway forwards. Anything else gets a 405 error envelope.
fn proxied() -> MethodRouter<AppState> {
    get(proxy::forward)
        .post(proxy::forward)
        .put(proxy::forward)
        .delete(proxy::forward)
        .fallback(method_not_allowed)
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

pub fn router(state: AppState) -> Router {
    // route_layer applies bottom-up: route_stage runs first, then auth_stage.
    let proxied_routes = Router::new()
        .route("/{service}/", proxied())
        .route("/{service}/{*path}", proxied())
        .route_layer(from_fn_with_state(state.clone(), auth_stage))
        .route_layer(from_fn_with_state(state.clone(), route_stage));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(proxied_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(health::health, health::liveness, health::readiness, proxy::forward),
    components(
        schemas(
            ErrorBody,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Gateway", description = "Authenticated forwarding to backend services")
    )
)]
struct ApiDoc;
