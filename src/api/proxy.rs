// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catch-all proxy handler.
//!
//! Runs after `route_stage` and `auth_stage`, so the backend is known and
//! the caller (if any) is verified by the time we get here.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::HeaderMap,
    response::Response,
    Extension,
};

use crate::{
    auth::Caller,
    error::{ApiError, ErrorBody},
    proxy::{outbound_headers, relay, OutboundRequest},
    routing::{ProxyMethod, RouteDecision},
    state::AppState,
};

/// Forward the request to the backend resolved for `{service}`.
///
/// The sub-path is sent exactly as received, percent-encoding included.
/// The backend's status and body are relayed unchanged.
#[utoipa::path(
    method(get, post, put, delete),
    path = "/{service}/{path}",
    tag = "Gateway",
    params(
        ("service" = String, Path, description = "Service prefix, e.g. svc-doctor"),
        ("path" = String, Path, description = "Path forwarded to the backend")
    ),
    security((), ("bearer" = [])),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 400, description = "Sub-path contains dot segments", body = ErrorBody),
        (status = 401, description = "Missing, expired or invalid token", body = ErrorBody),
        (status = 404, description = "Unknown service", body = ErrorBody),
        (status = 405, description = "Method is not proxied", body = ErrorBody),
        (status = 503, description = "Backend unreachable or timed out", body = ErrorBody)
    )
)]
pub async fn forward(
    State(state): State<AppState>,
    Extension(decision): Extension<RouteDecision>,
    Caller(identity): Caller,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let method = decision.method;

    let query = match method {
        ProxyMethod::Get => query,
        _ => None,
    };
    let body = if method.carries_body() { body } else { Bytes::new() };

    let request = OutboundRequest {
        method,
        url: decision.upstream_url(query.as_deref()),
        headers: outbound_headers(method, &headers, identity.as_ref(), !body.is_empty()),
        body,
    };

    let upstream = state.forwarder.forward(request).await?;
    Ok(relay(upstream))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{
        api::router,
        config::GatewayConfig,
        proxy::{USER_ID_HEADER, USER_ROLES_HEADER},
        routing::{ProxyMethod, RouteTable, Whitelist, WhitelistEntry},
        test_support::{
            mint_token, refused_addr, spawn_recording_backend, test_state, test_state_with, token_for,
            BackendReply, TEST_SECRET,
        },
    };

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_of(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn whitelisted_get_reaches_backend_without_token() {
        let (addr, backend) =
            spawn_recording_backend(BackendReply::json(StatusCode::OK, r#"{"name":"Dr. X"}"#)).await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));

        let (status, body) = send(app, get("/svc-doctor/api/info")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), json!({"name": "Dr. X"}));

        let hit = backend.last().unwrap();
        assert_eq!(hit.method, "GET");
        assert_eq!(hit.uri.path(), "/api/info");
        assert!(hit.headers.get(header::AUTHORIZATION).is_none());
        assert!(hit.headers.get(&USER_ID_HEADER).is_none());
    }

    #[tokio::test]
    async fn every_whitelisted_pair_bypasses_auth() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let whitelist = Whitelist::new(vec![
            WhitelistEntry::method(ProxyMethod::Post, "svc-auth/api/login"),
            WhitelistEntry::service("svc-auth", "api/register"),
        ]);
        let app = router(test_state(&[("svc-auth", addr)], whitelist));

        let cases = [
            ("POST", "/svc-auth/api/login"),
            ("POST", "/svc-auth/api/register/patient"),
            ("PUT", "/svc-auth/api/register"),
            ("DELETE", "/svc-auth/api/register/1"),
            ("GET", "/svc-auth/api/register"),
        ];
        for (method, uri) in cases {
            let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
            let (status, _) = send(app.clone(), request).await;
            assert_eq!(status, StatusCode::OK, "{method} {uri}");
        }
        assert_eq!(backend.count(), cases.len());
    }

    #[tokio::test]
    async fn missing_token_is_401_without_outbound_call() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-appointment", addr)], Whitelist::clinic_defaults()));

        let (status, body) = send(app, get("/svc-appointment/patient")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(&body), json!({"error": "Unauthorized"}));
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn method_mismatch_on_whitelisted_path_needs_token() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-auth", addr)], Whitelist::clinic_defaults()));

        let (status, _) = send(app, get("/svc-auth/api/refresh-token")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid_token() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-patient", addr)], Whitelist::default()));
        let token = mint_token(
            "not-the-gateway-secret",
            json!({"user_id": 42, "roles": ["PATIENT"], "exp": chrono::Utc::now().timestamp() + 600}),
        );

        let request = Request::builder()
            .uri("/svc-patient/api/patients/me")
            .header(header::AUTHORIZATION, bearer(&token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(&body), json!({"error": "Invalid token"}));
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-patient", addr)], Whitelist::default()));
        let token = token_for(json!(42), &["PATIENT"], -600);

        let request = Request::builder()
            .uri("/svc-patient/api/patients/me")
            .header(header::AUTHORIZATION, bearer(&token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(&body), json!({"error": "Token expired"}));
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn unknown_service_is_404_regardless_of_auth() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));
        let token = token_for(json!(42), &["ADMIN"], 600);

        let (status, body) = send(app.clone(), get("/svc-payment/api/invoices")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_of(&body), json!({"error": "Service 'svc-payment' not found"}));

        let request = Request::builder()
            .uri("/svc-payment/api/invoices")
            .header(header::AUTHORIZATION, bearer(&token))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn authenticated_post_carries_identity_and_body() {
        let (addr, backend) =
            spawn_recording_backend(BackendReply::json(StatusCode::CREATED, r#"{"id":9,"status":"PENDING"}"#))
                .await;
        let app = router(test_state(&[("svc-appointment", addr)], Whitelist::clinic_defaults()));
        let token = token_for(json!(42), &["PATIENT"], 600);
        let payload = r#"{"doctor_id":"7","date":"2025-01-01","time":"09:00"}"#;

        let request = Request::builder()
            .method("POST")
            .uri("/svc-appointment/patient")
            .header(header::AUTHORIZATION, bearer(&token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json_of(&body), json!({"id": 9, "status": "PENDING"}));

        let hit = backend.last().unwrap();
        assert_eq!(hit.method, "POST");
        assert_eq!(hit.uri.path(), "/patient");
        assert_eq!(hit.headers[&USER_ID_HEADER], "42");
        assert_eq!(hit.headers[&USER_ROLES_HEADER], r#"["PATIENT"]"#);
        assert_eq!(hit.headers[header::AUTHORIZATION], bearer(&token).as_str());
        assert_eq!(hit.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(hit.body.as_ref(), payload.as_bytes());
    }

    #[tokio::test]
    async fn string_user_id_is_forwarded_verbatim() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-user", addr)], Whitelist::default()));
        let token = token_for(json!("u-17"), &["DOCTOR", "ADMIN"], 600);

        let request = Request::builder()
            .method("PUT")
            .uri("/svc-user/api/users/17")
            .header(header::AUTHORIZATION, bearer(&token))
            .body(Body::from(r#"{"name":"x"}"#))
            .unwrap();
        let (status, _) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        let hit = backend.last().unwrap();
        assert_eq!(hit.headers[&USER_ID_HEADER], "u-17");
        assert_eq!(hit.headers[&USER_ROLES_HEADER], r#"["DOCTOR","ADMIN"]"#);
    }

    #[tokio::test]
    async fn get_query_string_is_preserved() {
        let (addr, backend) = spawn_recording_backend(BackendReply::json(StatusCode::OK, "[]")).await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));

        let (status, _) = send(
            app,
            get("/svc-doctor/api/schedule/availabilities/doctor/3?date=2025-01-01&slot=a%20b"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let hit = backend.last().unwrap();
        assert_eq!(hit.uri.path(), "/api/schedule/availabilities/doctor/3");
        assert_eq!(hit.uri.query(), Some("date=2025-01-01&slot=a%20b"));
    }

    #[tokio::test]
    async fn delete_sends_no_body() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::NO_CONTENT)).await;
        let app = router(test_state(&[("svc-records", addr)], Whitelist::default()));
        let token = token_for(json!(1), &["ADMIN"], 600);

        let request = Request::builder()
            .method("DELETE")
            .uri("/svc-records/api/records/5")
            .header(header::AUTHORIZATION, bearer(&token))
            .body(Body::from("should not be forwarded"))
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
        assert!(backend.last().unwrap().body.is_empty());
    }

    #[tokio::test]
    async fn empty_sub_path_is_routed() {
        let (addr, backend) = spawn_recording_backend(BackendReply::text(StatusCode::OK, "chatbot up")).await;
        let app = router(test_state(&[("svc-chatbot", addr)], Whitelist::clinic_defaults()));

        let (status, body) = send(app, get("/svc-chatbot/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"chatbot up");
        assert_eq!(backend.last().unwrap().uri.path(), "/");
    }

    #[tokio::test]
    async fn plain_text_is_relayed_raw() {
        let (addr, _backend) = spawn_recording_backend(BackendReply::text(StatusCode::OK, "pong")).await;
        let app = router(test_state(&[("svc-chatbot", addr)], Whitelist::clinic_defaults()));

        let response = app.oneshot(get("/svc-chatbot/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"pong");
    }

    #[tokio::test]
    async fn backend_errors_pass_through() {
        let (addr, _backend) = spawn_recording_backend(BackendReply::json(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"Doctor not available"}"#,
        ))
        .await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));

        let (status, body) = send(app, get("/svc-doctor/api/info/doctors/99")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body), json!({"detail": "Doctor not available"}));
    }

    #[tokio::test]
    async fn unreachable_backend_is_503() {
        let addr = refused_addr().await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));

        let (status, body) = send(app, get("/svc-doctor/api/info")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_of(&body), json!({"error": "Service unavailable"}));
    }

    #[tokio::test]
    async fn slow_backend_is_503_after_single_attempt() {
        let (addr, backend) = spawn_recording_backend(
            BackendReply::json(StatusCode::OK, "{}").delayed(Duration::from_secs(5)),
        )
        .await;
        let routes = RouteTable::from_pairs([("svc-doctor", format!("http://{addr}"))]).unwrap();
        let config = GatewayConfig::new(routes, Whitelist::clinic_defaults(), TEST_SECRET)
            .with_upstream_timeout(Duration::from_millis(200));
        let app = router(test_state_with(config));

        let (status, body) = send(app, get("/svc-doctor/api/info")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_of(&body), json!({"error": "Service unavailable"}));
        assert_eq!(backend.count(), 1);
    }

    #[tokio::test]
    async fn unsupported_method_is_405() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));

        let request = Request::builder()
            .method("PATCH")
            .uri("/svc-doctor/api/info")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app.clone(), request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_of(&body), json!({"error": "Method not allowed"}));

        let request = Request::builder()
            .method("HEAD")
            .uri("/svc-doctor/api/info")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn dot_segments_cannot_escape_whitelisted_prefix() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let routes = [("svc-appointment", addr), ("svc-doctor", addr)];
        let app = router(test_state(&routes, Whitelist::clinic_defaults()));

        let cases = [
            ("POST", "/svc-appointment/get-appointment-info/..%2Fpatient"),
            ("POST", "/svc-appointment/get-appointment-info/../patient"),
            ("GET", "/svc-doctor/api/info/..%2F..%2Fadmin/secrets"),
            ("GET", "/svc-doctor/api/info/../../admin/secrets"),
            ("GET", "/svc-doctor/api/info/%2e%2e/%2E%2E/admin/secrets"),
        ];
        for (method, uri) in cases {
            let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(app.clone(), request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(json_of(&body), json!({"error": "Invalid path"}), "{method} {uri}");
        }
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn dot_segments_are_refused_with_a_token_too() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-patient", addr)], Whitelist::default()));
        let token = token_for(json!(42), &["PATIENT"], 600);

        let request = Request::builder()
            .uri("/svc-patient/api/patients/../admin")
            .header(header::AUTHORIZATION, bearer(&token))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn encoded_sub_path_reaches_backend_unchanged() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));

        for (uri, path) in [
            ("/svc-doctor/api/info%23frag", "/api/info%23frag"),
            ("/svc-doctor/api/info%3Fx%3D1", "/api/info%3Fx%3D1"),
            ("/svc-doctor/api/info%2Fextra", "/api/info%2Fextra"),
            ("/svc-doctor/api/info/Dr%20X", "/api/info/Dr%20X"),
        ] {
            let (status, _) = send(app.clone(), get(uri)).await;
            assert_eq!(status, StatusCode::OK, "{uri}");

            let hit = backend.last().unwrap();
            assert_eq!(hit.uri.path(), path, "{uri}");
            assert_eq!(hit.uri.query(), None, "{uri}");
        }
    }

    #[tokio::test]
    async fn encoded_query_marker_does_not_smuggle_a_query_onto_post() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-appointment", addr)], Whitelist::default()));
        let token = token_for(json!(42), &["PATIENT"], 600);

        let request = Request::builder()
            .method("POST")
            .uri("/svc-appointment/patient%3Fstatus%3DPAID?ignored=1")
            .header(header::AUTHORIZATION, bearer(&token))
            .body(Body::from("{}"))
            .unwrap();
        let (status, _) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        let hit = backend.last().unwrap();
        assert_eq!(hit.uri.path(), "/patient%3Fstatus%3DPAID");
        assert_eq!(hit.uri.query(), None);
    }

    #[tokio::test]
    async fn whitelist_is_judged_on_the_forwarded_path() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));

        // `api/%69nfo` decodes to `api/info` but is not the whitelisted text.
        let (status, body) = send(app, get("/svc-doctor/api/%69nfo")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(&body), json!({"error": "Unauthorized"}));
        assert_eq!(backend.count(), 0);
    }

    #[tokio::test]
    async fn request_id_is_propagated() {
        let (addr, backend) = spawn_recording_backend(BackendReply::empty(StatusCode::OK)).await;
        let app = router(test_state(&[("svc-doctor", addr)], Whitelist::clinic_defaults()));

        let request = Request::builder()
            .uri("/svc-doctor/api/info")
            .header("x-request-id", "trace-123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-request-id"], "trace-123");
        assert_eq!(backend.last().unwrap().headers["x-request-id"], "trace-123");
    }
}
