// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures: token minting and loopback backends.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::Request,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::{
    config::GatewayConfig,
    routing::{RouteTable, Whitelist},
    state::AppState,
};

pub const TEST_SECRET: &str = "test-signing-secret";

pub fn mint_token_with(header: Header, secret: &str, claims: Value) -> String {
    encode(&header, &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

/// HS256 token over arbitrary claims.
pub fn mint_token(secret: &str, claims: Value) -> String {
    mint_token_with(Header::default(), secret, claims)
}

/// Token as the auth service issues it, expiring `expires_in` seconds from now.
pub fn token_for(user_id: Value, roles: &[&str], expires_in: i64) -> String {
    mint_token(
        TEST_SECRET,
        json!({
            "user_id": user_id,
            "username": "tester",
            "roles": roles,
            "exp": chrono::Utc::now().timestamp() + expires_in,
        }),
    )
}

/// Request as seen by a test backend.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    hits: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl Recorder {
    pub fn count(&self) -> usize {
        self.hits.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<CapturedRequest> {
        self.hits.lock().unwrap().last().cloned()
    }

    fn push(&self, request: CapturedRequest) {
        self.hits.lock().unwrap().push(request);
    }
}

/// Canned backend answer.
#[derive(Debug, Clone)]
pub struct BackendReply {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: &'static str,
    location: Option<&'static str>,
    delay: Duration,
}

impl BackendReply {
    pub fn json(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            content_type: Some("application/json"),
            body,
            location: None,
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: StatusCode, body: &'static str) -> Self {
        Self {
            content_type: Some("text/plain; charset=utf-8"),
            ..Self::json(status, body)
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self {
            content_type: None,
            ..Self::json(status, "")
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_location(mut self, location: &'static str) -> Self {
        self.location = Some(location);
        self
    }

    fn render(self) -> Response {
        let mut response = (self.status, Body::from(self.body)).into_response();
        if let Some(ct) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(ct));
        }
        if let Some(location) = self.location {
            response
                .headers_mut()
                .insert(header::LOCATION, header::HeaderValue::from_static(location));
        }
        response
    }
}

/// Start a backend on a loopback port that records every request and answers with `reply`.
pub async fn spawn_recording_backend(reply: BackendReply) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let captured = recorder.clone();

    let app = Router::new().fallback(move |request: Request| {
        let captured = captured.clone();
        let reply = reply.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
            captured.push(CapturedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            reply.render()
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, recorder)
}

/// A loopback address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Gateway state routing each `(prefix, addr)` to `http://addr`.
pub fn test_state(routes: &[(&str, SocketAddr)], whitelist: Whitelist) -> AppState {
    let table = RouteTable::from_pairs(
        routes
            .iter()
            .map(|(prefix, addr)| (prefix.to_string(), format!("http://{addr}"))),
    )
    .unwrap();
    test_state_with(GatewayConfig::new(table, whitelist, TEST_SECRET))
}

pub fn test_state_with(config: GatewayConfig) -> AppState {
    AppState::new(config).unwrap()
}
