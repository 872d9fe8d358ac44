// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound request to the resolved backend.
//!
//! One attempt per inbound request. Timeouts and transport failures surface
//! as [`TransportError`] and are never retried.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
};
use tokio::sync::Semaphore;

use crate::{auth::IdentityClaims, routing::ProxyMethod};

/// Caller ID injected for authenticated requests.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
/// Caller roles (JSON array) injected for authenticated requests.
pub const USER_ROLES_HEADER: HeaderName = HeaderName::from_static("x-user-roles");
/// Correlation ID, propagated to backends.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Backend could not be reached or did not answer in time.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("forwarder is closed")]
    Closed,
}

/// Request as it will be sent to the backend.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: ProxyMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Backend answer, buffered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Build the headers sent to the backend.
///
/// - `Authorization` is passed through unchanged so backends can re-verify.
/// - `Content-Type` follows the body (defaulting to JSON).
/// - `X-User-Id` / `X-User-Roles` are set only for authenticated callers.
pub fn outbound_headers(
    method: ProxyMethod,
    inbound: &HeaderMap,
    identity: Option<&IdentityClaims>,
    has_body: bool,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(auth) = inbound.get(AUTHORIZATION) {
        headers.insert(AUTHORIZATION, auth.clone());
    }

    if method.carries_body() && has_body {
        let content_type = inbound
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, content_type);
    }

    if let Some(request_id) = inbound.get(&REQUEST_ID_HEADER) {
        headers.insert(REQUEST_ID_HEADER, request_id.clone());
    }

    if let Some(identity) = identity {
        match identity.header_values() {
            Ok((user_id, roles)) => {
                headers.insert(USER_ID_HEADER, user_id);
                headers.insert(USER_ROLES_HEADER, roles);
            }
            Err(_) => tracing::warn!("Identity claims not representable as headers, omitting"),
        }
    }

    headers
}

/// Shared HTTP client with a fixed per-call timeout and an in-flight cap.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Forwarder {
    /// Create a forwarder.
    ///
    /// Redirects are not followed; a backend 3xx is relayed to the caller.
    pub fn new(timeout: Duration, max_in_flight: usize) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            timeout,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        })
    }

    /// Number of outbound calls that could start right now.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Send `request` once and buffer the answer.
    ///
    /// Waiting for an in-flight permit counts against the timeout.
    pub async fn forward(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let OutboundRequest {
            method,
            url,
            headers,
            body,
        } = request;

        tracing::debug!(%method, %url, "Forwarding request");

        let exchange = async {
            let _permit = self.permits.acquire().await.map_err(|_| TransportError::Closed)?;

            let mut builder = self.client.request(method.as_http(), &url).headers(headers);
            if method.carries_body() && !body.is_empty() {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status();
            let content_type = response.headers().get(CONTENT_TYPE).cloned();
            let body = response.bytes().await?;

            Ok::<_, TransportError>(UpstreamResponse {
                status,
                content_type,
                body,
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(response)) => {
                tracing::debug!(%method, %url, status = response.status.as_u16(), "Backend responded");
                Ok(response)
            }
            Ok(Err(e)) => {
                tracing::warn!(%method, %url, error = %e, "Backend request failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(%method, %url, timeout = ?self.timeout, "Backend request timed out");
                Err(TransportError::Timeout(self.timeout))
            }
        }
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("timeout", &self.timeout)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}
