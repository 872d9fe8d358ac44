// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Turns a backend answer into the gateway's response.
//!
//! The backend status is always kept. Valid JSON bodies go out as
//! `application/json`; anything else is passed through as-is.

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::de::IgnoredAny;

use super::UpstreamResponse;

const JSON: HeaderValue = HeaderValue::from_static("application/json");
const PLAIN_TEXT: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

pub fn relay(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        status,
        content_type,
        body,
    } = upstream;

    if body.is_empty() {
        return status.into_response();
    }

    let content_type = if serde_json::from_slice::<IgnoredAny>(&body).is_ok() {
        JSON
    } else {
        content_type.unwrap_or(PLAIN_TEXT)
    };

    (status, [(CONTENT_TYPE, content_type)], body).into_response()
}
