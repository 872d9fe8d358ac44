// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP verbs the gateway proxies.

use std::fmt;

use axum::http::Method;

/// The subset of HTTP methods routed to backend services.
///
/// Anything else is rejected by the router before it reaches the
/// forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl ProxyMethod {
    /// Map an inbound request method, if it is one we proxy.
    pub fn from_http(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(ProxyMethod::Get),
            Method::POST => Some(ProxyMethod::Post),
            Method::PUT => Some(ProxyMethod::Put),
            Method::DELETE => Some(ProxyMethod::Delete),
            _ => None,
        }
    }

    /// Parse a method name as written in configuration (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(ProxyMethod::Get),
            "POST" => Some(ProxyMethod::Post),
            "PUT" => Some(ProxyMethod::Put),
            "DELETE" => Some(ProxyMethod::Delete),
            _ => None,
        }
    }

    pub fn as_http(self) -> Method {
        match self {
            ProxyMethod::Get => Method::GET,
            ProxyMethod::Post => Method::POST,
            ProxyMethod::Put => Method::PUT,
            ProxyMethod::Delete => Method::DELETE,
        }
    }

    /// Whether the inbound body is carried to the backend.
    pub fn carries_body(self) -> bool {
        matches!(self, ProxyMethod::Post | ProxyMethod::Put)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProxyMethod::Get => "GET",
            ProxyMethod::Post => "POST",
            ProxyMethod::Put => "PUT",
            ProxyMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ProxyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
