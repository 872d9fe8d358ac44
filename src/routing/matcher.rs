// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request routing decision.
//!
//! Sub-paths are handled in their raw, still percent-encoded form: the
//! whitelist is tested against exactly the bytes that are sent upstream.

use super::{method::ProxyMethod, route_table::RouteTable, whitelist::Whitelist};

/// Routing failures, raised before any backend is contacted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),

    #[error("Invalid path")]
    InvalidPath,
}

/// Where a request goes and whether it needs a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub method: ProxyMethod,
    pub service: String,
    pub sub_path: String,
    pub backend_base_url: String,
    pub requires_auth: bool,
}

impl RouteDecision {
    /// `{service}/{sub_path}`, the string whitelist entries are tested against.
    pub fn full_path(&self) -> String {
        join_path(&self.service, &self.sub_path)
    }

    /// Backend URL for this request, with the raw query appended if given.
    pub fn upstream_url(&self, query: Option<&str>) -> String {
        let url = join_path(&self.backend_base_url, &self.sub_path);
        match query {
            Some(q) if !q.is_empty() => format!("{url}?{q}"),
            _ => url,
        }
    }
}

fn join_path(base: &str, sub_path: &str) -> String {
    format!("{base}/{sub_path}")
}

/// Whether `sub_path` holds a `.` or `..` segment once `%2E` and `%2F`
/// are decoded.
pub fn has_dot_segment(sub_path: &str) -> bool {
    sub_path
        .to_ascii_lowercase()
        .replace("%2f", "/")
        .replace("%2e", ".")
        .split('/')
        .any(|segment| segment == "." || segment == "..")
}

/// Resolves backends and auth requirements against the static tables.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatcher<'a> {
    routes: &'a RouteTable,
    whitelist: &'a Whitelist,
}

impl<'a> RouteMatcher<'a> {
    pub fn new(routes: &'a RouteTable, whitelist: &'a Whitelist) -> Self {
        Self { routes, whitelist }
    }

    /// Resolve `(method, service, sub_path)`.
    ///
    /// `sub_path` is the raw path after `/{service}/`. An unknown service
    /// fails regardless of whitelist or token state. Sub-paths with dot
    /// segments are refused.
    pub fn resolve(
        &self,
        method: ProxyMethod,
        service: &str,
        sub_path: &str,
    ) -> Result<RouteDecision, RoutingError> {
        let backend_base_url = self
            .routes
            .lookup(service)
            .ok_or_else(|| RoutingError::ServiceNotFound(service.to_string()))?;

        if has_dot_segment(sub_path) {
            return Err(RoutingError::InvalidPath);
        }

        let requires_auth = !self.whitelist.is_exempt(method, &join_path(service, sub_path));

        Ok(RouteDecision {
            method,
            service: service.to_string(),
            sub_path: sub_path.to_string(),
            backend_base_url: backend_base_url.to_string(),
            requires_auth,
        })
    }
}
