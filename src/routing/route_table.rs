// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service prefix to backend origin mapping.

use url::Url;

/// Errors raised while building a [`RouteTable`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("duplicate service prefix '{0}'")]
    DuplicatePrefix(String),

    #[error("invalid service prefix '{0}' (must be non-empty and contain no '/')")]
    InvalidPrefix(String),

    #[error("invalid backend URL for '{prefix}': {reason}")]
    InvalidUrl { prefix: String, reason: String },
}

/// One route: requests to `/{prefix}/...` go to `base_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    prefix: String,
    base_url: String,
}

impl Route {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Backend origin without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Ordered route table with unique prefixes.
///
/// Lookup is by exact prefix, never longest-prefix.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(prefix, base_url)` pairs, in order.
    pub fn from_pairs<I, P, U>(pairs: I) -> Result<Self, RouteTableError>
    where
        I: IntoIterator<Item = (P, U)>,
        P: Into<String>,
        U: AsRef<str>,
    {
        let mut table = Self::new();
        for (prefix, url) in pairs {
            table.insert(prefix, url.as_ref())?;
        }
        Ok(table)
    }

    /// Append a route.
    ///
    /// The URL must be an absolute `http`/`https` URL; a trailing `/` is
    /// dropped so that joining with the sub-path never doubles it.
    pub fn insert(&mut self, prefix: impl Into<String>, base_url: &str) -> Result<(), RouteTableError> {
        let prefix = prefix.into();
        if prefix.is_empty() || prefix.contains('/') {
            return Err(RouteTableError::InvalidPrefix(prefix));
        }
        if self.lookup(&prefix).is_some() {
            return Err(RouteTableError::DuplicatePrefix(prefix));
        }

        let parsed = Url::parse(base_url).map_err(|e| RouteTableError::InvalidUrl {
            prefix: prefix.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(RouteTableError::InvalidUrl {
                prefix,
                reason: "expected an absolute http(s) URL".to_string(),
            });
        }

        self.routes.push(Route {
            prefix,
            base_url: base_url.trim_end_matches('/').to_string(),
        });
        Ok(())
    }

    /// Resolve a service prefix to its backend origin.
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|route| route.prefix == prefix)
            .map(|route| route.base_url.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
