// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Paths that bypass authentication.
//!
//! Every entry is matched against the joined path
//! `{service_prefix}/{sub_path}` (no leading slash). Matching is a raw string
//! prefix test: `svc-laboratory/api/` also exempts
//! `svc-laboratory/api/anything/below`.

use super::method::ProxyMethod;

/// A single whitelist rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistEntry {
    /// Exempts one method on paths starting with `prefix`.
    MethodSpecific { method: ProxyMethod, prefix: String },
    /// Exempts every method on paths starting with `prefix`.
    General { prefix: String },
}

impl WhitelistEntry {
    pub fn method(method: ProxyMethod, prefix: impl Into<String>) -> Self {
        WhitelistEntry::MethodSpecific {
            method,
            prefix: prefix.into(),
        }
    }

    pub fn general(prefix: impl Into<String>) -> Self {
        WhitelistEntry::General {
            prefix: prefix.into(),
        }
    }

    /// Legacy `(service, sub_path)` form, joined with `/` up front.
    pub fn service(service: &str, sub_path: &str) -> Self {
        Self::general(format!("{service}/{sub_path}"))
    }

    pub fn matches(&self, method: ProxyMethod, full_path: &str) -> bool {
        match self {
            WhitelistEntry::MethodSpecific { method: m, prefix } => {
                *m == method && full_path.starts_with(prefix.as_str())
            }
            WhitelistEntry::General { prefix } => full_path.starts_with(prefix.as_str()),
        }
    }
}

/// Ordered whitelist; the first matching entry wins.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    pub fn new(entries: Vec<WhitelistEntry>) -> Self {
        Self { entries }
    }

    /// The public endpoints of the clinic deployment.
    pub fn clinic_defaults() -> Self {
        use ProxyMethod::{Get, Post};

        Self::new(vec![
            WhitelistEntry::method(Post, "svc-auth/api/login"),
            WhitelistEntry::method(Post, "svc-auth/api/register/customer"),
            WhitelistEntry::method(Post, "svc-auth/api/register/patient"),
            WhitelistEntry::method(Post, "svc-auth/api/register/doctor"),
            WhitelistEntry::method(Post, "svc-auth/api/refresh-token"),
            WhitelistEntry::method(Get, "svc-doctor/api/schedule/availabilities/doctor"),
            WhitelistEntry::method(Get, "svc-doctor/api/info"),
            WhitelistEntry::method(Get, "svc-chatbot/"),
            WhitelistEntry::method(Get, "svc-chatbot/health"),
            WhitelistEntry::method(Post, "svc-chatbot/chat"),
            // Older clients still hit these without a token.
            WhitelistEntry::service("svc-auth", "api/login"),
            WhitelistEntry::service("svc-auth", "api/register"),
            WhitelistEntry::service("svc-doctor", "get-doctor-info"),
            WhitelistEntry::service("svc-appointment", "get-appointment-info"),
            WhitelistEntry::service("svc-laboratory", "api/testtypes"),
            WhitelistEntry::service("svc-laboratory", "api/"),
        ])
    }

    /// First entry exempting `(method, full_path)`, if any.
    pub fn first_match(&self, method: ProxyMethod, full_path: &str) -> Option<&WhitelistEntry> {
        self.entries.iter().find(|entry| entry.matches(method, full_path))
    }

    pub fn is_exempt(&self, method: ProxyMethod, full_path: &str) -> bool {
        self.first_match(method, full_path).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WhitelistEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
